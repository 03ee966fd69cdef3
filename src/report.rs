//! Evaluation and inference outputs: accuracy, the metrics report, and the predictions file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use crate::error::{Result, SeqfeatError};
use crate::example::LabelSet;

/// Fraction of positions where `predicted` equals `gold`. Empty input scores `0.0`.
pub fn accuracy(predicted: &[usize], gold: &[usize]) -> Result<f64> {
    if predicted.len() != gold.len() {
        return Err(SeqfeatError::InvalidConfig(format!(
            "{} predictions for {} gold labels",
            predicted.len(),
            gold.len()
        )));
    }
    if gold.is_empty() {
        return Ok(0.0);
    }
    let correct = predicted.iter().zip(gold).filter(|(p, g)| p == g).count();
    Ok(correct as f64 / gold.len() as f64)
}

/// Writes one `name = value` line per metric, values with four decimals.
pub fn write_eval_report<W: Write>(mut out: W, metrics: &[(&str, f64)]) -> Result<()> {
    for (name, value) in metrics {
        info!("  {name} = {value:.4}");
        writeln!(out, "{name} = {value:.4}").map_err(|err| SeqfeatError::io(err, None))?;
    }
    out.flush().map_err(|err| SeqfeatError::io(err, None))
}

/// Writes `<record_id> <label>` lines, mapping each predicted label id through `labels`.
pub fn write_predictions<W: Write>(
    mut out: W,
    record_ids: &[String],
    predicted: &[usize],
    labels: &LabelSet,
) -> Result<()> {
    if record_ids.len() != predicted.len() {
        return Err(SeqfeatError::InvalidConfig(format!(
            "{} predictions for {} records",
            predicted.len(),
            record_ids.len()
        )));
    }
    for (record_id, &label_id) in record_ids.iter().zip(predicted) {
        let label = labels.label(label_id).ok_or_else(|| SeqfeatError::UnknownLabel {
            example_id: record_id.clone(),
            label: Some(label_id.to_string()),
        })?;
        writeln!(out, "{record_id} {label}").map_err(|err| SeqfeatError::io(err, None))?;
    }
    out.flush().map_err(|err| SeqfeatError::io(err, None))
}

/// Creates `path` and wraps it in a buffered writer.
pub fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|err| SeqfeatError::io(err, Some(path.to_path_buf())))?;
    Ok(BufWriter::new(file))
}
