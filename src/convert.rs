//! Order-preserving fan-out of feature assembly across a fixed worker pool.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Instant;

use log::{debug, info};
use rayon::ThreadPoolBuilder;

use crate::config::PipelineConfig;
use crate::error::{Result, SeqfeatError};
use crate::example::{FeatureRecord, RawExample};
use crate::features::FeatureAssembler;
use crate::metrics::{sample_rss_kb, ConversionMetrics};

/// Result of one unit of work, tagged with the position of its example.
type Tagged = (usize, Result<FeatureRecord>);

/// High-level façade converting ordered raw examples into ordered feature records.
#[derive(Clone)]
pub struct Converter {
    assembler: Arc<FeatureAssembler>,
    cfg: PipelineConfig,
}

/// Records produced by a conversion, aligned with the input examples.
#[must_use]
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// One record per input example, in input order.
    pub records: Vec<FeatureRecord>,
    /// Timing and resource summary.
    pub metrics: ConversionMetrics,
}

impl Converter {
    /// Creates a converter running `assembler` under `cfg`.
    #[must_use]
    pub fn new(assembler: FeatureAssembler, cfg: PipelineConfig) -> Self {
        Self {
            assembler: Arc::new(assembler),
            cfg,
        }
    }

    /// Returns an immutable reference to the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// Converts every example, failing on the first unit that fails.
    pub fn convert(&self, examples: Vec<RawExample>) -> Result<ConversionOutput> {
        self.convert_with_progress(examples, |_, _| {})
    }

    /// Like [`Converter::convert`], invoking `on_progress(done, total)` from the coordinator
    /// after each collected result.
    ///
    /// Each example is tagged with its index before dispatch and its result lands in the
    /// matching output slot, so completion order never affects output order.
    pub fn convert_with_progress<F>(
        &self,
        examples: Vec<RawExample>,
        mut on_progress: F,
    ) -> Result<ConversionOutput>
    where
        F: FnMut(usize, usize),
    {
        self.cfg.validate()?;
        let total = examples.len();
        let workers = self.cfg.effective_workers();
        let start = Instant::now();
        if total == 0 {
            return Ok(ConversionOutput {
                records: Vec::new(),
                metrics: self.metrics(0, workers, start),
            });
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("seqfeat-worker-{idx}"))
            .build()
            .map_err(|err| SeqfeatError::InvalidConfig(format!("unable to build worker pool: {err}")))?;
        debug!("dispatching {total} examples to {workers} workers");

        let abort = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<Tagged>();
        for (index, example) in examples.into_iter().enumerate() {
            let tx = tx.clone();
            let assembler = Arc::clone(&self.assembler);
            let abort = Arc::clone(&abort);
            pool.spawn(move || {
                if abort.load(Ordering::Relaxed) {
                    return;
                }
                let example_id = example.id.clone();
                let unit = AssertUnwindSafe(|| assembler.assemble(index, example));
                // A panicking unit must still report back, or its slot is never filled.
                let result = match panic::catch_unwind(unit) {
                    Ok(result) => result,
                    Err(payload) => Err(SeqfeatError::InvariantViolation(format!(
                        "worker panicked: {}",
                        panic_message(payload.as_ref())
                    ))),
                }
                .map_err(|err| err.in_worker(example_id));
                // The coordinator may already have returned after an abort.
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<FeatureRecord>> = (0..total).map(|_| None).collect();
        let mut done = 0usize;
        while done < total {
            let Ok((index, result)) = rx.recv() else {
                return Err(SeqfeatError::InvariantViolation(format!(
                    "worker pool stopped after {done} of {total} results"
                )));
            };
            match result {
                Ok(record) => slots[index] = Some(record),
                Err(err) => {
                    abort.store(true, Ordering::Relaxed);
                    return Err(err);
                }
            }
            done += 1;
            on_progress(done, total);
            if self.cfg.show_progress && done % self.cfg.progress_interval == 0 {
                info!("converted {done}/{total} examples");
            }
        }

        let records = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    SeqfeatError::InvariantViolation(format!("no record collected for example {index}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let metrics = self.metrics(records.len(), workers, start);
        if self.cfg.show_progress {
            info!("conversion complete: {metrics}");
        }
        Ok(ConversionOutput { records, metrics })
    }

    fn metrics(&self, records: usize, workers: usize, start: Instant) -> ConversionMetrics {
        ConversionMetrics {
            records,
            workers,
            elapsed: start.elapsed(),
            rss_kb: sample_rss_kb(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

impl fmt::Display for ConversionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Feature records: {}", self.records.len())?;
        writeln!(f, "Conversion: {}", self.metrics)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::example::LabelSet;
    use crate::features::LabelMode;
    use crate::testing::WordTokenizer;
    use crate::tokenizer::{TokenId, Tokenizer};
    use rand::{Rng, SeedableRng};
    use std::thread;
    use std::time::Duration;

    /// Sleeps for a pseudo-random duration before delegating, scrambling completion order.
    struct SlowTokenizer {
        inner: WordTokenizer,
    }

    impl Tokenizer for SlowTokenizer {
        fn tokenize(&self, text: &str) -> Result<Vec<String>> {
            let seed = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            thread::sleep(Duration::from_millis(rng.gen_range(0..4)));
            self.inner.tokenize(text)
        }

        fn tokens_to_ids(&self, tokens: &[String]) -> Result<Vec<TokenId>> {
            self.inner.tokens_to_ids(tokens)
        }
    }

    fn config(workers: usize, max_seq_length: usize, permute: Option<usize>) -> PipelineConfig {
        PipelineConfig::builder()
            .workers(Some(workers))
            .max_seq_length(max_seq_length)
            .permute_ngrams(permute)
            .show_progress(false)
            .build()
            .unwrap()
    }

    fn converter(tokenizer: Arc<dyn Tokenizer>, mode: LabelMode, cfg: PipelineConfig) -> Converter {
        let assembler = FeatureAssembler::new(tokenizer, mode, &cfg).unwrap();
        Converter::new(assembler, cfg)
    }

    fn numbered_examples(count: usize) -> Vec<RawExample> {
        (0..count)
            .map(|i| {
                let words = (0..(i % 13) + 1).map(|w| format!("w{i}_{w}")).collect::<Vec<_>>();
                RawExample::single(format!("ex-{i}"), words.join(" "), None)
            })
            .collect()
    }

    #[test]
    fn output_order_matches_input_under_random_delays() {
        let examples = numbered_examples(64);
        for workers in [1, 2, 3, 8] {
            let conv = converter(
                Arc::new(SlowTokenizer {
                    inner: WordTokenizer,
                }),
                LabelMode::Inference,
                config(workers, 16, None),
            );
            let output = conv.convert(examples.clone()).unwrap();
            let ids: Vec<_> = output
                .records
                .iter()
                .map(|r| r.record_id.clone().unwrap())
                .collect();
            let expected: Vec<_> = examples.iter().map(|e| e.id.clone()).collect();
            assert_eq!(ids, expected, "order broken with {workers} workers");
            assert_eq!(output.metrics.records, 64);
            assert_eq!(output.metrics.workers, workers);
        }
    }

    #[test]
    fn single_and_many_workers_agree_with_permutation() {
        let examples = numbered_examples(40);
        let run = |workers| {
            converter(
                Arc::new(WordTokenizer),
                LabelMode::Inference,
                config(workers, 12, Some(2)),
            )
            .convert(examples.clone())
            .unwrap()
            .records
        };
        let sequential = run(1);
        let parallel = run(6);
        assert_eq!(
            serde_json::to_vec(&sequential).unwrap(),
            serde_json::to_vec(&parallel).unwrap()
        );
    }

    #[test]
    fn end_to_end_single_sequence_labels() {
        let labels = LabelSet::new(["0", "1"]).unwrap();
        let examples = vec![
            RawExample::single("train-0", "a b", Some("0".into())),
            RawExample::single("train-1", "c", Some("1".into())),
            RawExample::single("train-2", "d e f", Some("0".into())),
        ];
        let conv = converter(
            Arc::new(WordTokenizer),
            LabelMode::labelled(&labels),
            config(2, 8, None),
        );
        let output = conv.convert(examples).unwrap();
        assert_eq!(output.records.len(), 3);
        let label_ids: Vec<_> = output.records.iter().map(|r| r.label_id.unwrap()).collect();
        assert_eq!(label_ids, vec![0, 1, 0]);
        for (record, real) in output.records.iter().zip([4, 3, 5]) {
            assert_eq!(record.input_ids.len(), 8);
            assert_eq!(record.input_mask.len(), 8);
            assert_eq!(record.segment_ids.len(), 8);
            assert_eq!(record.real_length(), real);
            assert!(record.input_ids[real..].iter().all(|&id| id == 0));
            assert!(record.input_mask[real..].iter().all(|&m| m == 0));
            assert!(record.segment_ids[real..].iter().all(|&s| s == 0));
        }
    }

    #[test]
    fn first_failure_aborts_with_example_id() {
        let labels = LabelSet::new(["false", "true"]).unwrap();
        let mut examples: Vec<RawExample> = (0..20)
            .map(|i| RawExample::single(format!("ok-{i}"), "x y", Some("true".into())))
            .collect();
        examples[11] = RawExample::single("broken", "x y", Some("unsure".into()));
        let conv = converter(
            Arc::new(WordTokenizer),
            LabelMode::labelled(&labels),
            config(4, 8, None),
        );
        let err = conv.convert(examples).expect_err("unknown label must abort");
        match err {
            SeqfeatError::WorkerFailure { example_id, source } => {
                assert_eq!(example_id, "broken");
                assert!(matches!(*source, SeqfeatError::UnknownLabel { .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    /// Panics on one specific input, standing in for a buggy tokenizer.
    struct PanickingTokenizer;

    impl Tokenizer for PanickingTokenizer {
        fn tokenize(&self, text: &str) -> Result<Vec<String>> {
            if text == "boom" {
                panic!("tokenizer bug on {text:?}");
            }
            WordTokenizer.tokenize(text)
        }

        fn tokens_to_ids(&self, tokens: &[String]) -> Result<Vec<TokenId>> {
            WordTokenizer.tokens_to_ids(tokens)
        }
    }

    #[test]
    fn panicking_unit_is_reported_as_worker_failure() {
        let examples = vec![
            RawExample::single("fine", "a b", None),
            RawExample::single("exploding", "boom", None),
        ];
        let conv = converter(
            Arc::new(PanickingTokenizer),
            LabelMode::Inference,
            config(2, 8, None),
        );
        let err = conv.convert(examples).expect_err("panic must surface as an error");
        match err {
            SeqfeatError::WorkerFailure { example_id, source } => {
                assert_eq!(example_id, "exploding");
                assert!(source.to_string().contains("tokenizer bug"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn progress_callback_counts_every_result() {
        let conv = converter(
            Arc::new(WordTokenizer),
            LabelMode::Inference,
            config(3, 8, None),
        );
        let mut seen = Vec::new();
        let output = conv
            .convert_with_progress(numbered_examples(10), |done, total| seen.push((done, total)))
            .unwrap();
        assert_eq!(output.records.len(), 10);
        assert_eq!(seen.len(), 10);
        assert_eq!(seen.last(), Some(&(10, 10)));
    }

    #[test]
    fn empty_input_yields_no_records() {
        let conv = converter(
            Arc::new(WordTokenizer),
            LabelMode::Inference,
            config(2, 8, None),
        );
        let output = conv.convert(Vec::new()).unwrap();
        assert!(output.records.is_empty());
    }
}
