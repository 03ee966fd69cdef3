use std::path::Path;

use log::info;
use rayon::prelude::*;

use super::{ExampleSource, HYPERPARTISAN_LABELS};
use crate::corpus::read_lines;
use crate::error::{Result, SeqfeatError};
use crate::example::{LabelSet, RawExample};

/// Preprocessed training articles, one per line, relative to the data directory.
pub const SEMEVAL_TRAIN_TEXT: &str =
    "training/preprocessed/articles-training-byarticle-20181122.prep.txt";
/// Ground-truth labels aligned with [`SEMEVAL_TRAIN_TEXT`].
pub const SEMEVAL_TRAIN_LABELS: &str =
    "training/preprocessed/ground-truth-training-byarticle-20181122.txt";
const SEMEVAL_DEV_TEXT: &str = "validation/preprocessed/articles-validation.prep.txt";
const SEMEVAL_DEV_LABELS: &str = "validation/preprocessed/ground-truth-validation.txt";

/// Zips a text file with a label file line by line.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairedLineSource {
    parallel: bool,
}

impl PairedLineSource {
    /// Sequential reader.
    #[must_use]
    pub fn new() -> Self {
        Self { parallel: false }
    }

    /// Builds examples on the rayon pool. Output order is identical to the sequential reader.
    ///
    /// Selected by [`super::source_with_workers`] when more than one worker is configured.
    #[must_use]
    pub fn parallel() -> Self {
        Self { parallel: true }
    }
}

/// Reads `text_path` and `label_path` in lockstep, naming example `i` with `id(i)`.
///
/// Both sides are trimmed. Files of different lengths are rejected.
pub(crate) fn read_pairs<F>(
    text_path: &Path,
    label_path: &Path,
    parallel: bool,
    id: F,
) -> Result<Vec<RawExample>>
where
    F: Fn(usize) -> String + Sync,
{
    let texts = read_lines(text_path)?;
    let labels = read_lines(label_path)?;
    if texts.len() != labels.len() {
        return Err(SeqfeatError::format(
            label_path,
            None,
            format!(
                "{} labels for {} text lines in {}",
                labels.len(),
                texts.len(),
                text_path.display()
            ),
        ));
    }

    let build = |(idx, (text, label)): (usize, (String, String))| {
        RawExample::single(id(idx), text.trim(), Some(label.trim().to_string()))
    };
    let examples: Vec<RawExample> = if parallel {
        texts
            .into_par_iter()
            .zip(labels.into_par_iter())
            .enumerate()
            .map(build)
            .collect()
    } else {
        texts.into_iter().zip(labels).enumerate().map(build).collect()
    };
    info!("read {} examples from {}", examples.len(), text_path.display());
    Ok(examples)
}

impl ExampleSource for PairedLineSource {
    fn name(&self) -> &'static str {
        if self.parallel {
            "paired-line-parallel"
        } else {
            "paired-line"
        }
    }

    fn train_examples(&mut self, dir: &Path) -> Result<Vec<RawExample>> {
        read_pairs(
            &dir.join(SEMEVAL_TRAIN_TEXT),
            &dir.join(SEMEVAL_TRAIN_LABELS),
            self.parallel,
            |idx| format!("train-{idx}"),
        )
    }

    fn dev_examples(&mut self, dir: &Path) -> Result<Vec<RawExample>> {
        read_pairs(
            &dir.join(SEMEVAL_DEV_TEXT),
            &dir.join(SEMEVAL_DEV_LABELS),
            self.parallel,
            |idx| format!("validation-{idx}"),
        )
    }

    fn labels(&self) -> LabelSet {
        LabelSet::fixed(HYPERPARTISAN_LABELS)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    /// Writes `count` labelled articles into the training layout.
    pub(crate) fn training_fixture(count: usize) -> TempDir {
        let dir = tempdir().expect("tempdir");
        let text = dir.path().join(SEMEVAL_TRAIN_TEXT);
        fs::create_dir_all(text.parent().unwrap()).unwrap();
        let articles: String = (0..count).map(|i| format!("  article number {i} \n")).collect();
        let labels: String = (0..count)
            .map(|i| if i % 3 == 0 { "true\n" } else { " false\n" })
            .collect();
        fs::write(&text, articles).unwrap();
        fs::write(dir.path().join(SEMEVAL_TRAIN_LABELS), labels).unwrap();
        dir
    }

    #[test]
    fn lines_are_zipped_and_trimmed() {
        let dir = training_fixture(4);
        let examples = PairedLineSource::new().train_examples(dir.path()).unwrap();
        assert_eq!(examples.len(), 4);
        assert_eq!(examples[0].id, "train-0");
        assert_eq!(examples[0].text_a, "article number 0");
        assert_eq!(examples[0].label.as_deref(), Some("true"));
        assert_eq!(examples[1].label.as_deref(), Some("false"));
    }

    #[test]
    fn parallel_reader_matches_sequential_order() {
        let dir = training_fixture(500);
        let sequential = PairedLineSource::new().train_examples(dir.path()).unwrap();
        let parallel = PairedLineSource::parallel().train_examples(dir.path()).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn validation_split_uses_its_own_files() {
        let dir = tempdir().expect("tempdir");
        let text = dir.path().join(SEMEVAL_DEV_TEXT);
        fs::create_dir_all(text.parent().unwrap()).unwrap();
        fs::write(&text, "one\ntwo\n").unwrap();
        fs::write(dir.path().join(SEMEVAL_DEV_LABELS), "false\ntrue\n").unwrap();

        let examples = PairedLineSource::new().dev_examples(dir.path()).unwrap();
        let ids: Vec<_> = examples.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["validation-0", "validation-1"]);
    }

    #[test]
    fn mismatched_line_counts_are_rejected() {
        let dir = training_fixture(3);
        fs::write(dir.path().join(SEMEVAL_TRAIN_LABELS), "true\n").unwrap();
        let err = PairedLineSource::new()
            .train_examples(dir.path())
            .expect_err("label file too short");
        assert!(matches!(err, SeqfeatError::Format { .. }));
    }
}
