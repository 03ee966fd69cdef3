use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use log::info;

use super::ExampleSource;
use crate::corpus::open_buffered;
use crate::error::{Result, SeqfeatError};
use crate::example::{LabelSet, RawExample};

/// Where a row's label lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelColumn {
    /// Fixed zero-based column.
    Index(usize),
    /// Last column of the row, whatever its width.
    Last,
}

/// How example ids are derived from a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdScheme {
    /// `<split>-<row index>`, counting the header row when there is one.
    Row,
    /// `<split>-<value of column>`.
    Column(usize),
}

/// Column mapping of one tab-separated dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedLayout {
    /// Source name used in logs.
    pub name: &'static str,
    /// Training file relative to the data directory.
    pub train_file: &'static str,
    /// Development file relative to the data directory.
    pub dev_file: &'static str,
    /// Split name used in ids of development examples.
    pub dev_split: &'static str,
    /// Whether the first row is a header to skip.
    pub skip_header: bool,
    /// Column holding `text_a`.
    pub text_a: usize,
    /// Column holding `text_b`, for pair tasks.
    pub text_b: Option<usize>,
    /// Column holding the label.
    pub label: LabelColumn,
    /// Id derivation.
    pub id: IdScheme,
    /// Task labels in id order.
    pub labels: &'static [&'static str],
}

/// Microsoft Research Paraphrase Corpus.
pub const MRPC: DelimitedLayout = DelimitedLayout {
    name: "mrpc",
    train_file: "train.tsv",
    dev_file: "dev.tsv",
    dev_split: "dev",
    skip_header: true,
    text_a: 3,
    text_b: Some(4),
    label: LabelColumn::Index(0),
    id: IdScheme::Row,
    labels: &["0", "1"],
};

/// MultiNLI, matched development set.
pub const MNLI: DelimitedLayout = DelimitedLayout {
    name: "mnli",
    train_file: "train.tsv",
    dev_file: "dev_matched.tsv",
    dev_split: "dev_matched",
    skip_header: true,
    text_a: 8,
    text_b: Some(9),
    label: LabelColumn::Last,
    id: IdScheme::Column(0),
    labels: &["contradiction", "entailment", "neutral"],
};

/// Corpus of Linguistic Acceptability.
pub const COLA: DelimitedLayout = DelimitedLayout {
    name: "cola",
    train_file: "train.tsv",
    dev_file: "dev.tsv",
    dev_split: "dev",
    skip_header: false,
    text_a: 3,
    text_b: None,
    label: LabelColumn::Index(1),
    id: IdScheme::Row,
    labels: &["0", "1"],
};

/// Reads tab-separated rows (no quoting) according to a [`DelimitedLayout`].
#[derive(Debug, Clone, Copy)]
pub struct DelimitedSource {
    layout: &'static DelimitedLayout,
}

impl DelimitedSource {
    /// Creates a source for `layout`.
    #[must_use]
    pub fn new(layout: &'static DelimitedLayout) -> Self {
        Self { layout }
    }

    /// Layout this source reads.
    #[must_use]
    pub fn layout(&self) -> &'static DelimitedLayout {
        self.layout
    }

    fn read(&self, path: &Path, split: &str) -> Result<Vec<RawExample>> {
        let input = open_buffered(path)?;
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .has_headers(false)
            .flexible(true)
            .from_reader(input);

        let mut examples = Vec::new();
        let mut record = StringRecord::new();
        let mut row = 0usize;
        loop {
            let more = reader.read_record(&mut record).map_err(|err| csv_error(path, &err))?;
            if !more {
                break;
            }
            let line = record
                .position()
                .and_then(|pos| usize::try_from(pos.line()).ok())
                .unwrap_or(row + 1);
            if !(self.layout.skip_header && row == 0) {
                examples.push(self.example(&record, split, row, path, line)?);
            }
            row += 1;
        }
        info!(
            "{}: read {} {split} examples from {}",
            self.layout.name,
            examples.len(),
            path.display()
        );
        Ok(examples)
    }

    fn example(
        &self,
        record: &StringRecord,
        split: &str,
        row: usize,
        path: &Path,
        line: usize,
    ) -> Result<RawExample> {
        let column = |idx: usize| {
            record.get(idx).ok_or_else(|| {
                SeqfeatError::format(
                    path,
                    Some(line),
                    format!("expected column {idx}, row has {} columns", record.len()),
                )
            })
        };

        let id = match self.layout.id {
            IdScheme::Row => format!("{split}-{row}"),
            IdScheme::Column(idx) => format!("{split}-{}", column(idx)?),
        };
        let text_a = column(self.layout.text_a)?.to_string();
        let text_b = self
            .layout
            .text_b
            .map(|idx| column(idx).map(str::to_string))
            .transpose()?;
        let label = match self.layout.label {
            LabelColumn::Index(idx) => column(idx)?,
            LabelColumn::Last => match record.len() {
                0 => return Err(SeqfeatError::format(path, Some(line), "empty row")),
                n => column(n - 1)?,
            },
        };
        Ok(RawExample {
            id,
            text_a,
            text_b,
            label: Some(label.to_string()),
        })
    }
}

fn csv_error(path: &Path, err: &csv::Error) -> SeqfeatError {
    let line = err
        .position()
        .and_then(|pos| usize::try_from(pos.line()).ok());
    SeqfeatError::format(path, line, err.to_string())
}

impl ExampleSource for DelimitedSource {
    fn name(&self) -> &'static str {
        self.layout.name
    }

    fn train_examples(&mut self, dir: &Path) -> Result<Vec<RawExample>> {
        self.read(&dir.join(self.layout.train_file), "train")
    }

    fn dev_examples(&mut self, dir: &Path) -> Result<Vec<RawExample>> {
        self.read(&dir.join(self.layout.dev_file), self.layout.dev_split)
    }

    fn labels(&self) -> LabelSet {
        LabelSet::fixed(self.layout.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn mrpc_skips_header_and_numbers_rows() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("train.tsv"),
            "Quality\t#1 ID\t#2 ID\t#1 String\t#2 String\n\
             1\t702876\t702977\tHe said \"yes\".\tHe agreed.\n\
             0\t2108705\t2108831\tShares rose.\tShares fell.\n",
        )
        .unwrap();

        let examples = DelimitedSource::new(&MRPC).train_examples(dir.path()).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].id, "train-1");
        assert_eq!(examples[0].text_a, "He said \"yes\".");
        assert_eq!(examples[0].text_b.as_deref(), Some("He agreed."));
        assert_eq!(examples[0].label.as_deref(), Some("1"));
        assert_eq!(examples[1].id, "train-2");
        assert_eq!(examples[1].label.as_deref(), Some("0"));
    }

    #[test]
    fn mnli_uses_pair_id_and_last_column() {
        let dir = tempdir().expect("tempdir");
        let header = (0..12).map(|i| format!("h{i}")).collect::<Vec<_>>().join("\t");
        let mut row: Vec<String> = (0..12).map(|i| format!("c{i}")).collect();
        row[0] = "9815".into();
        row[8] = "A man eats.".into();
        row[9] = "Someone eats.".into();
        row[11] = "entailment".into();
        fs::write(
            dir.path().join("dev_matched.tsv"),
            format!("{header}\n{}\n", row.join("\t")),
        )
        .unwrap();

        let examples = DelimitedSource::new(&MNLI).dev_examples(dir.path()).unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].id, "dev_matched-9815");
        assert_eq!(examples[0].text_a, "A man eats.");
        assert_eq!(examples[0].text_b.as_deref(), Some("Someone eats."));
        assert_eq!(examples[0].label.as_deref(), Some("entailment"));
    }

    #[test]
    fn cola_reads_every_row_as_single_sentence() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("dev.tsv"),
            "gj04\t1\t\tThe sailors rode the breeze clear of the rocks.\n\
             gj04\t0\t*\tThe more we study verbs, the crazier they get more.\n",
        )
        .unwrap();

        let examples = DelimitedSource::new(&COLA).dev_examples(dir.path()).unwrap();
        let ids: Vec<_> = examples.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["dev-0", "dev-1"]);
        assert!(examples.iter().all(|e| e.text_b.is_none()));
        assert_eq!(examples[1].label.as_deref(), Some("0"));
    }

    #[test]
    fn short_row_reports_file_and_line() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("train.tsv"),
            "gj04\t1\t\tFine sentence.\ngj04\t0\n",
        )
        .unwrap();

        let err = DelimitedSource::new(&COLA)
            .train_examples(dir.path())
            .expect_err("second row lacks text");
        match err {
            SeqfeatError::Format { path, line, .. } => {
                assert!(path.ends_with("train.tsv"));
                assert_eq!(line, Some(2));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let err = DelimitedSource::new(&MRPC)
            .dev_examples(dir.path())
            .expect_err("no dev.tsv");
        assert!(matches!(err, SeqfeatError::NotFound(_)));
    }
}
