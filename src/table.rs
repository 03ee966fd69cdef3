//! Columnar, fixed-width view over converted records for handing to a model.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeqfeatError};
use crate::example::FeatureRecord;

/// Per-record targets carried alongside the feature columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Targets {
    /// Gold label ids (training / evaluation).
    LabelIds(Vec<i64>),
    /// Source example ids (inference).
    RecordIds(Vec<String>),
}

impl Targets {
    fn len(&self) -> usize {
        match self {
            Self::LabelIds(ids) => ids.len(),
            Self::RecordIds(ids) => ids.len(),
        }
    }
}

/// Row-major `i64` columns of shape `[rows, seq_len]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureTable {
    seq_len: usize,
    input_ids: Vec<i64>,
    input_mask: Vec<i64>,
    segment_ids: Vec<i64>,
    targets: Targets,
}

impl FeatureTable {
    /// Packs `records` into columns, checking that every row has `seq_len` entries.
    ///
    /// Records must be uniformly labelled or uniformly unlabelled.
    pub fn from_records(records: &[FeatureRecord], seq_len: usize) -> Result<Self> {
        let rows = records.len();
        let mut input_ids = Vec::with_capacity(rows * seq_len);
        let mut input_mask = Vec::with_capacity(rows * seq_len);
        let mut segment_ids = Vec::with_capacity(rows * seq_len);
        let labelled = records.first().map_or(true, |r| r.label_id.is_some());
        let mut targets = if labelled {
            Targets::LabelIds(Vec::with_capacity(rows))
        } else {
            Targets::RecordIds(Vec::with_capacity(rows))
        };

        for (row, record) in records.iter().enumerate() {
            if record.input_ids.len() != seq_len
                || record.input_mask.len() != seq_len
                || record.segment_ids.len() != seq_len
            {
                return Err(SeqfeatError::InvariantViolation(format!(
                    "row {row} is not {seq_len} wide"
                )));
            }
            input_ids.extend(record.input_ids.iter().map(|&id| i64::from(id)));
            input_mask.extend(record.input_mask.iter().map(|&m| i64::from(m)));
            segment_ids.extend(record.segment_ids.iter().map(|&s| i64::from(s)));

            match (&mut targets, record.label_id, &record.record_id) {
                (Targets::LabelIds(ids), Some(label), _) => ids.push(label_as_i64(label, row)?),
                (Targets::RecordIds(ids), None, Some(id)) => ids.push(id.clone()),
                _ => {
                    return Err(SeqfeatError::InvariantViolation(format!(
                        "row {row} mixes labelled and unlabelled records"
                    )))
                }
            }
        }

        Ok(Self {
            seq_len,
            input_ids,
            input_mask,
            segment_ids,
            targets,
        })
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true when the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Width of every row.
    #[must_use]
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Flattened token id column.
    #[must_use]
    pub fn input_ids(&self) -> &[i64] {
        &self.input_ids
    }

    /// Flattened attention mask column.
    #[must_use]
    pub fn input_mask(&self) -> &[i64] {
        &self.input_mask
    }

    /// Flattened segment id column.
    #[must_use]
    pub fn segment_ids(&self) -> &[i64] {
        &self.segment_ids
    }

    /// Row targets.
    #[must_use]
    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    /// Iterates over consecutive batches of at most `batch_size` rows, in row order.
    pub fn batches(&self, batch_size: usize) -> Result<Batches<'_>> {
        if batch_size == 0 {
            return Err(SeqfeatError::InvalidConfig("batch size must be positive".into()));
        }
        Ok(Batches {
            table: self,
            batch_size,
            next_row: 0,
        })
    }
}

fn label_as_i64(label: usize, row: usize) -> Result<i64> {
    i64::try_from(label)
        .map_err(|_| SeqfeatError::InvariantViolation(format!("label id of row {row} overflows i64")))
}

/// Borrowed slice of consecutive table rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a> {
    /// Index of the first row in the batch.
    pub offset: usize,
    /// Number of rows in the batch.
    pub rows: usize,
    /// Token ids, `rows * seq_len` entries.
    pub input_ids: &'a [i64],
    /// Attention mask, `rows * seq_len` entries.
    pub input_mask: &'a [i64],
    /// Segment ids, `rows * seq_len` entries.
    pub segment_ids: &'a [i64],
    /// Label ids for labelled tables.
    pub label_ids: Option<&'a [i64]>,
    /// Record ids for inference tables.
    pub record_ids: Option<&'a [String]>,
}

/// Sequential batch iterator returned by [`FeatureTable::batches`].
#[derive(Debug, Clone)]
pub struct Batches<'a> {
    table: &'a FeatureTable,
    batch_size: usize,
    next_row: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.table.len();
        if self.next_row >= total {
            return None;
        }
        let start = self.next_row;
        let end = (start + self.batch_size).min(total);
        self.next_row = end;

        let width = self.table.seq_len;
        let cells = start * width..end * width;
        let (label_ids, record_ids) = match &self.table.targets {
            Targets::LabelIds(ids) => (Some(&ids[start..end]), None),
            Targets::RecordIds(ids) => (None, Some(&ids[start..end])),
        };
        Some(Batch {
            offset: start,
            rows: end - start,
            input_ids: &self.table.input_ids[cells.clone()],
            input_mask: &self.table.input_mask[cells.clone()],
            segment_ids: &self.table.segment_ids[cells],
            label_ids,
            record_ids,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.len().saturating_sub(self.next_row);
        let batches = remaining.div_ceil(self.batch_size);
        (batches, Some(batches))
    }
}

impl ExactSizeIterator for Batches<'_> {}
