//! Value types flowing through the pipeline: raw examples, label sets, and feature records.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SeqfeatError};

/// One unit of raw input as produced by an example source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExample {
    /// Identifier unique within one source split.
    pub id: String,
    /// First (or only) text segment.
    pub text_a: String,
    /// Optional second segment for sentence-pair tasks.
    pub text_b: Option<String>,
    /// Gold label; absent for inference corpora.
    pub label: Option<String>,
}

impl RawExample {
    /// Builds a single-segment example.
    pub fn single(id: impl Into<String>, text_a: impl Into<String>, label: Option<String>) -> Self {
        Self {
            id: id.into(),
            text_a: text_a.into(),
            text_b: None,
            label,
        }
    }

    /// Builds a sentence-pair example.
    pub fn pair(
        id: impl Into<String>,
        text_a: impl Into<String>,
        text_b: impl Into<String>,
        label: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text_a: text_a.into(),
            text_b: Some(text_b.into()),
            label,
        }
    }
}

/// Ordered, duplicate-free list of labels for a task.
///
/// The position of a label is its dense integer id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Creates a label set, rejecting duplicates.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        for (idx, label) in labels.iter().enumerate() {
            if labels[..idx].contains(label) {
                return Err(SeqfeatError::InvalidConfig(format!(
                    "duplicate label {label:?} in label set"
                )));
            }
        }
        Ok(Self { labels })
    }

    /// Builds a task's fixed label set from labels known to be distinct.
    pub(crate) fn fixed(labels: &[&str]) -> Self {
        debug_assert!(Self::new(labels.iter().copied()).is_ok());
        Self {
            labels: labels.iter().map(|label| (*label).to_string()).collect(),
        }
    }

    /// Labels in id order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true when the set holds no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Looks up the label string for a dense id.
    #[must_use]
    pub fn label(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    /// Builds the label → id map induced by positions.
    #[must_use]
    pub fn label_map(&self) -> LabelMap {
        LabelMap {
            ids: self
                .labels
                .iter()
                .enumerate()
                .map(|(idx, label)| (label.clone(), idx))
                .collect(),
        }
    }
}

/// Label → id bijection built once per run from a [`LabelSet`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelMap {
    ids: FxHashMap<String, usize>,
}

impl LabelMap {
    /// Returns the id of `label`, if it belongs to the set.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    /// Number of labels in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true when the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Fixed-length numeric encoding of one [`RawExample`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Vocabulary ids, zero padded to `L`.
    pub input_ids: Vec<u32>,
    /// 1 for real tokens, 0 for padding.
    pub input_mask: Vec<u8>,
    /// 0 for segment A (and its markers), 1 for segment B.
    pub segment_ids: Vec<u8>,
    /// Dense label id in labelled mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_id: Option<usize>,
    /// Originating example id in inference mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl FeatureRecord {
    /// Number of real (non padding) positions.
    #[must_use]
    pub fn real_length(&self) -> usize {
        self.input_mask.iter().take_while(|&&m| m == 1).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_map_follows_positions() {
        let labels = LabelSet::new(["false", "true"]).unwrap();
        let map = labels.label_map();
        assert_eq!(map.get("false"), Some(0));
        assert_eq!(map.get("true"), Some(1));
        assert_eq!(map.get("maybe"), None);
        assert_eq!(labels.label(1), Some("true"));
        // Rebuilding yields the same bijection.
        assert_eq!(labels.label_map(), map);
    }

    #[test]
    fn label_set_rejects_duplicates() {
        let err = LabelSet::new(["0", "1", "0"]).expect_err("duplicate label");
        assert!(matches!(err, SeqfeatError::InvalidConfig(_)));
    }

    #[test]
    fn feature_record_serializes_only_populated_target() {
        let record = FeatureRecord {
            input_ids: vec![101, 7, 102, 0],
            input_mask: vec![1, 1, 1, 0],
            segment_ids: vec![0, 0, 0, 0],
            label_id: None,
            record_id: Some("0042".into()),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"record_id\":\"0042\""));
        assert!(!json.contains("label_id"));
        assert_eq!(record.real_length(), 3);
    }
}
