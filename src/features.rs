//! Turning one raw example into a fixed-length feature record.

use std::sync::Arc;

use log::info;

use crate::augment::{permute_chunks, unit_rng};
use crate::config::PipelineConfig;
use crate::error::{Result, SeqfeatError};
use crate::example::{FeatureRecord, LabelMap, LabelSet, RawExample};
use crate::tokenizer::{Tokenizer, CLS_TOKEN, SEP_TOKEN};
use crate::truncate::{truncate_seq_pair, truncate_single, PAIR_OVERHEAD, SINGLE_OVERHEAD};

/// Whether records carry gold label ids or the id of their source example.
#[derive(Debug, Clone)]
pub enum LabelMode {
    /// Training/evaluation: labels are resolved through the run's label map.
    Labelled(LabelMap),
    /// Inference: the example id is carried through instead of a label.
    Inference,
}

impl LabelMode {
    /// Labelled mode for `labels`.
    #[must_use]
    pub fn labelled(labels: &LabelSet) -> Self {
        Self::Labelled(labels.label_map())
    }
}

/// Builds [`FeatureRecord`]s from [`RawExample`]s. Shared read-only by every worker.
#[derive(Clone)]
pub struct FeatureAssembler {
    tokenizer: Arc<dyn Tokenizer>,
    mode: LabelMode,
    max_seq_length: usize,
    permute_ngrams: Option<usize>,
    seed: u64,
}

impl FeatureAssembler {
    /// Creates an assembler for the given tokenizer, label mode, and run configuration.
    pub fn new(tokenizer: Arc<dyn Tokenizer>, mode: LabelMode, cfg: &PipelineConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            tokenizer,
            mode,
            max_seq_length: cfg.max_seq_length,
            permute_ngrams: cfg.permute_ngrams,
            seed: cfg.seed,
        })
    }

    /// Fixed output length `L`.
    #[must_use]
    pub fn max_seq_length(&self) -> usize {
        self.max_seq_length
    }

    /// Converts the example at position `index` of the run.
    ///
    /// `index` seeds the unit's augmentation stream; index 0 is logged in full.
    pub fn assemble(&self, index: usize, example: RawExample) -> Result<FeatureRecord> {
        let mut rng = unit_rng(self.seed, index);

        let tokens_a = self.tokenizer.tokenize(&example.text_a)?;
        let mut tokens_a = permute_chunks(tokens_a, self.permute_ngrams, &mut rng);

        // A second segment that tokenizes to nothing falls back to the single layout.
        let mut tokens_b = match example.text_b.as_deref() {
            Some(text) if !text.is_empty() => {
                let tokens = self.tokenizer.tokenize(text)?;
                (!tokens.is_empty()).then(|| permute_chunks(tokens, self.permute_ngrams, &mut rng))
            }
            _ => None,
        };

        match tokens_b.as_mut() {
            Some(tokens_b) => truncate_seq_pair(
                &mut tokens_a,
                tokens_b,
                self.max_seq_length - PAIR_OVERHEAD,
            ),
            None => truncate_single(&mut tokens_a, self.max_seq_length - SINGLE_OVERHEAD),
        }

        let (tokens, mut segment_ids) = assemble_segments(tokens_a, tokens_b);
        let mut input_ids = self.tokenizer.tokens_to_ids(&tokens)?;
        if input_ids.len() != tokens.len() {
            return Err(SeqfeatError::InvariantViolation(format!(
                "tokenizer returned {} ids for {} tokens",
                input_ids.len(),
                tokens.len()
            )));
        }
        let mut input_mask = vec![1u8; input_ids.len()];

        input_ids.resize(self.max_seq_length, 0);
        input_mask.resize(self.max_seq_length, 0);
        segment_ids.resize(self.max_seq_length, 0);
        self.check_lengths(&example.id, &input_ids, &input_mask, &segment_ids)?;

        let (label_id, record_id) = match &self.mode {
            LabelMode::Labelled(map) => {
                let label_id = example
                    .label
                    .as_deref()
                    .and_then(|label| map.get(label))
                    .ok_or_else(|| SeqfeatError::UnknownLabel {
                        example_id: example.id.clone(),
                        label: example.label.clone(),
                    })?;
                (Some(label_id), None)
            }
            LabelMode::Inference => (None, Some(example.id.clone())),
        };

        let record = FeatureRecord {
            input_ids,
            input_mask,
            segment_ids,
            label_id,
            record_id,
        };
        if index == 0 {
            log_example(&example, &tokens, &record);
        }
        Ok(record)
    }

    fn check_lengths(
        &self,
        example_id: &str,
        input_ids: &[u32],
        input_mask: &[u8],
        segment_ids: &[u8],
    ) -> Result<()> {
        let expected = self.max_seq_length;
        if input_ids.len() != expected || input_mask.len() != expected || segment_ids.len() != expected
        {
            return Err(SeqfeatError::InvariantViolation(format!(
                "example {example_id}: lengths ids={} mask={} segments={} expected {expected}",
                input_ids.len(),
                input_mask.len(),
                segment_ids.len()
            )));
        }
        Ok(())
    }
}

/// Lays out `[CLS] A [SEP]` and optionally `B [SEP]`, returning tokens and segment ids.
fn assemble_segments(tokens_a: Vec<String>, tokens_b: Option<Vec<String>>) -> (Vec<String>, Vec<u8>) {
    let capacity = tokens_a.len() + tokens_b.as_ref().map_or(0, |b| b.len() + 1) + 2;
    let mut tokens = Vec::with_capacity(capacity);
    let mut segment_ids = Vec::with_capacity(capacity);

    tokens.push(CLS_TOKEN.to_string());
    tokens.extend(tokens_a);
    tokens.push(SEP_TOKEN.to_string());
    segment_ids.resize(tokens.len(), 0);

    if let Some(tokens_b) = tokens_b {
        tokens.extend(tokens_b);
        tokens.push(SEP_TOKEN.to_string());
        segment_ids.resize(tokens.len(), 1);
    }
    (tokens, segment_ids)
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn log_example(example: &RawExample, tokens: &[String], record: &FeatureRecord) {
    info!("*** Example ***");
    info!("id: {}", example.id);
    info!("tokens: {}", tokens.join(" "));
    info!("input_ids: {}", join(&record.input_ids));
    info!("input_mask: {}", join(&record.input_mask));
    info!("segment_ids: {}", join(&record.segment_ids));
    match (&example.label, record.label_id) {
        (Some(label), Some(id)) => info!("label: {label} (id = {id})"),
        _ => info!("record id: {}", record.record_id.as_deref().unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::WordTokenizer;

    fn assembler(mode: LabelMode, max_seq_length: usize, permute: Option<usize>) -> FeatureAssembler {
        let cfg = PipelineConfig::builder()
            .max_seq_length(max_seq_length)
            .permute_ngrams(permute)
            .show_progress(false)
            .build()
            .unwrap();
        FeatureAssembler::new(Arc::new(WordTokenizer::default()), mode, &cfg).unwrap()
    }

    fn binary_labels() -> LabelSet {
        LabelSet::new(["0", "1"]).unwrap()
    }

    #[test]
    fn single_segment_is_padded() {
        let asm = assembler(LabelMode::labelled(&binary_labels()), 8, None);
        let record = asm
            .assemble(0, RawExample::single("a", "w1 w2", Some("1".into())))
            .unwrap();
        let tok = WordTokenizer::default();
        assert_eq!(
            record.input_ids,
            vec![tok.cls(), tok.id("w1"), tok.id("w2"), tok.sep(), 0, 0, 0, 0]
        );
        assert_eq!(record.input_mask, vec![1, 1, 1, 1, 0, 0, 0, 0]);
        assert_eq!(record.segment_ids, vec![0; 8]);
        assert_eq!(record.label_id, Some(1));
        assert_eq!(record.record_id, None);
    }

    #[test]
    fn pair_segments_get_distinct_ids() {
        let asm = assembler(LabelMode::labelled(&binary_labels()), 10, None);
        let record = asm
            .assemble(3, RawExample::pair("p", "w1 w2", "w3", Some("0".into())))
            .unwrap();
        // [CLS] w1 w2 [SEP] w3 [SEP] + 4 padding
        assert_eq!(record.input_mask, vec![1, 1, 1, 1, 1, 1, 0, 0, 0, 0]);
        assert_eq!(record.segment_ids, vec![0, 0, 0, 0, 1, 1, 0, 0, 0, 0]);
        assert_eq!(record.label_id, Some(0));
    }

    #[test]
    fn long_pair_is_truncated_to_budget() {
        let asm = assembler(LabelMode::labelled(&binary_labels()), 7, None);
        let record = asm
            .assemble(
                1,
                RawExample::pair("p", "w1 w2 w3 w4 w5", "w6 w7", Some("0".into())),
            )
            .unwrap();
        let tok = WordTokenizer::default();
        assert_eq!(
            record.input_ids,
            vec![
                tok.cls(),
                tok.id("w1"),
                tok.id("w2"),
                tok.sep(),
                tok.id("w6"),
                tok.id("w7"),
                tok.sep()
            ]
        );
        assert_eq!(record.real_length(), 7);
    }

    #[test]
    fn long_single_is_truncated_to_budget() {
        let asm = assembler(LabelMode::Inference, 5, None);
        let record = asm
            .assemble(2, RawExample::single("doc-9", "a b c d e f g", None))
            .unwrap();
        assert_eq!(record.input_ids.len(), 5);
        assert_eq!(record.input_mask, vec![1; 5]);
        assert_eq!(record.record_id.as_deref(), Some("doc-9"));
        assert_eq!(record.label_id, None);
    }

    #[test]
    fn empty_second_segment_counts_as_absent() {
        let asm = assembler(LabelMode::Inference, 6, None);
        let record = asm
            .assemble(0, RawExample::pair("x", "a", "", None))
            .unwrap();
        assert_eq!(record.segment_ids, vec![0; 6]);
        assert_eq!(record.real_length(), 3);
    }

    #[test]
    fn whitespace_second_segment_uses_single_layout() {
        let asm = assembler(LabelMode::Inference, 8, None);
        let record = asm
            .assemble(0, RawExample::pair("p", "a b", "   ", None))
            .unwrap();
        let single = asm
            .assemble(0, RawExample::single("p", "a b", None))
            .unwrap();
        assert_eq!(record.real_length(), 4);
        assert_eq!(record.segment_ids, vec![0; 8]);
        assert_eq!(record, single);
    }

    /// Drops the last id, breaking the one-id-per-token contract.
    struct ShortIdTokenizer;

    impl Tokenizer for ShortIdTokenizer {
        fn tokenize(&self, text: &str) -> Result<Vec<String>> {
            WordTokenizer.tokenize(text)
        }

        fn tokens_to_ids(&self, tokens: &[String]) -> Result<Vec<crate::tokenizer::TokenId>> {
            let mut ids = WordTokenizer.tokens_to_ids(tokens)?;
            ids.pop();
            Ok(ids)
        }
    }

    #[test]
    fn id_count_mismatch_is_invariant_violation() {
        let cfg = PipelineConfig::builder()
            .max_seq_length(8)
            .show_progress(false)
            .build()
            .unwrap();
        let asm = FeatureAssembler::new(Arc::new(ShortIdTokenizer), LabelMode::Inference, &cfg).unwrap();
        let err = asm
            .assemble(0, RawExample::single("short", "w1 w2", None))
            .expect_err("tokenizer returned too few ids");
        assert!(matches!(err, SeqfeatError::InvariantViolation(_)));
    }

    #[test]
    fn unknown_label_is_rejected() {
        let asm = assembler(LabelMode::labelled(&binary_labels()), 8, None);
        let err = asm
            .assemble(0, RawExample::single("bad", "w1", Some("2".into())))
            .expect_err("label outside set");
        assert!(matches!(
            err,
            SeqfeatError::UnknownLabel { example_id, label } if example_id == "bad" && label.as_deref() == Some("2")
        ));

        let err = asm
            .assemble(0, RawExample::single("none", "w1", None))
            .expect_err("missing label in labelled mode");
        assert!(matches!(err, SeqfeatError::UnknownLabel { label: None, .. }));
    }

    #[test]
    fn permutation_keeps_token_multiset() {
        let asm = assembler(LabelMode::Inference, 32, Some(2));
        let text = "a b c d e f g h i j";
        let record = asm.assemble(5, RawExample::single("p", text, None)).unwrap();
        let again = asm.assemble(5, RawExample::single("p", text, None)).unwrap();
        assert_eq!(record, again, "same index and seed must give the same record");

        let plain = assembler(LabelMode::Inference, 32, None)
            .assemble(5, RawExample::single("p", text, None))
            .unwrap();
        let mut permuted_ids = record.input_ids.clone();
        let mut plain_ids = plain.input_ids.clone();
        permuted_ids.sort_unstable();
        plain_ids.sort_unstable();
        assert_eq!(permuted_ids, plain_ids);
    }

    #[test]
    fn mask_is_contiguous_prefix() {
        let asm = assembler(LabelMode::Inference, 12, None);
        for (idx, text) in ["", "a", "a b c", "a b c d e f g h i j k l m n"].iter().enumerate() {
            let record = asm.assemble(idx, RawExample::single("m", *text, None)).unwrap();
            let real = record.real_length();
            assert!(record.input_mask[..real].iter().all(|&m| m == 1));
            assert!(record.input_mask[real..].iter().all(|&m| m == 0));
            assert!(record.input_ids[real..].iter().all(|&id| id == 0));
            assert!(record.segment_ids[real..].iter().all(|&s| s == 0));
        }
    }
}
