//! Subword tokenizer boundary and the Hugging Face backed implementation.

use std::path::Path;

use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;

use crate::error::{Result, SeqfeatError};

/// Token identifier used throughout the crate.
pub type TokenId = u32;

/// Leading marker whose final hidden state feeds the classifier.
pub const CLS_TOKEN: &str = "[CLS]";
/// Separator closing each segment.
pub const SEP_TOKEN: &str = "[SEP]";
/// Replacement for out-of-vocabulary words.
pub const UNK_TOKEN: &str = "[UNK]";

/// Text → subword tokens → vocabulary ids.
///
/// Implementations are shared read-only across the worker pool.
pub trait Tokenizer: Send + Sync {
    /// Splits raw text into subword tokens.
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;

    /// Maps tokens (including boundary markers) to vocabulary ids.
    fn tokens_to_ids(&self, tokens: &[String]) -> Result<Vec<TokenId>>;
}

/// Adapter over a `tokenizers::Tokenizer`.
#[derive(Debug, Clone)]
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Wraps an already constructed Hugging Face tokenizer.
    #[must_use]
    pub fn new(inner: tokenizers::Tokenizer) -> Self {
        Self { inner }
    }

    /// Loads a serialized `tokenizer.json`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_tokenizer(path).map(Self::new)
    }

    /// Builds a BERT WordPiece tokenizer from a `vocab.txt` file (one token per line).
    ///
    /// `lowercase` also strips accents, matching uncased BERT checkpoints.
    pub fn wordpiece<P: AsRef<Path>>(vocab: P, lowercase: bool) -> Result<Self> {
        let vocab = vocab.as_ref();
        if !vocab.is_file() {
            return Err(SeqfeatError::NotFound(vocab.to_path_buf()));
        }
        let vocab_str = vocab
            .to_str()
            .ok_or_else(|| SeqfeatError::InvalidConfig(format!("non UTF-8 vocab path {vocab:?}")))?;
        let model = WordPiece::from_file(vocab_str)
            .unk_token(UNK_TOKEN.into())
            .build()?;
        let mut inner = tokenizers::Tokenizer::new(model);
        inner.with_normalizer(Some(BertNormalizer::new(
            true,
            true,
            Some(lowercase),
            lowercase,
        )));
        inner.with_pre_tokenizer(Some(BertPreTokenizer));
        Ok(Self { inner })
    }

    /// Provides immutable access to the underlying tokenizer.
    #[must_use]
    pub fn inner(&self) -> &tokenizers::Tokenizer {
        &self.inner
    }

    /// Vocabulary size including added tokens.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

impl Tokenizer for HfTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let encoding = self.inner.encode(text, false)?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn tokens_to_ids(&self, tokens: &[String]) -> Result<Vec<TokenId>> {
        tokens
            .iter()
            .map(|token| {
                self.inner.token_to_id(token).ok_or_else(|| {
                    SeqfeatError::Tokenizer(format!("token {token:?} is not in the vocabulary"))
                })
            })
            .collect()
    }
}

/// Loads a tokenizer.json file via the Hugging Face `tokenizers` crate.
pub fn load_tokenizer<P: AsRef<Path>>(path: P) -> Result<tokenizers::Tokenizer> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(SeqfeatError::NotFound(path.to_path_buf()));
    }
    tokenizers::Tokenizer::from_file(path).map_err(|err| SeqfeatError::Tokenizer(err.to_string()))
}
