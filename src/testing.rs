//! Test doubles shared by unit tests.

use crate::error::Result;
use crate::tokenizer::{TokenId, Tokenizer, CLS_TOKEN, SEP_TOKEN};

/// Whitespace tokenizer with a deterministic, vocabulary-free id scheme.
#[derive(Debug, Default, Clone)]
pub(crate) struct WordTokenizer;

impl WordTokenizer {
    pub(crate) fn cls(&self) -> TokenId {
        101
    }

    pub(crate) fn sep(&self) -> TokenId {
        102
    }

    pub(crate) fn id(&self, token: &str) -> TokenId {
        match token {
            CLS_TOKEN => self.cls(),
            SEP_TOKEN => self.sep(),
            _ => {
                // FNV-1a folded into [1000, 31000)
                let mut hash: u32 = 0x811C_9DC5;
                for byte in token.bytes() {
                    hash ^= u32::from(byte);
                    hash = hash.wrapping_mul(0x0100_0193);
                }
                1000 + hash % 30_000
            }
        }
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        Ok(text.split_whitespace().map(str::to_string).collect())
    }

    fn tokens_to_ids(&self, tokens: &[String]) -> Result<Vec<TokenId>> {
        Ok(tokens.iter().map(|token| self.id(token)).collect())
    }
}
