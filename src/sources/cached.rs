use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::paired::read_pairs;
use super::{ExampleSource, HYPERPARTISAN_LABELS, SEMEVAL_TRAIN_LABELS, SEMEVAL_TRAIN_TEXT};
use crate::error::Result;
use crate::example::{LabelSet, RawExample};

/// Examples loaded once, plus the fixed train/dev boundary.
#[derive(Debug, Clone)]
struct CachedCorpus {
    dir: PathBuf,
    examples: Vec<RawExample>,
    boundary: usize,
}

/// Loads the training articles on first use and serves a deterministic 80/20 split.
///
/// Train is `[0, floor(0.8 N))`, dev is the remainder. The split is derived once and reused
/// by every later call, so the partitions never overlap.
#[derive(Debug, Clone, Default)]
pub struct CachedSplitSource {
    cache: Option<CachedCorpus>,
}

impl CachedSplitSource {
    /// Creates a source with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the first dev example, once the corpus has been loaded.
    #[must_use]
    pub fn boundary(&self) -> Option<usize> {
        self.cache.as_ref().map(|cache| cache.boundary)
    }

    fn corpus(&mut self, dir: &Path) -> Result<&CachedCorpus> {
        let corpus = match self.cache.take() {
            Some(cached) => {
                if cached.dir != dir {
                    warn!(
                        "cached split was loaded from {}; ignoring {}",
                        cached.dir.display(),
                        dir.display()
                    );
                }
                cached
            }
            None => load(dir)?,
        };
        Ok(&*self.cache.insert(corpus))
    }
}

fn load(dir: &Path) -> Result<CachedCorpus> {
    let examples = read_pairs(
        &dir.join(SEMEVAL_TRAIN_TEXT),
        &dir.join(SEMEVAL_TRAIN_LABELS),
        false,
        |idx| idx.to_string(),
    )?;
    let boundary = split_boundary(examples.len());
    debug!(
        "cached {} examples, {boundary} train / {} dev",
        examples.len(),
        examples.len() - boundary
    );
    Ok(CachedCorpus {
        dir: dir.to_path_buf(),
        examples,
        boundary,
    })
}

/// `floor(0.8 * n)` in integer arithmetic.
fn split_boundary(n: usize) -> usize {
    n * 4 / 5
}

impl ExampleSource for CachedSplitSource {
    fn name(&self) -> &'static str {
        "cached-split"
    }

    fn train_examples(&mut self, dir: &Path) -> Result<Vec<RawExample>> {
        let corpus = self.corpus(dir)?;
        Ok(corpus.examples[..corpus.boundary].to_vec())
    }

    fn dev_examples(&mut self, dir: &Path) -> Result<Vec<RawExample>> {
        let corpus = self.corpus(dir)?;
        Ok(corpus.examples[corpus.boundary..].to_vec())
    }

    fn labels(&self) -> LabelSet {
        LabelSet::fixed(HYPERPARTISAN_LABELS)
    }
}
