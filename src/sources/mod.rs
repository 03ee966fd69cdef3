//! Example sources: readers that turn a task's on-disk dataset into ordered [`RawExample`]s.
//!
//! Every task name selects one source variant through [`source_for`] or
//! [`source_with_workers`].

mod cached;
mod delimited;
mod paired;
mod xml;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::TaskKind;
use crate::error::{Result, SeqfeatError};
use crate::example::{LabelSet, RawExample};

pub use cached::CachedSplitSource;
pub use delimited::{DelimitedLayout, DelimitedSource, IdScheme, LabelColumn, COLA, MNLI, MRPC};
pub use paired::{PairedLineSource, SEMEVAL_TRAIN_LABELS, SEMEVAL_TRAIN_TEXT};
pub use xml::{CorpusNormalizer, PassthroughNormalizer, StreamingXmlSource};

/// Labels of the hyperpartisan article tasks.
pub(crate) const HYPERPARTISAN_LABELS: &[&str] = &["false", "true"];

/// Dataset partition requested from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    /// Training partition.
    Train,
    /// Development / evaluation partition.
    Dev,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Train => "train",
            Self::Dev => "dev",
        })
    }
}

impl FromStr for Split {
    type Err = SeqfeatError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "train" => Ok(Self::Train),
            "dev" | "eval" => Ok(Self::Dev),
            other => Err(SeqfeatError::InvalidConfig(format!("unknown split: {other}"))),
        }
    }
}

/// Capability shared by every dataset reader.
///
/// Sources are driven from a single coordinator thread; `&mut self` lets a variant memoize
/// what it has already read.
pub trait ExampleSource: Send {
    /// Short name of the variant, used in logs and errors.
    fn name(&self) -> &'static str;

    /// Reads the training partition found under `dir`.
    fn train_examples(&mut self, dir: &Path) -> Result<Vec<RawExample>>;

    /// Reads the development partition found under `dir`.
    fn dev_examples(&mut self, dir: &Path) -> Result<Vec<RawExample>>;

    /// Ordered label set of the task.
    fn labels(&self) -> LabelSet;

    /// Dispatches to [`ExampleSource::train_examples`] or [`ExampleSource::dev_examples`].
    fn examples(&mut self, split: Split, dir: &Path) -> Result<Vec<RawExample>> {
        match split {
            Split::Train => self.train_examples(dir),
            Split::Dev => self.dev_examples(dir),
        }
    }
}

/// Instantiates the source variant that reads `task`, reading sequentially.
#[must_use]
pub fn source_for(task: TaskKind) -> Box<dyn ExampleSource> {
    source_with_workers(task, 1)
}

/// Like [`source_for`], but sources that can read in parallel do so when `workers > 1`.
#[must_use]
pub fn source_with_workers(task: TaskKind, workers: usize) -> Box<dyn ExampleSource> {
    match task {
        TaskKind::Cola => Box::new(DelimitedSource::new(&COLA)),
        TaskKind::Mnli => Box::new(DelimitedSource::new(&MNLI)),
        TaskKind::Mrpc => Box::new(DelimitedSource::new(&MRPC)),
        TaskKind::Semeval => Box::new(CachedSplitSource::new()),
        TaskKind::Semeval2 if workers > 1 => Box::new(PairedLineSource::parallel()),
        TaskKind::Semeval2 => Box::new(PairedLineSource::new()),
        TaskKind::SemevalOfficial => Box::new(StreamingXmlSource::new()),
    }
}
