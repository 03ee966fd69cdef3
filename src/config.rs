//! Configuration builders controlling feature conversion and task selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeqfeatError};

/// Configuration shared by every unit of one feature conversion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Fixed length `L` of every feature array, including the boundary markers.
    pub max_seq_length: usize,
    /// Chunk width used to permute token order; `None` disables the augmentation.
    pub permute_ngrams: Option<usize>,
    /// Run seed from which each unit derives its own random stream.
    pub seed: u64,
    /// Worker pool size; `None` uses the available hardware parallelism.
    pub workers: Option<usize>,
    /// Enables periodic progress logging through the `log` facade.
    pub show_progress: bool,
    /// Number of converted records between two progress log lines.
    pub progress_interval: usize,
}

impl PipelineConfig {
    /// Returns a builder initialised with [`PipelineConfig::default`].
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Validates the invariants required for conversion.
    pub fn validate(&self) -> Result<()> {
        if self.max_seq_length < 3 {
            return Err(SeqfeatError::InvalidConfig(format!(
                "max_seq_length ({}) must leave room for [CLS] and two [SEP] markers",
                self.max_seq_length
            )));
        }
        if self.permute_ngrams == Some(0) {
            return Err(SeqfeatError::InvalidConfig(
                "permute_ngrams must be greater than zero when set".into(),
            ));
        }
        if self.workers == Some(0) {
            return Err(SeqfeatError::InvalidConfig(
                "workers must be greater than zero when set".into(),
            ));
        }
        if self.progress_interval == 0 {
            return Err(SeqfeatError::InvalidConfig(
                "progress_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Resolves the worker count, falling back to the available parallelism.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_seq_length: 100,
            permute_ngrams: None,
            seed: 42,
            workers: None,
            show_progress: true,
            progress_interval: 1000,
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Default, Clone)]
pub struct PipelineBuilder {
    cfg: PipelineConfig,
}

impl PipelineBuilder {
    /// Creates a builder with [`PipelineConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fixed feature length `L`.
    #[must_use]
    pub fn max_seq_length(mut self, value: usize) -> Self {
        self.cfg.max_seq_length = value;
        self
    }

    /// Sets the chunk width of the permutation augmentation.
    #[must_use]
    pub fn permute_ngrams(mut self, value: Option<usize>) -> Self {
        self.cfg.permute_ngrams = value;
        self
    }

    /// Sets the run seed.
    #[must_use]
    pub fn seed(mut self, value: u64) -> Self {
        self.cfg.seed = value;
        self
    }

    /// Sets the worker pool size.
    #[must_use]
    pub fn workers(mut self, value: Option<usize>) -> Self {
        self.cfg.workers = value;
        self
    }

    /// Enables or disables progress logging.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.cfg.show_progress = enabled;
        self
    }

    /// Sets how many records are converted between two progress log lines.
    #[must_use]
    pub fn progress_interval(mut self, value: usize) -> Self {
        self.cfg.progress_interval = value;
        self
    }

    /// Finalises the builder, returning a validated [`PipelineConfig`].
    pub fn build(self) -> Result<PipelineConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Named dataset task; each one selects an example source layout and label set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// CoLA acceptability judgements (single sentence, no header).
    Cola,
    /// MultiNLI entailment (sentence pairs, three labels).
    Mnli,
    /// MRPC paraphrase detection (sentence pairs).
    Mrpc,
    /// Hyperpartisan articles with a cached 80/20 split.
    Semeval,
    /// Hyperpartisan articles with separate training and validation files.
    Semeval2,
    /// Unlabelled hyperpartisan XML corpus used for inference.
    SemevalOfficial,
}

impl TaskKind {
    /// All supported tasks in a stable order.
    pub const ALL: [TaskKind; 6] = [
        TaskKind::Cola,
        TaskKind::Mnli,
        TaskKind::Mrpc,
        TaskKind::Semeval,
        TaskKind::Semeval2,
        TaskKind::SemevalOfficial,
    ];

    /// Canonical lowercase task name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Cola => "cola",
            Self::Mnli => "mnli",
            Self::Mrpc => "mrpc",
            Self::Semeval => "semeval",
            Self::Semeval2 => "semeval2",
            Self::SemevalOfficial => "semevalofficial",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskKind {
    type Err = SeqfeatError;

    fn from_str(value: &str) -> Result<Self> {
        let lowered = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|task| task.name() == lowered)
            .ok_or_else(|| SeqfeatError::InvalidConfig(format!("task not found: {value}")))
    }
}
