//! Feature pipeline for BERT-style sequence classification.
//!
//! The crate reads task datasets (tab-separated GLUE files, line-aligned article and label
//! files, or a streaming XML corpus), tokenizes each example, and emits fixed-length
//! [`FeatureRecord`]s ready for a classifier. Conversion fans out over a worker pool while
//! keeping output order identical to input order. The `seqfeat` command line interface
//! wraps the same pipeline.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use seqfeat::{
//!     source_for, Converter, ExampleSource, FeatureAssembler, HfTokenizer, LabelMode,
//!     PipelineConfig, TaskKind,
//! };
//!
//! # fn main() -> seqfeat::Result<()> {
//! let cfg = PipelineConfig::builder()
//!     .max_seq_length(128)
//!     .permute_ngrams(Some(3))
//!     .show_progress(false)
//!     .build()?;
//! let mut source = source_for(TaskKind::Mrpc);
//! let examples = source.train_examples(Path::new("/data/MRPC"))?;
//! let tokenizer = Arc::new(HfTokenizer::wordpiece("/models/bert/vocab.txt", true)?);
//! let assembler = FeatureAssembler::new(tokenizer, LabelMode::labelled(&source.labels()), &cfg)?;
//! let output = Converter::new(assembler, cfg).convert(examples)?;
//! println!("{output}");
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature. Library-only users can drop
//! its dependencies with `seqfeat = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod augment;
pub mod config;
pub mod convert;
pub mod corpus;
pub mod error;
pub mod example;
pub mod features;
pub mod metrics;
pub mod report;
pub mod sources;
pub mod table;
pub mod tokenizer;
pub mod truncate;
pub mod xml;

#[cfg(test)]
mod testing;

pub use config::{PipelineBuilder, PipelineConfig, TaskKind};
pub use convert::{ConversionOutput, Converter};
pub use error::{Result, SeqfeatError};
pub use example::{FeatureRecord, LabelMap, LabelSet, RawExample};
pub use features::{FeatureAssembler, LabelMode};
pub use metrics::ConversionMetrics;
pub use sources::{source_for, source_with_workers, ExampleSource, Split};
pub use table::FeatureTable;
pub use tokenizer::{HfTokenizer, TokenId, Tokenizer};
pub use xml::{Article, ArticleReader};
