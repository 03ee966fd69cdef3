use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use super::{ExampleSource, HYPERPARTISAN_LABELS};
use crate::corpus::{locate_corpus_file, open_buffered};
use crate::error::{Result, SeqfeatError};
use crate::example::{LabelSet, RawExample};
use crate::xml::ArticleReader;

/// File name of the normalized corpus inside the spill directory.
const SPILL_FILE: &str = "articles.xml";

/// External clean-up step applied to the raw corpus before parsing.
///
/// The output is written to a fresh file and parsed from there, so the input stream is
/// consumed exactly once.
pub trait CorpusNormalizer: Send + Sync {
    /// Copies `input` to `output`, normalizing along the way.
    fn normalize(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<()>;
}

/// Normalizer that leaves the corpus untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughNormalizer;

impl CorpusNormalizer for PassthroughNormalizer {
    fn normalize(&self, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
        io::copy(input, output).map_err(|err| SeqfeatError::io(err, None))?;
        Ok(())
    }
}

/// Inference-only source over a directory holding a single `.xml` article corpus.
///
/// Each article becomes one unlabelled example whose id is the article's `id` attribute.
#[derive(Clone)]
pub struct StreamingXmlSource {
    normalizer: Arc<dyn CorpusNormalizer>,
    spill_dir: Option<PathBuf>,
}

impl fmt::Debug for StreamingXmlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingXmlSource")
            .field("spill_dir", &self.spill_dir)
            .finish_non_exhaustive()
    }
}

impl Default for StreamingXmlSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingXmlSource {
    /// Source with a pass-through normalizer, spilling next to the data directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            normalizer: Arc::new(PassthroughNormalizer),
            spill_dir: None,
        }
    }

    /// Replaces the normalization step.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Arc<dyn CorpusNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Writes the normalized corpus under `dir` instead of `<data dir>_preprocessed`.
    #[must_use]
    pub fn with_spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = Some(dir.into());
        self
    }

    fn spill_path(&self, data_dir: &Path) -> PathBuf {
        let dir = match &self.spill_dir {
            Some(dir) => dir.clone(),
            None => {
                // Rebuilding from components drops any trailing separator.
                let mut name = data_dir.components().collect::<PathBuf>().into_os_string();
                name.push("_preprocessed");
                PathBuf::from(name)
            }
        };
        dir.join(SPILL_FILE)
    }

    /// Normalizes the corpus found in `dir` and returns a lazy reader over its articles.
    pub fn articles(&self, dir: &Path) -> Result<ArticleReader<BufReader<File>>> {
        let corpus = locate_corpus_file(dir, "xml")?;
        let spill = self.spill_path(dir);
        if let Some(parent) = spill.parent() {
            fs::create_dir_all(parent).map_err(|err| SeqfeatError::io(err, Some(parent.to_path_buf())))?;
        }

        let mut input = open_buffered(&corpus)?;
        let file = File::create(&spill).map_err(|err| SeqfeatError::io(err, Some(spill.clone())))?;
        let mut output = BufWriter::new(file);
        self.normalizer.normalize(&mut input, &mut output)?;
        output
            .flush()
            .map_err(|err| SeqfeatError::io(err, Some(spill.clone())))?;
        info!("normalized {} into {}", corpus.display(), spill.display());

        Ok(ArticleReader::new(open_buffered(&spill)?, spill))
    }
}

impl ExampleSource for StreamingXmlSource {
    fn name(&self) -> &'static str {
        "streaming-xml"
    }

    fn train_examples(&mut self, _dir: &Path) -> Result<Vec<RawExample>> {
        Err(SeqfeatError::NotSupported {
            operation: "train_examples",
            source_kind: "streaming-xml",
        })
    }

    fn dev_examples(&mut self, dir: &Path) -> Result<Vec<RawExample>> {
        let examples = self
            .articles(dir)?
            .map(|article| article.map(|a| RawExample::single(a.id, a.text, None)))
            .collect::<Result<Vec<_>>>()?;
        info!("read {} articles for inference", examples.len());
        Ok(examples)
    }

    fn labels(&self) -> LabelSet {
        LabelSet::fixed(HYPERPARTISAN_LABELS)
    }
}
