//! Single-pass, bounded-memory iteration over `<article>` elements of a large XML corpus.
//!
//! The reader pulls one event at a time into a reusable scratch buffer. Each article is
//! materialised as an owned [`Article`] and handed to the caller; nothing of it is kept
//! afterwards, so memory stays proportional to the largest single element rather than to
//! the corpus.

use std::borrow::Cow;
use std::fmt;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Result, SeqfeatError};

/// Default element wrapping one document.
pub const DEFAULT_ARTICLE_TAG: &str = "article";
/// Default child element holding the text to classify.
pub const DEFAULT_CONTENT_TAG: &str = "spacy";

/// One article extracted from the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// Value of the article's `id` attribute.
    pub id: String,
    /// Normalised text of the content node.
    pub text: String,
}

/// Lazy, non-restartable iterator over the articles of one XML stream.
pub struct ArticleReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    article_tag: Vec<u8>,
    content_tag: Vec<u8>,
    source: PathBuf,
    finished: bool,
}

impl<R: BufRead> ArticleReader<R> {
    /// Creates a reader using the default `<article>` / `<spacy>` tags.
    ///
    /// `source` only labels errors.
    pub fn new(input: R, source: impl Into<PathBuf>) -> Self {
        Self::with_tags(input, source, DEFAULT_ARTICLE_TAG, DEFAULT_CONTENT_TAG)
    }

    /// Creates a reader for custom article and content tag names.
    pub fn with_tags(
        input: R,
        source: impl Into<PathBuf>,
        article_tag: &str,
        content_tag: &str,
    ) -> Self {
        Self {
            reader: Reader::from_reader(input),
            buf: Vec::with_capacity(4096),
            article_tag: article_tag.as_bytes().to_vec(),
            content_tag: content_tag.as_bytes().to_vec(),
            source: source.into(),
            finished: false,
        }
    }

    /// Bytes currently reserved by the event scratch buffer.
    #[must_use]
    pub fn scratch_capacity(&self) -> usize {
        self.buf.capacity()
    }

    fn error(&self, message: impl fmt::Display) -> SeqfeatError {
        malformed(&self.source, self.reader.buffer_position(), message)
    }

    fn missing_content(&self, id: &str) -> SeqfeatError {
        let tag = String::from_utf8_lossy(&self.content_tag);
        self.error(format!("article {id} has no <{tag}> node"))
    }

    /// Consumes events up to the end of the current article, collecting content text.
    fn read_article(&mut self, id: String) -> Result<Article> {
        let mut raw = String::new();
        let mut depth = 1usize;
        let mut content_depth = 0usize;
        let mut seen_content = false;

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Err(err) => {
                    let position = self.reader.buffer_position();
                    return Err(malformed(&self.source, position, format!("article {id}: {err}")));
                }
                Ok(Event::Start(start)) => {
                    depth += 1;
                    if content_depth > 0 {
                        content_depth += 1;
                    } else if depth == 2
                        && !seen_content
                        && start.local_name().as_ref() == self.content_tag.as_slice()
                    {
                        content_depth = 1;
                        seen_content = true;
                    }
                }
                Ok(Event::Empty(start)) => {
                    if depth == 1 && start.local_name().as_ref() == self.content_tag.as_slice() {
                        seen_content = true;
                    }
                }
                Ok(Event::End(_)) => {
                    content_depth = content_depth.saturating_sub(1);
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Ok(Event::Text(text)) if content_depth > 0 => {
                    raw.push_str(&decode_html_entities(&String::from_utf8_lossy(&text)));
                }
                Ok(Event::CData(data)) if content_depth > 0 => {
                    raw.push_str(&String::from_utf8_lossy(&data));
                }
                Ok(Event::Eof) => {
                    let position = self.reader.buffer_position();
                    let message = format!("document ended inside article {id}");
                    return Err(malformed(&self.source, position, message));
                }
                Ok(_) => {}
            }
        }

        if !seen_content {
            return Err(self.missing_content(&id));
        }
        Ok(Article {
            id,
            text: normalize_text(&raw),
        })
    }

    /// Advances to the next article start tag, returning its id and whether it was self-closing.
    fn next_article_start(&mut self) -> Result<Option<(String, bool)>> {
        loop {
            self.buf.clear();
            let position = self.reader.buffer_position();
            match self.reader.read_event_into(&mut self.buf) {
                Err(err) => return Err(malformed(&self.source, position, err)),
                Ok(Event::Eof) => return Ok(None),
                Ok(Event::Start(start)) if start.local_name().as_ref() == self.article_tag.as_slice() => {
                    return article_id(&start, &self.source, position).map(|id| Some((id, false)));
                }
                Ok(Event::Empty(start)) if start.local_name().as_ref() == self.article_tag.as_slice() => {
                    return article_id(&start, &self.source, position).map(|id| Some((id, true)));
                }
                Ok(_) => {}
            }
        }
    }
}

fn malformed(source: &Path, position: impl fmt::Display, message: impl fmt::Display) -> SeqfeatError {
    SeqfeatError::format(source, None, format!("{message} (byte {position})"))
}

fn article_id(start: &BytesStart<'_>, source: &Path, position: impl fmt::Display + Copy) -> Result<String> {
    let attr = start
        .try_get_attribute("id")
        .map_err(|err| malformed(source, position, err))?
        .ok_or_else(|| malformed(source, position, "article without an id attribute"))?;
    Ok(decode_html_entities(&String::from_utf8_lossy(&attr.value)).into_owned())
}

impl<R: BufRead> Iterator for ArticleReader<R> {
    type Item = Result<Article>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = match self.next_article_start() {
            Ok(None) => {
                self.finished = true;
                return None;
            }
            Ok(Some((id, false))) => self.read_article(id),
            Ok(Some((id, true))) => Err(self.missing_content(&id)),
            Err(err) => Err(err),
        };
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

/// Decodes HTML entities, lowercases, and collapses whitespace runs into single spaces.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    let decoded = decode_html_entities(raw).to_lowercase();
    let mut out = String::with_capacity(decoded.len());
    for word in decoded.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Replaces named and numeric HTML entities; unknown or unterminated `&` sequences are kept.
#[must_use]
pub fn decode_html_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let resolved = after
            .find(';')
            .filter(|&end| end > 0 && end <= 32)
            .and_then(|end| resolve_entity(&after[..end]).map(|value| (end, value)));
        match resolved {
            Some((end, value)) => {
                out.push_str(&value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn resolve_entity(entity: &str) -> Option<Cow<'static, str>> {
    if let Some(number) = entity.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse::<u32>().ok()?,
        };
        return char::from_u32(code)
            .filter(|&ch| ch != '\0')
            .map(|ch| Cow::Owned(ch.to_string()));
    }
    resolve_html5_entity(entity).map(Cow::Borrowed)
}
