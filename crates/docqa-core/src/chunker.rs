//! Page/section aware sliding-window chunker.
//!
//! Text is split on the extractor's page-break marker, each page is split into
//! sections at heading-like lines, and each section is cut into windows of
//! `chunk_size` code points advancing by `chunk_size - chunk_overlap`. Windows
//! stop once one reaches the end of the span, so a span of `L` code points yields
//! `ceil(max(L - overlap, 1) / (size - overlap))` chunks.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ChunkingSettings;
use crate::error::ConfigError;
use crate::types::Chunk;

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\p{Lu}.{2,39}$").expect("heading pattern"));
static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+\S").expect("sentence pattern"));

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    page_break: String,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ConfigError> {
        Self::from_settings(&ChunkingSettings { chunk_size, chunk_overlap, ..ChunkingSettings::default() })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self, ConfigError> {
        if settings.chunk_size == 0 || settings.chunk_overlap >= settings.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunk_overlap ({}) must be < chunk_size ({}) and chunk_size > 0",
                settings.chunk_overlap, settings.chunk_size
            )));
        }
        if settings.page_break.is_empty() {
            return Err(ConfigError::Invalid("page_break must not be empty".into()));
        }
        Ok(Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
            page_break: settings.page_break.clone(),
        })
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }

    pub fn chunk_overlap(&self) -> usize { self.chunk_overlap }

    /// Splits `text` into provenance-tagged chunks. Deterministic; empty input yields no chunks.
    pub fn chunk(&self, text: &str, source_id: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        if text.is_empty() {
            return chunks;
        }
        let mut sequence_id = 0u64;
        for (page_index, page_text) in text.split(self.page_break.as_str()).enumerate() {
            let page = u32::try_from(page_index + 1).unwrap_or(u32::MAX);
            for (section, body) in split_sections(page_text) {
                for window in self.windows(&body) {
                    chunks.push(Chunk {
                        text: window.to_string(),
                        source: source_id.to_string(),
                        page,
                        section: section.clone(),
                        sequence_id,
                    });
                    sequence_id += 1;
                }
            }
        }
        tracing::debug!(source = source_id, chunks = chunks.len(), "chunked document");
        chunks
    }

    fn windows<'a>(&self, span: &'a str) -> Vec<&'a str> {
        let bounds: Vec<usize> = span.char_indices().map(|(i, _)| i).chain(std::iter::once(span.len())).collect();
        let len = bounds.len() - 1;
        if len == 0 {
            return Vec::new();
        }
        let step = self.chunk_size - self.chunk_overlap;
        let mut out = Vec::new();
        let mut start = 0usize;
        loop {
            let end = (start + self.chunk_size).min(len);
            out.push(&span[bounds[start]..bounds[end]]);
            if end == len {
                break;
            }
            start += step;
        }
        out
    }
}

/// A short, capitalized, standalone line that does not read like a sentence.
pub fn is_heading(line: &str) -> bool {
    let line = line.trim();
    HEADING.is_match(line) && !line.ends_with(TRAILING_PUNCTUATION) && !SENTENCE_BREAK.is_match(line)
}

/// `(heading, body)` spans of one page; text before the first heading gets an empty heading.
fn split_sections(page: &str) -> Vec<(String, String)> {
    let mut sections = Vec::new();
    let mut heading = String::new();
    let mut body: Vec<&str> = Vec::new();
    for line in page.lines() {
        if is_heading(line) {
            push_section(&mut sections, &heading, &body);
            heading = line.trim().to_string();
            body.clear();
        } else {
            body.push(line);
        }
    }
    push_section(&mut sections, &heading, &body);
    sections
}

fn push_section(sections: &mut Vec<(String, String)>, heading: &str, body: &[&str]) {
    let text = body.join("\n");
    let text = text.trim();
    if !text.is_empty() {
        sections.push((heading.to_string(), text.to_string()));
    }
}
