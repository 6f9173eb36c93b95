//! Domain types shared by the chunker, the vector backends, the retriever and
//! the generation layer.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::error::IndexError;

/// One provenance-tagged slice of a source document.
///
/// - `text`: the window payload, never empty
/// - `source`: originating document identifier (usually the file name)
/// - `page`: 1-based page number from the extractor's page breaks
/// - `section`: nearest heading above the window, empty when none was detected
/// - `sequence_id`: monotonic within one source; `(source, sequence_id)` is unique per index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub page: u32,
    pub section: String,
    pub sequence_id: u64,
}

impl Chunk {
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source: self.source.clone(),
            page: Some(self.page),
            section: if self.section.is_empty() { None } else { Some(self.section.clone()) },
            sequence_id: self.sequence_id,
        }
    }
}

/// Rejects a batch carrying an empty text or repeating a `(source, sequence_id)` key,
/// either within itself or against keys `indexed` already reports.
pub fn check_batch(chunks: &[Chunk], indexed: impl Fn(&str, u64) -> bool) -> Result<(), IndexError> {
    let mut seen = HashSet::new();
    for c in chunks {
        if c.text.is_empty() {
            return Err(IndexError::EmptyChunk { source_id: c.source.clone(), sequence_id: c.sequence_id });
        }
        if indexed(&c.source, c.sequence_id) || !seen.insert((c.source.as_str(), c.sequence_id)) {
            return Err(IndexError::DuplicateChunk { source_id: c.source.clone(), sequence_id: c.sequence_id });
        }
    }
    Ok(())
}

/// Structured provenance carried from chunking time to the citation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: Option<u32>,
    pub section: Option<String>,
    pub sequence_id: u64,
}

/// Equality predicate over chunk metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataFilter {
    Source(String),
    Page(u32),
    Section(String),
}

impl MetadataFilter {
    pub fn matches(&self, meta: &ChunkMetadata) -> bool {
        match self {
            Self::Source(s) => meta.source == *s,
            Self::Page(p) => meta.page == Some(*p),
            Self::Section(s) => meta.section.as_deref() == Some(s.as_str()),
        }
    }
}

/// A hit returned by a backend. `score` is cosine similarity, higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
}

/// Orders hits by descending score, then ascending `sequence_id`, then source.
pub fn compare_hits(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.metadata.sequence_id.cmp(&b.metadata.sequence_id))
        .then_with(|| a.metadata.source.cmp(&b.metadata.source))
}

/// Per-query result: ordered hits plus the set of contributing sources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
    pub sources: BTreeSet<String>,
}

impl RetrievalResult {
    pub fn from_hits(hits: Vec<ScoredChunk>) -> Self {
        let sources = hits.iter().map(|h| h.metadata.source.clone()).collect();
        Self { hits, sources }
    }

    /// Appends another result, keeping this result's order first.
    pub fn extend(&mut self, other: RetrievalResult) {
        self.sources.extend(other.sources);
        self.hits.extend(other.hits);
    }

    pub fn is_empty(&self) -> bool { self.hits.is_empty() }

    pub fn len(&self) -> usize { self.hits.len() }

    pub fn metadata(&self) -> Vec<ChunkMetadata> {
        self.hits.iter().map(|h| h.metadata.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::User => f.write_str("user"),
            Self::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Sampling parameters forwarded verbatim to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { temperature: 0.7, top_p: 0.95, top_k: 40, max_output_tokens: 2048 }
    }
}

/// Everything a provider adapter needs to render a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub context: String,
    pub question: String,
    pub history: Vec<ChatTurn>,
    pub file_list: BTreeSet<String>,
    pub generation_config: GenerationConfig,
    pub system_prompt: Option<String>,
    pub persona_prompt: Option<String>,
}

impl GenerationRequest {
    pub fn new(context: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            question: question.into(),
            history: Vec::new(),
            file_list: BTreeSet::new(),
            generation_config: GenerationConfig::default(),
            system_prompt: None,
            persona_prompt: None,
        }
    }
}
