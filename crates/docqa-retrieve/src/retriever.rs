use std::collections::HashSet;

use docqa_core::config::RetrievalSettings;
use docqa_core::{IndexError, MetadataFilter, RetrievalResult, ScoredChunk, VectorIndex};

/// Separator between rendered context blocks.
pub const BLOCK_DELIMITER: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    /// One filtered search per known source, concatenated.
    Coverage,
    /// A single top-k search.
    Focused,
}

/// Outcome of one `retrieve` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub mode: RetrievalMode,
    pub result: RetrievalResult,
    /// One rendered block per hit, in result order.
    pub blocks: Vec<String>,
}

impl Retrieval {
    /// Blocks joined with [`BLOCK_DELIMITER`].
    pub fn context(&self) -> String { self.blocks.join(BLOCK_DELIMITER) }
}

#[derive(Debug, Clone)]
pub struct Retriever {
    keywords: Vec<Vec<String>>,
    coverage_k: usize,
    coverage_prefix: String,
}

impl Retriever {
    pub fn new<I, S>(keywords: I, coverage_k: usize, coverage_prefix: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords.into_iter().map(|k| words(k.as_ref())).filter(|k| !k.is_empty()).collect();
        Self { keywords, coverage_k: coverage_k.max(1), coverage_prefix: coverage_prefix.into() }
    }

    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self::new(&settings.coverage_keywords, settings.coverage_k, settings.coverage_prefix.as_str())
    }

    /// Coverage when the question contains a keyword as a whole word (or word
    /// sequence for multi-word keywords), focused otherwise.
    pub fn mode(&self, question: &str) -> RetrievalMode {
        let tokens = words(question);
        let hit = self.keywords.iter().any(|kw| tokens.windows(kw.len()).any(|w| w == kw.as_slice()));
        if hit { RetrievalMode::Coverage } else { RetrievalMode::Focused }
    }

    pub fn retrieve(
        &self,
        index: &dyn VectorIndex,
        question: &str,
        known_sources: &[String],
        n_results: usize,
    ) -> Result<Retrieval, IndexError> {
        let mut mode = self.mode(question);
        if mode == RetrievalMode::Coverage && known_sources.is_empty() {
            tracing::debug!("coverage requested without known sources, searching focused");
            mode = RetrievalMode::Focused;
        }

        let result = match mode {
            RetrievalMode::Focused => index.search(question, n_results, None)?,
            RetrievalMode::Coverage => {
                let query = format!("{} {}", self.coverage_prefix, question);
                let mut seen = HashSet::new();
                let mut merged = RetrievalResult::default();
                for source in known_sources.iter().filter(|s| seen.insert(s.as_str())) {
                    let found = index.search(&query, self.coverage_k, Some(&MetadataFilter::Source(source.clone())))?;
                    if found.is_empty() {
                        tracing::debug!(source = %source, "no chunks for source, skipping");
                        continue;
                    }
                    merged.extend(found);
                }
                tracing::debug!(covered = merged.sources.len(), known = seen.len(), "coverage retrieval done");
                merged
            }
        };

        let blocks = result.hits.iter().map(format_block).collect();
        Ok(Retrieval { mode, result, blocks })
    }
}

/// `Fonte: {source}\nConteúdo: {text}`
pub fn format_block(hit: &ScoredChunk) -> String {
    format!("Fonte: {}\nConteúdo: {}", hit.metadata.source, hit.text)
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
