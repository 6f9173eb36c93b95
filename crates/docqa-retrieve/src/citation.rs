use docqa_core::{ChunkMetadata, CitationBindError};

use crate::retriever::BLOCK_DELIMITER;

/// `(Fonte: {source}, p. {page}, sec. {section})`, dropping page or section when unknown.
pub fn citation_token(meta: &ChunkMetadata) -> String {
    let mut token = format!("(Fonte: {}", meta.source);
    if let Some(page) = meta.page {
        token.push_str(&format!(", p. {page}"));
    }
    if let Some(section) = meta.section.as_deref().filter(|s| !s.is_empty()) {
        token.push_str(&format!(", sec. {section}"));
    }
    token.push(')');
    token
}

/// Appends each block's citation token and joins the blocks in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CitationBinder;

impl CitationBinder {
    pub fn new() -> Self { Self }

    pub fn annotate(&self, blocks: &[String], metadata: &[ChunkMetadata]) -> Result<Vec<String>, CitationBindError> {
        if blocks.len() != metadata.len() {
            return Err(CitationBindError { blocks: blocks.len(), metadata: metadata.len() });
        }
        Ok(blocks.iter().zip(metadata).map(|(b, m)| format!("{b} {}", citation_token(m))).collect())
    }

    pub fn bind(&self, blocks: &[String], metadata: &[ChunkMetadata]) -> Result<String, CitationBindError> {
        Ok(self.annotate(blocks, metadata)?.join(BLOCK_DELIMITER))
    }
}
