use std::collections::BTreeSet;

use crate::error::IndexError;
use crate::types::{Chunk, MetadataFilter, RetrievalResult};

/// Embedding collaborator: fixed-dimension, L2-normalized vectors for a batch of strings.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the model behind this embedder.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Storage plus similarity search over embedded chunks.
///
/// `add` takes `&mut self`: writers are serialized per instance, readers may
/// run concurrently through `&self`. Zero hits is an empty result, never an error.
pub trait VectorIndex: Send + Sync {
    /// Short backend label for logs and status output.
    fn backend(&self) -> &'static str;

    /// Embeds and appends `chunks`, persisting before returning. Cumulative.
    fn add(&mut self, chunks: &[Chunk]) -> Result<(), IndexError>;

    /// Up to `k` hits by descending similarity, ties by ascending `sequence_id`.
    fn search(&self, query: &str, k: usize, filter: Option<&MetadataFilter>) -> Result<RetrievalResult, IndexError>;

    fn count(&self) -> Result<usize, IndexError>;

    /// Distinct `source` values currently indexed.
    fn sources(&self) -> Result<BTreeSet<String>, IndexError>;

    /// Drops every entry and persists the empty state.
    fn clear(&mut self) -> Result<(), IndexError>;
}
