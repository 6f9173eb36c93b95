//! docqa-core
//!
//! Domain types, error taxonomy, configuration, the chunker and the traits the
//! embedding and vector crates implement.

pub mod chunker;
pub mod config;
pub mod error;
pub mod ingest;
pub mod traits;
pub mod types;

pub use chunker::Chunker;
pub use error::{CitationBindError, ConfigError, GenerationError, IndexError, UnknownProviderError};
pub use traits::{Embedder, VectorIndex};
pub use types::{
    Chunk, ChunkMetadata, ChatTurn, GenerationConfig, GenerationRequest, MetadataFilter, RetrievalResult, Role,
    ScoredChunk,
};
