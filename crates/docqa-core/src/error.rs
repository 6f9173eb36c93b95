use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self { Self::Extract(Box::new(e)) }
}

/// Failures of `VectorIndex` operations. Persisted state is never left half-written.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt index state at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Dimension mismatch: index holds {found}-d vectors, embedder produces {expected}-d")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Chunk {sequence_id} of '{source_id}' is already indexed")]
    DuplicateChunk { source_id: String, sequence_id: u64 },

    #[error("Chunk {sequence_id} of '{source_id}' has no text")]
    EmptyChunk { source_id: String, sequence_id: u64 },

    #[error("Vector backend error: {0}")]
    Backend(String),
}

impl IndexError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

#[derive(Debug, Error)]
#[error("Unknown provider '{name}'")]
pub struct UnknownProviderError {
    pub name: String,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures at the generation boundary. Always returned as a value.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    UnknownProvider(#[from] UnknownProviderError),

    #[error("{provider}: missing API key")]
    MissingCredentials { provider: String },

    #[error("{provider}: {parameter} = {value} is outside the accepted range {range}")]
    InvalidParameter { provider: String, parameter: &'static str, value: String, range: &'static str },

    #[error("{provider}: request failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: BoxError,
    },

    #[error("{provider}: API returned {status}: {body}")]
    Provider { provider: String, status: u16, body: String },

    #[error("{provider}: unexpected response: {reason}")]
    MalformedResponse { provider: String, reason: String },
}

impl GenerationError {
    pub fn provider(&self) -> &str {
        match self {
            Self::UnknownProvider(e) => &e.name,
            Self::MissingCredentials { provider }
            | Self::InvalidParameter { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Provider { provider, .. }
            | Self::MalformedResponse { provider, .. } => provider,
        }
    }
}

/// Raised when the retriever and the binder disagree on block count.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Citation binding mismatch: {blocks} context blocks but {metadata} metadata entries")]
pub struct CitationBindError {
    pub blocks: usize,
    pub metadata: usize,
}
