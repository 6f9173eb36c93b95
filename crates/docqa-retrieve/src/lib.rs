//! Query-time half of the pipeline: mode-switching retrieval over a
//! `VectorIndex` and citation binding of the formatted context blocks.

pub mod citation;
pub mod retriever;

pub use citation::{citation_token, CitationBinder};
pub use retriever::{format_block, Retrieval, RetrievalMode, Retriever, BLOCK_DELIMITER};
