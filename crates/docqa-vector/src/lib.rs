//! Vector backends behind the `VectorIndex` contract.
//!
//! - `flat`: exact in-process search persisted to a single blob file
//! - `managed`: LanceDB collection with filter pushdown

use std::sync::Arc;

use docqa_core::config::{BackendKind, VectorStoreSettings};
use docqa_core::{Embedder, IndexError, VectorIndex};

pub mod flat;
pub mod managed;
pub mod schema;
pub mod table;

pub use flat::FlatIndex;
pub use managed::ManagedCollection;

/// Opens the backend selected by `vector_store.backend`.
pub fn open_index(settings: &VectorStoreSettings, embedder: Arc<dyn Embedder>) -> Result<Box<dyn VectorIndex>, IndexError> {
    match settings.backend {
        BackendKind::Flat => Ok(Box::new(FlatIndex::open(&settings.flat.path, embedder)?)),
        BackendKind::Managed => Ok(Box::new(ManagedCollection::open(
            &settings.managed.path,
            &settings.managed.collection_name,
            embedder,
        )?)),
    }
}
