//! Provider-agnostic generation: a static provider registry, one prompt
//! contract, and blocking HTTP adapters for each wire family.

pub mod prompt;
pub mod providers;
pub mod registry;
pub mod router;

pub use prompt::{render, Prompt, CITATION_MANDATE, DEFAULT_INSTRUCTION};
pub use registry::{lookup, providers, ProviderEntry, ProviderKind};
pub use router::{validate, Credentials, GenerationRouter, ModelConfig, ProviderHandle};
