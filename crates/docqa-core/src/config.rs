//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Nested keys in the environment are separated by `__`
//! (e.g. `APP_CHUNKING__CHUNK_SIZE=800`). Relative paths in the settings are
//! resolved against the directory the configuration was loaded from.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::GenerationConfig;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Loads from the current working directory.
    pub fn load() -> Result<Self, ConfigError> {
        let cwd = env::current_dir().map_err(|e| ConfigError::Invalid(format!("cannot read working directory: {e}")))?;
        Self::load_from(&cwd)
    }

    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: dir.to_path_buf() };
        config.settings()?;
        Ok(config)
    }

    /// Wraps an already-assembled figment; relative paths resolve against `base_dir`.
    pub fn from_figment(figment: Figment, base_dir: impl Into<PathBuf>) -> Self {
        Self { figment, base_dir: base_dir.into() }
    }

    pub fn get<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: serde::de::DeserializeOwned,
    {
        Ok(self.figment.extract_inner(key)?)
    }

    /// Extracts, resolves and validates the typed settings.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let mut settings: Settings = self.figment.extract()?;
        settings.resolve_paths(&self.base_dir);
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub generation: GenerationSettings,
    /// Per-provider overrides keyed by provider name (e.g. `Gemini`).
    pub providers: BTreeMap<String, ProviderSettings>,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.chunking;
        if c.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunking.chunk_size must be > 0".into()));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunking.chunk_overlap ({}) must be < chunking.chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.page_break.is_empty() {
            return Err(ConfigError::Invalid("chunking.page_break must not be empty".into()));
        }
        if self.retrieval.n_results == 0 {
            return Err(ConfigError::Invalid("retrieval.n_results must be > 0".into()));
        }
        if self.retrieval.coverage_k == 0 {
            return Err(ConfigError::Invalid("retrieval.coverage_k must be > 0".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::Invalid("embedding.batch_size must be > 0".into()));
        }
        if self.embedding.dim == 0 {
            return Err(ConfigError::Invalid("embedding.dim must be > 0".into()));
        }
        if self.vector_store.managed.collection_name.trim().is_empty() {
            return Err(ConfigError::Invalid("vector_store.managed.collection_name must not be empty".into()));
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let flat = resolve_with_base(base, self.vector_store.flat.path.to_string_lossy());
        self.vector_store.flat.path = flat;
        let managed = resolve_with_base(base, self.vector_store.managed.path.to_string_lossy());
        self.vector_store.managed.path = managed;
        if !self.embedding.is_hashing() {
            self.embedding.model = resolve_with_base(base, &self.embedding.model).to_string_lossy().into_owned();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Window length in code points.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Marker the extractor inserts between pages.
    pub page_break: String,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200, page_break: "\u{000C}".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub n_results: usize,
    /// Hits requested per source in coverage mode.
    pub coverage_k: usize,
    pub coverage_keywords: Vec<String>,
    /// Prepended to the question for each per-source coverage query.
    pub coverage_prefix: String,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        let keywords = ["overview", "summary", "resumo", "sumário", "todos", "cada", "all", "every", "textos"];
        Self {
            n_results: 10,
            coverage_k: 2,
            coverage_keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            coverage_prefix: "abstract introduction summary conclusion".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// `hash` for the built-in hashing embedder, otherwise a model directory.
    pub model: String,
    /// `cpu`, `metal` or `cuda`.
    pub device: String,
    pub batch_size: usize,
    /// Output dimension of the hashing embedder.
    pub dim: usize,
}

impl EmbeddingSettings {
    pub const HASHING_MODEL: &'static str = "hash";

    pub fn is_hashing(&self) -> bool { self.model == Self::HASHING_MODEL }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model: Self::HASHING_MODEL.to_string(), device: "cpu".to_string(), batch_size: 32, dim: 384 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Flat,
    Managed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    pub backend: BackendKind,
    pub flat: FlatSettings,
    pub managed: ManagedSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatSettings {
    pub path: PathBuf,
}

impl Default for FlatSettings {
    fn default() -> Self { Self { path: PathBuf::from("data/flat_index.bin") } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagedSettings {
    pub path: PathBuf,
    pub collection_name: String,
}

impl Default for ManagedSettings {
    fn default() -> Self {
        Self { path: PathBuf::from("data/lancedb"), collection_name: "documents".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub system_prompt: Option<String>,
    pub persona_prompt: Option<String>,
    pub timeout_secs: u64,
}

impl GenerationSettings {
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        let g = GenerationConfig::default();
        Self {
            temperature: g.temperature,
            top_p: g.top_p,
            top_k: g.top_k,
            max_output_tokens: g.max_output_tokens,
            system_prompt: None,
            persona_prompt: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
