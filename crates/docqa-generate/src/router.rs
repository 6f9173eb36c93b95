use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use docqa_core::config::{ProviderSettings, Settings};
use docqa_core::{GenerationConfig, GenerationError, GenerationRequest};
use serde_json::Value;

use crate::prompt;
use crate::providers::{wire_format, WireFormat};
use crate::registry::{self, ProviderEntry, ProviderKind};

/// Per-request model selection; unset fields fall back to settings, then to the registry.
pub type ModelConfig = ProviderSettings;

/// Provider credentials. The key never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self { Self { api_key: api_key.into() } }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("api_key", &"<redacted>").finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Resolving,
    Prompting,
    Dispatching,
    Succeeded,
    Failed,
}

/// Resolves provider names to handles and runs one generation per call.
#[derive(Debug, Clone)]
pub struct GenerationRouter {
    providers: BTreeMap<String, ProviderSettings>,
    timeout: Duration,
}

impl Default for GenerationRouter {
    fn default() -> Self { Self { providers: BTreeMap::new(), timeout: Duration::from_secs(120) } }
}

impl GenerationRouter {
    pub fn new(providers: BTreeMap<String, ProviderSettings>, timeout: Duration) -> Self { Self { providers, timeout } }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.providers.clone(), Duration::from_secs(settings.generation.timeout_secs))
    }

    fn configured(&self, entry: &ProviderEntry) -> Option<&ProviderSettings> {
        self.providers.iter().find(|(name, _)| name.trim().eq_ignore_ascii_case(entry.name)).map(|(_, s)| s)
    }

    /// Builds a fresh handle; nothing is cached between requests.
    pub fn resolve(
        &self,
        provider_name: &str,
        credentials: &Credentials,
        model_config: &ModelConfig,
    ) -> Result<ProviderHandle, GenerationError> {
        let entry = registry::lookup(provider_name)?;
        let provider = entry.name.to_string();
        if credentials.api_key.trim().is_empty() {
            return Err(GenerationError::MissingCredentials { provider });
        }
        let configured = self.configured(entry);
        let pick = |explicit: &Option<String>, from_settings: Option<&Option<String>>, fallback: &str| {
            explicit
                .clone()
                .or_else(|| from_settings.and_then(|s| s.clone()))
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        let model = pick(&model_config.model, configured.map(|c| &c.model), entry.default_model);
        let base_url = pick(&model_config.base_url, configured.map(|c| &c.base_url), entry.base_url);
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| GenerationError::Transport { provider: provider.clone(), source: Box::new(e) })?;
        Ok(ProviderHandle { entry, model, base_url, api_key: credentials.api_key.clone(), client })
    }

    /// Runs `Resolving → Prompting → Dispatching → {Succeeded | Failed}` once. No retries.
    pub fn generate(
        &self,
        provider_name: &str,
        credentials: &Credentials,
        model_config: &ModelConfig,
        request: &GenerationRequest,
    ) -> Result<String, GenerationError> {
        tracing::debug!(provider = provider_name, stage = ?Stage::Resolving);
        let outcome = self.resolve(provider_name, credentials, model_config).and_then(|handle| handle.generate(request));
        match &outcome {
            Ok(text) => tracing::debug!(provider = provider_name, stage = ?Stage::Succeeded, chars = text.len()),
            Err(e) => tracing::warn!(provider = provider_name, stage = ?Stage::Failed, error = %e),
        }
        outcome
    }
}

/// A resolved provider holding its credentials, model and HTTP client.
pub struct ProviderHandle {
    entry: &'static ProviderEntry,
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("provider", &self.entry.name)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ProviderHandle {
    pub fn provider(&self) -> &'static str { self.entry.name }

    pub fn kind(&self) -> ProviderKind { self.entry.kind }

    pub fn model(&self) -> &str { &self.model }

    pub fn base_url(&self) -> &str { &self.base_url }

    fn wire(&self) -> &'static dyn WireFormat { wire_format(self.entry.kind) }

    pub fn endpoint(&self) -> String { self.wire().endpoint(&self.base_url, &self.model) }

    /// Validates parameters and renders the JSON body without sending it.
    pub fn request_body(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        validate(self.entry, &request.generation_config)?;
        let prompt = prompt::render(request);
        Ok(self.wire().body(&self.model, &prompt, &request.generation_config))
    }

    pub fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let provider = self.entry.name;
        tracing::debug!(provider, model = %self.model, stage = ?Stage::Prompting);
        let body = self.request_body(request)?;

        let url = self.endpoint();
        tracing::debug!(provider, url = %url, stage = ?Stage::Dispatching);
        let mut builder = self.client.post(&url).json(&body);
        for (name, value) in self.wire().headers(&self.api_key) {
            builder = builder.header(name, value);
        }
        let transport = |e: reqwest::Error| GenerationError::Transport { provider: provider.to_string(), source: Box::new(e) };
        let response = builder.send().map_err(transport)?;
        let status = response.status();
        let text = response.text().map_err(transport)?;
        if !status.is_success() {
            return Err(GenerationError::Provider { provider: provider.to_string(), status: status.as_u16(), body: text });
        }
        let json: Value = serde_json::from_str(&text).map_err(|e| GenerationError::MalformedResponse {
            provider: provider.to_string(),
            reason: format!("invalid JSON: {e}"),
        })?;
        self.wire()
            .parse(&json)
            .map_err(|reason| GenerationError::MalformedResponse { provider: provider.to_string(), reason })
    }
}

/// Checks `config` against the ranges `entry`'s API accepts.
pub fn validate(entry: &ProviderEntry, config: &GenerationConfig) -> Result<(), GenerationError> {
    let invalid = |parameter: &'static str, value: String, range: &'static str| GenerationError::InvalidParameter {
        provider: entry.name.to_string(),
        parameter,
        value,
        range,
    };
    let (max_temperature, temperature_range) = match entry.kind {
        ProviderKind::Claude => (1.0, "0..=1"),
        ProviderKind::Gemini | ProviderKind::OpenAiCompatible => (2.0, "0..=2"),
    };
    if !(0.0..=max_temperature).contains(&config.temperature) {
        return Err(invalid("temperature", config.temperature.to_string(), temperature_range));
    }
    if !(0.0..=1.0).contains(&config.top_p) {
        return Err(invalid("top_p", config.top_p.to_string(), "0..=1"));
    }
    if entry.kind == ProviderKind::Gemini && config.top_k == 0 {
        return Err(invalid("top_k", config.top_k.to_string(), ">= 1"));
    }
    if config.max_output_tokens == 0 {
        return Err(invalid("max_output_tokens", config.max_output_tokens.to_string(), ">= 1"));
    }
    Ok(())
}
