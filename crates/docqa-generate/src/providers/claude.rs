use serde_json::{json, Value};

use docqa_core::GenerationConfig;

use super::{join_url, WireFormat};
use crate::prompt::Prompt;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API.
#[derive(Debug, Clone, Copy, Default)]
pub struct Claude;

impl WireFormat for Claude {
    fn endpoint(&self, base_url: &str, _model: &str) -> String { join_url(base_url, "messages") }

    fn headers(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![("x-api-key", api_key.to_string()), ("anthropic-version", ANTHROPIC_VERSION.to_string())]
    }

    fn body(&self, model: &str, prompt: &Prompt, config: &GenerationConfig) -> Value {
        json!({
            "model": model,
            "system": prompt.system,
            "messages": [{ "role": "user", "content": prompt.user }],
            "temperature": config.temperature,
            "top_p": config.top_p,
            "max_tokens": config.max_output_tokens,
        })
    }

    fn parse(&self, response: &Value) -> Result<String, String> {
        let blocks = response["content"].as_array().ok_or("response has no content array")?;
        let text: String = blocks
            .iter()
            .filter(|b| b["type"].as_str() == Some("text"))
            .filter_map(|b| b["text"].as_str())
            .collect();
        if text.is_empty() {
            let reason = response["stop_reason"].as_str().unwrap_or("unknown");
            return Err(format!("no text blocks (stop_reason: {reason})"));
        }
        Ok(text)
    }
}
