use serde_json::{json, Value};

use docqa_core::GenerationConfig;

use super::{join_url, WireFormat};
use crate::prompt::Prompt;

/// Chat Completions, as served by OpenAI, Deepseek and Moonshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiCompatible;

impl WireFormat for OpenAiCompatible {
    fn endpoint(&self, base_url: &str, _model: &str) -> String { join_url(base_url, "chat/completions") }

    fn headers(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![("Authorization", format!("Bearer {api_key}"))]
    }

    fn body(&self, model: &str, prompt: &Prompt, config: &GenerationConfig) -> Value {
        json!({
            "model": model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
            "temperature": config.temperature,
            "top_p": config.top_p,
            "max_tokens": config.max_output_tokens,
        })
    }

    fn parse(&self, response: &Value) -> Result<String, String> {
        let choice = response["choices"].get(0).ok_or("no choices in response")?;
        match choice["message"]["content"].as_str() {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => {
                let reason = choice["finish_reason"].as_str().unwrap_or("unknown");
                Err(format!("choice has no text content (finish_reason: {reason})"))
            }
        }
    }
}
