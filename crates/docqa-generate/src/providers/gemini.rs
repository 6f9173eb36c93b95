use serde_json::{json, Value};

use docqa_core::GenerationConfig;

use super::{join_url, WireFormat};
use crate::prompt::Prompt;

/// Google Generative Language `generateContent`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gemini;

impl WireFormat for Gemini {
    fn endpoint(&self, base_url: &str, model: &str) -> String {
        join_url(base_url, &format!("models/{model}:generateContent"))
    }

    fn headers(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![("x-goog-api-key", api_key.to_string())]
    }

    fn body(&self, _model: &str, prompt: &Prompt, config: &GenerationConfig) -> Value {
        json!({
            "systemInstruction": { "parts": [{ "text": prompt.system }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt.user }] }],
            "generationConfig": {
                "temperature": config.temperature,
                "topP": config.top_p,
                "topK": config.top_k,
                "maxOutputTokens": config.max_output_tokens,
            }
        })
    }

    fn parse(&self, response: &Value) -> Result<String, String> {
        let Some(candidate) = response["candidates"].get(0) else {
            return match response["promptFeedback"]["blockReason"].as_str() {
                Some(reason) => Err(format!("prompt blocked: {reason}")),
                None => Err("no candidates in response".to_string()),
            };
        };
        let parts = candidate["content"]["parts"].as_array().ok_or("candidate has no content parts")?;
        let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        if text.is_empty() {
            let reason = candidate["finishReason"].as_str().unwrap_or("unknown");
            return Err(format!("empty candidate (finishReason: {reason})"));
        }
        Ok(text)
    }
}
