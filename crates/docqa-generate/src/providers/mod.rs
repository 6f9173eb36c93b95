//! Per-provider wire formats behind one request/response contract.

use serde_json::Value;

use docqa_core::GenerationConfig;

use crate::prompt::Prompt;
use crate::registry::ProviderKind;

pub mod claude;
pub mod gemini;
pub mod openai;

pub use claude::Claude;
pub use gemini::Gemini;
pub use openai::OpenAiCompatible;

/// How one provider family shapes requests and answers.
pub trait WireFormat: Send + Sync {
    fn endpoint(&self, base_url: &str, model: &str) -> String;

    /// Authentication and version headers.
    fn headers(&self, api_key: &str) -> Vec<(&'static str, String)>;

    /// JSON body; parameters the provider does not accept are left out.
    fn body(&self, model: &str, prompt: &Prompt, config: &GenerationConfig) -> Value;

    /// Extracts the answer text, or explains why the payload is unusable.
    fn parse(&self, response: &Value) -> Result<String, String>;
}

pub fn wire_format(kind: ProviderKind) -> &'static dyn WireFormat {
    match kind {
        ProviderKind::Gemini => &Gemini,
        ProviderKind::OpenAiCompatible => &OpenAiCompatible,
        ProviderKind::Claude => &Claude,
    }
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
