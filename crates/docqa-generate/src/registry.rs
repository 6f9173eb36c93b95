//! Static table of known providers.

use docqa_core::UnknownProviderError;

/// Wire family a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAiCompatible,
    Claude,
}

#[derive(Debug, Clone)]
pub struct ProviderEntry {
    /// Display name, matched case-insensitively.
    pub name: &'static str,
    pub kind: ProviderKind,
    pub base_url: &'static str,
    pub default_model: &'static str,
    /// Environment variable the CLI reads the API key from.
    pub env_key: &'static str,
}

static PROVIDERS: &[ProviderEntry] = &[
    ProviderEntry {
        name: "Gemini",
        kind: ProviderKind::Gemini,
        base_url: "https://generativelanguage.googleapis.com/v1beta",
        default_model: "gemini-1.5-flash",
        env_key: "GEMINI_API_KEY",
    },
    ProviderEntry {
        name: "OpenAI",
        kind: ProviderKind::OpenAiCompatible,
        base_url: "https://api.openai.com/v1",
        default_model: "gpt-4o-mini",
        env_key: "OPENAI_API_KEY",
    },
    ProviderEntry {
        name: "Claude",
        kind: ProviderKind::Claude,
        base_url: "https://api.anthropic.com/v1",
        default_model: "claude-sonnet-4-20250514",
        env_key: "ANTHROPIC_API_KEY",
    },
    ProviderEntry {
        name: "Deepseek",
        kind: ProviderKind::OpenAiCompatible,
        base_url: "https://api.deepseek.com",
        default_model: "deepseek-chat",
        env_key: "DEEPSEEK_API_KEY",
    },
    ProviderEntry {
        name: "Moonshot Kimi",
        kind: ProviderKind::OpenAiCompatible,
        base_url: "https://api.moonshot.cn/v1",
        default_model: "moonshot-v1-8k",
        env_key: "MOONSHOT_API_KEY",
    },
];

pub fn providers() -> &'static [ProviderEntry] { PROVIDERS }

pub fn lookup(name: &str) -> Result<&'static ProviderEntry, UnknownProviderError> {
    let wanted = name.trim();
    PROVIDERS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| UnknownProviderError { name: wanted.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_and_padding() {
        assert_eq!(lookup("gemini").unwrap().kind, ProviderKind::Gemini);
        assert_eq!(lookup("  moonshot kimi ").unwrap().base_url, "https://api.moonshot.cn/v1");
        assert_eq!(lookup("DEEPSEEK").unwrap().kind, ProviderKind::OpenAiCompatible);
        assert_eq!(lookup("llama").unwrap_err().name, "llama");
    }
}
