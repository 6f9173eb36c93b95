use docqa_core::GenerationConfig;
use docqa_generate::providers::{wire_format, Claude, Gemini, OpenAiCompatible, WireFormat};
use docqa_generate::{Prompt, ProviderKind};
use serde_json::json;

fn prompt() -> Prompt {
    Prompt { system: "SYS".into(), user: "USER".into() }
}

fn config() -> GenerationConfig {
    GenerationConfig { temperature: 0.3, top_p: 0.9, top_k: 20, max_output_tokens: 512 }
}

#[test]
fn gemini_renders_generate_content() {
    let g = Gemini;
    assert_eq!(
        g.endpoint("https://generativelanguage.googleapis.com/v1beta/", "gemini-1.5-flash"),
        "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
    );
    let body = g.body("gemini-1.5-flash", &prompt(), &config());
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "SYS");
    assert_eq!(body["contents"][0]["parts"][0]["text"], "USER");
    assert_eq!(body["generationConfig"]["topK"], 20);
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
    assert_eq!(g.headers("k")[0], ("x-goog-api-key", "k".to_string()));
}

#[test]
fn gemini_parses_candidates_and_blocks() {
    let ok = json!({ "candidates": [{ "content": { "parts": [{ "text": "Olá " }, { "text": "mundo" }] } }] });
    assert_eq!(Gemini.parse(&ok).unwrap(), "Olá mundo");
    let blocked = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
    assert!(Gemini.parse(&blocked).unwrap_err().contains("SAFETY"));
}

#[test]
fn openai_compatible_omits_top_k() {
    let o = OpenAiCompatible;
    assert_eq!(o.endpoint("https://api.deepseek.com", "deepseek-chat"), "https://api.deepseek.com/chat/completions");
    let body = o.body("deepseek-chat", &prompt(), &config());
    assert_eq!(body["model"], "deepseek-chat");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "USER");
    assert_eq!(body["max_tokens"], 512);
    assert!(body.get("top_k").is_none());
    assert_eq!(o.headers("k")[0].1, "Bearer k");

    let resp = json!({ "choices": [{ "message": { "role": "assistant", "content": "resposta" } }] });
    assert_eq!(o.parse(&resp).unwrap(), "resposta");
    assert!(o.parse(&json!({ "choices": [] })).is_err());
}

#[test]
fn claude_uses_messages_api() {
    let c = Claude;
    assert_eq!(c.endpoint("https://api.anthropic.com/v1", "m"), "https://api.anthropic.com/v1/messages");
    let body = c.body("claude-x", &prompt(), &config());
    assert_eq!(body["system"], "SYS");
    assert_eq!(body["messages"][0]["role"], "user");
    assert!(body.get("top_k").is_none());
    let headers = c.headers("k");
    assert!(headers.contains(&("anthropic-version", "2023-06-01".to_string())));

    let resp = json!({ "content": [{ "type": "thinking", "thinking": "..." }, { "type": "text", "text": "ok" }] });
    assert_eq!(c.parse(&resp).unwrap(), "ok");
    assert!(c.parse(&json!({ "content": [], "stop_reason": "max_tokens" })).unwrap_err().contains("max_tokens"));
}

#[test]
fn kinds_map_to_wire_formats() {
    let body = wire_format(ProviderKind::Gemini).body("m", &prompt(), &config());
    assert!(body.get("generationConfig").is_some());
    let body = wire_format(ProviderKind::Claude).body("m", &prompt(), &config());
    assert_eq!(body["system"], "SYS");
}
