//! Prompt contract shared by every adapter.
//!
//! The system part carries the instruction, the citation mandate and the
//! optional persona; the user part carries the file list, the history, the
//! delimited context and the question, always in that order.

use docqa_core::GenerationRequest;

/// Replaced by `GenerationRequest::system_prompt` when one is set.
pub const DEFAULT_INSTRUCTION: &str = "Você é um assistente de pesquisa. Responda à última pergunta do usuário \
baseando-se apenas no \"Contexto\" extraído dos documentos e no \"Histórico da Conversa\".";

/// Always follows the instruction, whichever instruction is in use.
pub const CITATION_MANDATE: &str = "Instruções de Citação:\n\
- SEMPRE cite a fonte quando usar informações do contexto\n\
- Use o formato exato: (Fonte: <arquivo>, p. <página>, sec. <seção>)\n\
- Se a página ou a seção não estiver disponível, omita esse campo\n\
- Cada afirmação factual deve ter sua citação\n\
- Se o contexto não contiver a resposta, diga isso claramente";

pub const CONTEXT_DELIMITER: &str = "---";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub fn render(request: &GenerationRequest) -> Prompt {
    let mut system = request
        .system_prompt
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_INSTRUCTION)
        .trim()
        .to_string();
    system.push_str("\n\n");
    system.push_str(CITATION_MANDATE);
    if let Some(persona) = request.persona_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        system.push_str("\n\n**Persona:**\n");
        system.push_str(persona.trim());
    }

    let mut sections = Vec::with_capacity(4);
    if !request.file_list.is_empty() {
        let files = request.file_list.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        sections.push(format!("**Ficheiros carregados pelo usuário:** {files}"));
    }
    if !request.history.is_empty() {
        let lines =
            request.history.iter().map(|t| format!("{}: {}", t.role, t.content)).collect::<Vec<_>>().join("\n");
        sections.push(format!("**Histórico da Conversa:**\n{lines}"));
    }
    sections.push(format!(
        "**Contexto extraído dos documentos (use para basear a sua resposta):**\n{CONTEXT_DELIMITER}\n{}\n{CONTEXT_DELIMITER}",
        request.context
    ));
    sections.push(format!("**Última pergunta do usuário:** {}", request.question));

    Prompt { system, user: sections.join("\n\n") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::{ChatTurn, Role};

    #[test]
    fn sections_follow_fixed_order() {
        let mut req = GenerationRequest::new("Fonte: a.txt\nConteúdo: x (Fonte: a.txt, p. 1)", "O que diz a.txt?");
        req.file_list.insert("b.txt".into());
        req.file_list.insert("a.txt".into());
        req.history.push(ChatTurn::new(Role::User, "olá"));
        req.history.push(ChatTurn::new(Role::Assistant, "oi"));
        req.persona_prompt = Some("Seja conciso.".into());

        let p = render(&req);
        assert!(p.system.starts_with("Você é um assistente de pesquisa."));
        assert!(p.system.ends_with("**Persona:**\nSeja conciso."));

        let files = p.user.find("a.txt, b.txt").unwrap();
        let history = p.user.find("user: olá\nassistant: oi").unwrap();
        let context = p.user.find("---\nFonte: a.txt").unwrap();
        let question = p.user.find("O que diz a.txt?").unwrap();
        assert!(files < history && history < context && context < question);
    }

    #[test]
    fn override_keeps_citation_mandate() {
        let mut req = GenerationRequest::new("ctx", "q");
        req.system_prompt = Some("Answer in English.".into());
        let p = render(&req);
        assert!(p.system.starts_with("Answer in English.\n\n"));
        assert!(p.system.ends_with(CITATION_MANDATE));
        assert!(p.system.contains("(Fonte: <arquivo>, p. <página>, sec. <seção>)"));
        assert!(!p.system.contains(DEFAULT_INSTRUCTION));
        assert!(!p.user.contains("Histórico"));
        assert!(!p.user.contains("Ficheiros"));
    }

    #[test]
    fn blank_override_falls_back_to_default() {
        let mut req = GenerationRequest::new("ctx", "q");
        req.system_prompt = Some("   ".into());
        assert_eq!(render(&req).system, format!("{DEFAULT_INSTRUCTION}\n\n{CITATION_MANDATE}"));
    }
}
