use std::collections::HashMap;

use super::{ChatMessage, CompiledPrompt, PromptResolver, Role, compile};

const TEMPLATES: &[(&str, &str)] = &[
    (
        "generazione-referto",
        include_str!("../../data/prompts/generazione-referto.txt"),
    ),
    (
        "generazione-nota",
        include_str!("../../data/prompts/generazione-nota.txt"),
    ),
    (
        "generazione-esame",
        include_str!("../../data/prompts/generazione-esame.txt"),
    ),
];

/// Chat templates compiled into the binary, for running without Langfuse.
#[derive(Default)]
pub struct BuiltinPromptResolver;

impl BuiltinPromptResolver {
    pub fn new() -> Self {
        Self
    }

    fn template(name: &str) -> Option<&'static str> {
        TEMPLATES
            .iter()
            .find(|(template_name, _)| *template_name == name)
            .map(|(_, body)| *body)
    }
}

/// Splits a template into messages at `## <role>` header lines. Text before the
/// first header is a user message.
fn parse_sections(template: &str) -> Vec<(Role, String)> {
    let mut sections = Vec::new();
    let mut role = Role::User;
    let mut body = String::new();

    for line in template.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            if !body.trim().is_empty() {
                sections.push((role, body.trim().to_string()));
            }
            role = Role::parse(header);
            body.clear();
        } else {
            body.push_str(line);
            body.push('\n');
        }
    }

    if !body.trim().is_empty() {
        sections.push((role, body.trim().to_string()));
    }

    sections
}

#[async_trait::async_trait]
impl PromptResolver for BuiltinPromptResolver {
    async fn resolve(
        &self,
        name: &str,
        variables: &HashMap<String, String>,
    ) -> anyhow::Result<CompiledPrompt> {
        let template = Self::template(name)
            .ok_or_else(|| anyhow::anyhow!("prompt template {name:?} not found"))?;

        let messages = parse_sections(template)
            .into_iter()
            .map(|(role, body)| ChatMessage {
                role,
                content: compile(&body, variables),
            })
            .collect();

        Ok(CompiledPrompt::Chat(messages))
    }

    fn name(&self) -> &str {
        "builtin"
    }
}
