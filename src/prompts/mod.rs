pub mod builtin;
pub mod langfuse;

pub use builtin::BuiltinPromptResolver;
pub use langfuse::LangfusePromptResolver;

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Unrecognised roles are treated as user turns.
    pub fn parse(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "system" => Self::System,
            "assistant" => Self::Assistant,
            _ => Self::User,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A template with its variables already substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledPrompt {
    Text(String),
    Chat(Vec<ChatMessage>),
}

impl CompiledPrompt {
    /// Single prompt string for the generative backend: chat turns become
    /// `Role: content` blocks separated by a blank line.
    pub fn flatten(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Chat(messages) => messages
                .iter()
                .map(|m| format!("{}: {}", m.role.label(), m.content))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

#[async_trait::async_trait]
pub trait PromptResolver: Send + Sync {
    async fn resolve(
        &self,
        name: &str,
        variables: &HashMap<String, String>,
    ) -> anyhow::Result<CompiledPrompt>;

    fn name(&self) -> &str;
}

/// Substitutes `{{ name }}` slots. Unknown variables are left in place.
pub fn compile(template: &str, variables: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = after_open[..end].trim();
        match variables.get(name) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    out.push_str(rest);
    out
}
