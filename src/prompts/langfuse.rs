use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use super::{ChatMessage, CompiledPrompt, PromptResolver, Role, compile};

/// Fetches prompt templates from the Langfuse public API.
pub struct LangfusePromptResolver {
    client: reqwest::Client,
    base_url: String,
    public_key: String,
    secret_key: String,
    label: String,
}

impl LangfusePromptResolver {
    pub fn new(
        base_url: &str,
        public_key: &str,
        secret_key: &str,
        label: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            public_key: public_key.to_string(),
            secret_key: secret_key.to_string(),
            label: label.to_string(),
        })
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum LangfusePrompt {
    Text { prompt: String },
    Chat { prompt: Vec<LangfuseChatEntry> },
}

#[derive(Deserialize)]
struct LangfuseChatEntry {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl LangfusePrompt {
    fn compile(self, variables: &HashMap<String, String>) -> CompiledPrompt {
        match self {
            Self::Text { prompt } => CompiledPrompt::Text(compile(&prompt, variables)),
            Self::Chat { prompt } => CompiledPrompt::Chat(
                prompt
                    .into_iter()
                    // placeholders are filled client-side with message lists; none are used here
                    .filter(|entry| entry.kind.as_deref() != Some("placeholder"))
                    .filter_map(|entry| {
                        let content = entry.content?;
                        Some(ChatMessage {
                            role: Role::parse(entry.role.as_deref().unwrap_or("user")),
                            content: compile(&content, variables),
                        })
                    })
                    .collect(),
            ),
        }
    }
}

#[async_trait::async_trait]
impl PromptResolver for LangfusePromptResolver {
    #[tracing::instrument(name = "prompts.langfuse.resolve", skip(self, variables), fields(prompt.label = %self.label))]
    async fn resolve(
        &self,
        name: &str,
        variables: &HashMap<String, String>,
    ) -> anyhow::Result<CompiledPrompt> {
        let url = format!("{}/api/public/v2/prompts/{name}", self.base_url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.public_key, Some(&self.secret_key))
            .query(&[("label", self.label.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Langfuse prompt {name:?} fetch failed ({status}): {body}");
        }

        let prompt: LangfusePrompt = response.json().await?;
        let compiled = prompt.compile(variables);

        if let CompiledPrompt::Chat(messages) = &compiled
            && messages.is_empty()
        {
            anyhow::bail!("Langfuse prompt {name:?} has no messages");
        }

        Ok(compiled)
    }

    fn name(&self) -> &str {
        "langfuse"
    }
}
