use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::llm::{GenerateRequest, LlmClient};
use crate::models::{ReportType, SubjectInputs};
use crate::prompts::PromptResolver;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub report_type: String,
    pub inputs: SubjectInputs,
    /// Current body, passed to the template as regeneration context.
    pub previous_content: Option<String>,
}

/// Turns a type tag plus subject inputs into finished body text.
pub struct ContentDispatcher {
    prompts: Arc<dyn PromptResolver>,
    llm: Arc<LlmClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    strict_types: bool,
}

impl ContentDispatcher {
    pub fn new(prompts: Arc<dyn PromptResolver>, llm: Arc<LlmClient>, config: &Config) -> Self {
        Self {
            prompts,
            llm,
            model: config.llm_model.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
            strict_types: config.strict_report_types,
        }
    }

    /// Generated text for known type tags. An unknown or empty tag hands back the
    /// previous content untouched without calling the backend, unless strict typing
    /// is on, in which case a non-empty unknown tag is rejected.
    #[tracing::instrument(
        name = "pipeline.dispatch",
        skip(self, request),
        fields(
            report.type_tag = %request.report_type,
            prompt.source = %self.prompts.name(),
            dispatch.generated,
            dispatch.content_chars,
        )
    )]
    pub async fn dispatch(&self, request: &GenerationRequest) -> AppResult<String> {
        let span = tracing::Span::current();

        let Some(report_type) = ReportType::parse(&request.report_type) else {
            if self.strict_types && !request.report_type.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "Unknown report type: {}",
                    request.report_type.trim()
                )));
            }

            span.record("dispatch.generated", false);
            tracing::debug!("No template for type tag, keeping previous content");
            return Ok(request.previous_content.clone().unwrap_or_default());
        };

        let variables = template_variables(request);

        let prompt = self
            .prompts
            .resolve(report_type.template_name(), &variables)
            .await
            .map_err(|e| {
                AppError::Generation(format!(
                    "prompt template {} unavailable: {e}",
                    report_type.template_name()
                ))
            })?;

        let response = self
            .llm
            .generate(&GenerateRequest {
                model: self.model.clone(),
                system: String::new(),
                prompt: prompt.flatten(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                stage: report_type.as_str().to_ascii_lowercase(),
            })
            .await
            .map_err(|e| AppError::Generation(e.to_string()))?;

        if response.content.trim().is_empty() {
            return Err(AppError::Generation(format!(
                "{} returned no content",
                response.provider
            )));
        }

        span.record("dispatch.generated", true);
        span.record("dispatch.content_chars", response.content.chars().count());

        Ok(response.content)
    }
}

fn template_variables(request: &GenerationRequest) -> HashMap<String, String> {
    HashMap::from([
        (
            "patient_name".to_string(),
            request.inputs.subject_name.clone(),
        ),
        (
            "patient_info".to_string(),
            request.inputs.subject_info.clone(),
        ),
        ("notes".to_string(), request.inputs.notes.clone()),
        ("date".to_string(), Utc::now().to_rfc3339()),
        (
            "previous".to_string(),
            request.previous_content.clone().unwrap_or_default(),
        ),
    ])
}
