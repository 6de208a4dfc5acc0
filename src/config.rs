use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::storage::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_acquire_timeout_secs: u64,
    pub jwt_secret: String,
    pub jwt_expires_in_hours: i64,
    pub request_timeout_secs: u64,
    pub llm_provider: String,
    pub llm_model: String,
    pub fallback_provider: String,
    pub fallback_model: String,
    pub llm_max_attempts: u32,
    pub llm_timeout_secs: u64,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub ollama_base_url: String,
    pub prompt_source: String,
    pub prompt_label: String,
    pub langfuse_base_url: String,
    pub langfuse_public_key: Option<String>,
    pub langfuse_secret_key: Option<String>,
    pub blob_backend: String,
    pub blob_api_url: String,
    pub blob_token: Option<String>,
    pub blob_fs_root: String,
    pub blob_timeout_secs: u64,
    pub verify_max_attempts: u32,
    pub verify_initial_delay_ms: u64,
    pub verify_backoff_multiplier: f64,
    pub verify_max_delay_ms: u64,
    pub verify_tolerance_chars: usize,
    pub strict_report_types: bool,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            environment: "development".to_string(),
            database_url: String::new(),
            database_max_connections: 10,
            database_acquire_timeout_secs: 5,
            jwt_secret: String::new(),
            jwt_expires_in_hours: 168,
            request_timeout_secs: 120,
            llm_provider: "google".to_string(),
            llm_model: "gemini-2.5-flash".to_string(),
            fallback_provider: "none".to_string(),
            fallback_model: "gpt-4.1-mini".to_string(),
            llm_max_attempts: 1,
            llm_timeout_secs: 60,
            llm_temperature: 0.3,
            llm_max_tokens: 4096,
            google_api_key: None,
            openai_api_key: None,
            anthropic_api_key: None,
            ollama_base_url: "http://localhost:11434".to_string(),
            prompt_source: "builtin".to_string(),
            prompt_label: "latest".to_string(),
            langfuse_base_url: "https://cloud.langfuse.com".to_string(),
            langfuse_public_key: None,
            langfuse_secret_key: None,
            blob_backend: "http".to_string(),
            blob_api_url: "https://blob.vercel-storage.com".to_string(),
            blob_token: None,
            blob_fs_root: "./data/blobs".to_string(),
            blob_timeout_secs: 30,
            verify_max_attempts: 5,
            verify_initial_delay_ms: 500,
            verify_backoff_multiplier: 2.0,
            verify_max_delay_ms: 10_000,
            verify_tolerance_chars: 10,
            strict_report_types: false,
            otel_service_name: "ai-medical-reports".to_string(),
            otel_exporter_endpoint: "http://localhost:4317".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Ok(Self {
            port: parse_var("APP_PORT", defaults.port)?,
            environment: var_or("ENVIRONMENT", &defaults.environment),
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            database_acquire_timeout_secs: parse_var(
                "DATABASE_ACQUIRE_TIMEOUT_SECS",
                defaults.database_acquire_timeout_secs,
            )?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_expires_in_hours: parse_var("JWT_EXPIRES_IN_HOURS", defaults.jwt_expires_in_hours)?,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            llm_provider: var_or("LLM_PROVIDER", &defaults.llm_provider),
            llm_model: var_or("LLM_MODEL", &defaults.llm_model),
            fallback_provider: var_or("FALLBACK_PROVIDER", &defaults.fallback_provider),
            fallback_model: var_or("FALLBACK_MODEL", &defaults.fallback_model),
            llm_max_attempts: parse_var("LLM_MAX_ATTEMPTS", defaults.llm_max_attempts)?,
            llm_timeout_secs: parse_var("LLM_TIMEOUT_SECS", defaults.llm_timeout_secs)?,
            llm_temperature: parse_var("LLM_TEMPERATURE", defaults.llm_temperature)?,
            llm_max_tokens: parse_var("LLM_MAX_TOKENS", defaults.llm_max_tokens)?,
            google_api_key: env::var("GOOGLE_API_KEY")
                .or_else(|_| env::var("GEMINI_API_KEY"))
                .ok(),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            ollama_base_url: var_or("OLLAMA_BASE_URL", &defaults.ollama_base_url),
            prompt_source: var_or("PROMPT_SOURCE", &defaults.prompt_source),
            prompt_label: var_or("PROMPT_LABEL", &defaults.prompt_label),
            langfuse_base_url: var_or("LANGFUSE_BASE_URL", &defaults.langfuse_base_url),
            langfuse_public_key: env::var("LANGFUSE_PUBLIC_KEY").ok(),
            langfuse_secret_key: env::var("LANGFUSE_SECRET_KEY").ok(),
            blob_backend: var_or("BLOB_BACKEND", &defaults.blob_backend),
            blob_api_url: var_or("BLOB_API_URL", &defaults.blob_api_url),
            blob_token: env::var("BLOB_READ_WRITE_TOKEN").ok(),
            blob_fs_root: var_or("BLOB_FS_ROOT", &defaults.blob_fs_root),
            blob_timeout_secs: parse_var("BLOB_TIMEOUT_SECS", defaults.blob_timeout_secs)?,
            verify_max_attempts: parse_var("VERIFY_MAX_ATTEMPTS", defaults.verify_max_attempts)?,
            verify_initial_delay_ms: parse_var(
                "VERIFY_INITIAL_DELAY_MS",
                defaults.verify_initial_delay_ms,
            )?,
            verify_backoff_multiplier: parse_var(
                "VERIFY_BACKOFF_MULTIPLIER",
                defaults.verify_backoff_multiplier,
            )?,
            verify_max_delay_ms: parse_var("VERIFY_MAX_DELAY_MS", defaults.verify_max_delay_ms)?,
            verify_tolerance_chars: parse_var(
                "VERIFY_TOLERANCE_CHARS",
                defaults.verify_tolerance_chars,
            )?,
            strict_report_types: parse_var("STRICT_REPORT_TYPES", defaults.strict_report_types)?,
            otel_service_name: var_or("OTEL_SERVICE_NAME", &defaults.otel_service_name),
            otel_exporter_endpoint: var_or(
                "OTEL_EXPORTER_OTLP_ENDPOINT",
                &defaults.otel_exporter_endpoint,
            ),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.verify_max_attempts.max(1),
            initial_delay: Duration::from_millis(self.verify_initial_delay_ms),
            multiplier: self.verify_backoff_multiplier.max(1.0),
            max_delay: Duration::from_millis(self.verify_max_delay_ms),
            tolerance: self.verify_tolerance_chars,
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{name} is invalid ({raw:?}): {e}")),
        Err(_) => Ok(default),
    }
}
