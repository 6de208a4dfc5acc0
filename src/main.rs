use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderName, Request, Response, StatusCode};
use opentelemetry::KeyValue;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{MakeSpan, OnResponse, TraceLayer},
};
use tracing::Span;

use ai_medical_reports::{
    AppState, Config,
    db::create_pool,
    llm::{LlmClient, Provider, anthropic::AnthropicProvider, openai::OpenAIProvider},
    pipeline::{ContentDispatcher, ReportPipeline},
    prompts::{BuiltinPromptResolver, LangfusePromptResolver, PromptResolver},
    repository::{PgReportRepository, PgUserRepository},
    routes,
    services::{AuthService, ReportService},
    storage::{BlobStore, FsBlobStore, HttpBlobStore, VerifiedWriter},
    telemetry::{HTTP_REQUEST_DURATION, HTTP_REQUESTS_TOTAL, init_telemetry},
};

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone)]
struct HttpMakeSpan;

impl<B> MakeSpan<B> for HttpMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let method = request.method().as_str();
        let uri = request.uri();
        let path = uri.path();

        let request_id = request
            .headers()
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        tracing::info_span!(
            "HTTP request",
            otel.name = %format!("{} {}", method, path),
            http.method = %method,
            http.route = %path,
            http.target = %uri,
            http.scheme = "http",
            http.flavor = ?request.version(),
            http.user_agent = request.headers()
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .unwrap_or(""),
            http.request_id = %request_id,
            http.response.status_code = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
        )
    }
}

#[derive(Clone)]
struct HttpOnResponse;

impl<B> OnResponse<B> for HttpOnResponse {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status().as_u16();

        span.record("http.response.status_code", status as i64);

        if status >= 500 {
            span.record("otel.status_code", "ERROR");
        } else {
            span.record("otel.status_code", "OK");
        }

        let latency_ms = latency.as_secs_f64() * 1000.0;
        let attributes = [
            KeyValue::new("http.status_code", status.to_string()),
            KeyValue::new("http.status_class", format!("{}xx", status / 100)),
        ];

        HTTP_REQUESTS_TOTAL.add(1, &attributes);
        HTTP_REQUEST_DURATION.record(latency_ms, &attributes);

        tracing::info!(
            http.response.status_code = status,
            latency_ms = latency_ms,
            "finished processing request"
        );
    }
}

fn build_provider(name: &str, config: &Config) -> anyhow::Result<Arc<dyn Provider>> {
    let provider: Arc<dyn Provider> = match name {
        "google" => Arc::new(OpenAIProvider::new_google(
            config
                .google_api_key
                .as_deref()
                .context("GOOGLE_API_KEY or GEMINI_API_KEY must be set")?,
        )),
        "openai" => Arc::new(OpenAIProvider::new(
            config
                .openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY must be set")?,
        )),
        "anthropic" => Arc::new(AnthropicProvider::new(
            config
                .anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY must be set")?,
        )),
        "ollama" => Arc::new(OpenAIProvider::new_ollama(&config.ollama_base_url)),
        other => anyhow::bail!("unsupported LLM provider: {other}"),
    };
    Ok(provider)
}

fn build_llm_client(config: &Config) -> anyhow::Result<LlmClient> {
    let primary = build_provider(&config.llm_provider, config)?;
    let mut client = LlmClient::new(primary, config);

    if config.fallback_provider != "none" && !config.fallback_provider.is_empty() {
        client = client.with_fallback(build_provider(&config.fallback_provider, config)?);
    }

    tracing::info!(
        primary_provider = %client.primary_provider,
        fallback_provider = %client.fallback_provider,
        model = %config.llm_model,
        max_attempts = client.max_attempts,
        "LLM client configured"
    );

    Ok(client)
}

fn build_prompts(config: &Config) -> anyhow::Result<Arc<dyn PromptResolver>> {
    let prompts: Arc<dyn PromptResolver> = match config.prompt_source.as_str() {
        "langfuse" => Arc::new(LangfusePromptResolver::new(
            &config.langfuse_base_url,
            config
                .langfuse_public_key
                .as_deref()
                .context("LANGFUSE_PUBLIC_KEY must be set")?,
            config
                .langfuse_secret_key
                .as_deref()
                .context("LANGFUSE_SECRET_KEY must be set")?,
            &config.prompt_label,
            Duration::from_secs(config.llm_timeout_secs),
        )?),
        "builtin" => Arc::new(BuiltinPromptResolver::new()),
        other => anyhow::bail!("unsupported prompt source: {other}"),
    };
    Ok(prompts)
}

fn build_blob_store(config: &Config) -> anyhow::Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.blob_backend.as_str() {
        "http" => Arc::new(HttpBlobStore::new(
            &config.blob_api_url,
            config
                .blob_token
                .as_deref()
                .context("BLOB_READ_WRITE_TOKEN must be set")?,
            Duration::from_secs(config.blob_timeout_secs),
        )?),
        "filesystem" => Arc::new(FsBlobStore::new(&config.blob_fs_root)?),
        other => anyhow::bail!("unsupported blob backend: {other}"),
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let telemetry_guard = init_telemetry(&config)?;

    tracing::info!(
        port = config.port,
        environment = %config.environment,
        "Starting server"
    );

    let pool = create_pool(&config).await?;
    sqlx::migrate!().run(&pool).await?;

    let report_repo = Arc::new(PgReportRepository::new(pool.clone()));
    let user_repo = Arc::new(PgUserRepository::new(pool));

    let blobs = build_blob_store(&config)?;
    let writer = VerifiedWriter::new(blobs.clone(), config.retry_policy());
    let llm = Arc::new(build_llm_client(&config)?);
    let dispatcher = ContentDispatcher::new(build_prompts(&config)?, llm, &config);

    tracing::info!(
        blob_backend = %blobs.name(),
        prompt_source = %config.prompt_source,
        verify_max_attempts = writer.policy().max_attempts,
        verify_backoff = ?writer.policy().schedule(),
        "Report pipeline configured"
    );

    let pipeline = Arc::new(ReportPipeline::new(
        report_repo.clone(),
        blobs.clone(),
        writer,
        dispatcher,
    ));

    let state = AppState {
        auth_service: AuthService::new(user_repo, &config),
        report_service: ReportService::new(report_repo, blobs, pipeline),
    };

    let app = routes::create_router(state)
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(HttpMakeSpan)
                .on_response(HttpOnResponse),
        )
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    telemetry_guard.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
