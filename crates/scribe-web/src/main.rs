//! TranscriptScribe API server.
//!
//! Run with: cargo run -p scribe-web

use anyhow::Context;
use scribe_config::{AppConfig, LlmBackendKind, LlmConfig, LoggingConfig};
use scribe_db::Database;
use scribe_llm::{build_backend, BackendConfig, BackendKind, LlmClient};
use scribe_trials::{CtgClient, RegistryProxy};
use scribe_web::auth::AuthSettings;
use scribe_web::state::AppState;
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},hyper=warn,reqwest=warn,sqlx=warn", logging.level))
    });
    if logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn llm_backend_config(llm: &LlmConfig) -> BackendConfig {
    BackendConfig {
        kind: match llm.backend {
            LlmBackendKind::Gemini           => BackendKind::Gemini,
            LlmBackendKind::OpenaiCompatible => BackendKind::OpenAiCompatible,
            LlmBackendKind::Ollama           => BackendKind::Ollama,
        },
        model:    llm.model.clone(),
        base_url: llm.base_url.clone(),
        api_key:  llm.api_key.as_ref().map(|k| k.expose_secret().to_string()),
        timeout:  Duration::from_secs(llm.timeout_secs),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.logging);
    config.validate().context("invalid configuration")?;

    info!("TranscriptScribe starting up...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let db = Database::connect(&config.database.url, config.database.max_connections).await?;
    db.migrate().await?;
    let db = Arc::new(db);
    info!(url = %config.database.url, "Database ready");

    let registry_timeout = Duration::from_secs(config.registry.timeout_secs);
    let registry = CtgClient::new(&config.registry.base_url, registry_timeout)?
        .with_page_size(config.registry.page_size);
    let proxy = RegistryProxy::new(&config.registry.base_url, registry_timeout)?;
    info!(base_url = %config.registry.base_url, "Registry client ready");

    let llm = LlmClient::new(build_backend(&llm_backend_config(&config.llm))?);
    info!(backend = llm.backend_name(), model = llm.model_id(), "LLM backend ready");

    let auth = AuthSettings::from_config(&config.auth)?;
    let state = AppState::new(db, Arc::new(registry), llm, proxy, auth)?;
    state.services.transcripts.recover_interrupted().await?;
    let app = scribe_web::router::build_router(state, &config.server.cors_origins);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    info!("Server listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
