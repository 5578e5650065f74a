mod chat;
mod config;
mod errors;
mod llm_client;
mod profile;
mod render;
mod routes;
mod session;
mod state;
mod transcript;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::chat::ChatService;
use crate::config::{Config, API_KEY_VAR};
use crate::llm_client::{ChatBackend, GeminiClient};
use crate::profile::ProfileRecord;
use crate::render::MarkdownRenderer;
use crate::routes::build_router;
use crate::session::SessionManager;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (a missing API key is reported later, not here)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting résumé chat v{}", env!("CARGO_PKG_VERSION"));

    // Static profile record, parsed once
    let profile = Arc::new(ProfileRecord::embedded()?);
    info!(
        "Profile loaded: {} (document v{}, {} projects)",
        profile.personal_info.name,
        profile.version,
        profile.projects.len()
    );

    // LLM backend, only when a credential is configured
    let backend: Option<Arc<dyn ChatBackend>> = match &config.gemini_api_key {
        Some(key) => Some(Arc::new(GeminiClient::new(
            key.clone(),
            config.gemini_base_url.clone(),
        )?)),
        None => {
            warn!("{API_KEY_VAR} is not set; chat will be unavailable");
            None
        }
    };

    let sessions = SessionManager::new(
        backend,
        API_KEY_VAR,
        config.gemini_model.clone(),
        profile.clone(),
    );
    let chat = Arc::new(ChatService::new(
        sessions,
        Arc::new(MarkdownRenderer::new()),
        profile.clone(),
    ));

    // Failure is kept as a banner for the page; the server still starts
    if chat.initialize().await.is_err() {
        warn!("Serving without chat");
    }

    let state = AppState {
        chat,
        profile,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
