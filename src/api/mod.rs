//! HTTP API for memgate.
//!
//! Serves the memory endpoints the capture app and browser extension talk to,
//! an OpenAI-style embeddings endpoint, and the optional chat passthrough.

mod error;
pub mod routes;

pub use error::ApiError;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::MemgateConfig;
use crate::service::MemoryService;

/// Config details reported by `/health` that the service itself doesn't track.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub classifier_profile: String,
    pub classifier_base_url: String,
    pub embedding_provider: String,
    pub chat_profile: String,
    pub allowed_origins: Vec<String>,
}

impl ServerInfo {
    pub fn from_config(config: &MemgateConfig) -> Self {
        Self {
            classifier_profile: config.classifier.profile.clone(),
            classifier_base_url: config.classifier.base_url.clone(),
            embedding_provider: config.embedding.provider.clone(),
            chat_profile: config.chat.profile.clone(),
            allowed_origins: config.server.allowed_origins.clone(),
        }
    }
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MemoryService>,
    pub info: Arc<ServerInfo>,
}

/// Start the HTTP API server and run until Ctrl-C.
pub async fn serve(config: &MemgateConfig, service: Arc<MemoryService>) -> anyhow::Result<()> {
    let state = AppState {
        service,
        info: Arc::new(ServerInfo::from_config(config)),
    };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "failed to bind {}:{} ({e}); is another memgate running?",
                config.server.host,
                config.server.port
            )
        })?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.info.allowed_origins);

    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/v1/memories/",
            get(routes::list_memories)
                .post(routes::add_memory)
                .delete(routes::delete_user_memories),
        )
        .route(
            "/v1/memories",
            get(routes::list_memories)
                .post(routes::add_memory)
                .delete(routes::delete_user_memories),
        )
        .route("/v1/memories/search/", post(routes::search_memories))
        .route("/v1/memories/search", post(routes::search_memories))
        .route(
            "/v1/memories/{id}/",
            get(routes::get_memory).delete(routes::delete_memory),
        )
        .route(
            "/v1/memories/{id}",
            get(routes::get_memory).delete(routes::delete_memory),
        )
        .route("/v1/embeddings", post(routes::embeddings))
        .route("/v1/chat/completions", post(routes::chat_completions))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins. Entries ending in `*` match by prefix.
fn cors_layer(allowed: &[String]) -> CorsLayer {
    let allowed = allowed.to_vec();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &axum::http::request::Parts| {
                origin
                    .to_str()
                    .map(|o| origin_allowed(o, &allowed))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

pub fn origin_allowed(origin: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|entry| match entry.strip_suffix('*') {
        Some(prefix) => origin.starts_with(prefix),
        None => origin == entry,
    })
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
