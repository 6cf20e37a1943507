//! SiteChat HTTP gateway.
//!
//! Three routes: `GET /health`, `POST /v1/chat` (buffered JSON) and
//! `POST /v1/chat/stream` (SSE). The gateway owns no chat logic — it
//! translates HTTP into pipeline calls and pipeline results back into
//! HTTP.

pub mod api;
pub mod pipeline;
pub mod prompt;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use sitechat_config::{ServerConfig, SiteConfig};
use sitechat_content::ContentSource;
use sitechat_core::ChatProvider;

use pipeline::ChatPipeline;

/// Shared application state, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ChatPipeline>,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        source: Arc<dyn ContentSource>,
        config: &SiteConfig,
    ) -> Self {
        Self {
            pipeline: Arc::new(ChatPipeline::new(provider, source, config)),
        }
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let cors = cors_layer(&server.allowed_origins);

    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/chat", post(api::chat_handler))
        .route("/v1/chat/stream", post(api::chat_stream_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT_LANGUAGE,
        ])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server and run until shutdown.
pub async fn start(
    config: SiteConfig,
    provider: Arc<dyn ChatProvider>,
    source: Arc<dyn ContentSource>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(provider, source, &config);
    let app = build_router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, provider = %config.chat.provider, "SiteChat gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
