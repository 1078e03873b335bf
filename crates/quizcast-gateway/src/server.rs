//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{get, post},
};
use quizcast_core::config::{CommandConfig, ServerConfig};
use quizcast_quiz::QuizController;
use quizcast_scheduler::JobRegistry;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<QuizController>,
    /// Manual 問題 / 解説 commands go through the registry so they share the
    /// worker pool with the timers.
    pub registry: Arc<JobRegistry>,
    pub commands: CommandConfig,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(controller: Arc<QuizController>, registry: Arc<JobRegistry>, commands: CommandConfig) -> Self {
        Self {
            controller,
            registry,
            commands,
            start_time: std::time::Instant::now(),
        }
    }
}

/// Build the router with all routes and layers.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/webhook/{bot_name}", post(super::routes::line_webhook))
        .route("/liff", post(super::routes::liff_submit))
        .route("/liff/problem", get(super::routes::liff_active_problem))
        .route("/liff/problems/{id}", get(super::routes::liff_problem_by_id))
        .layer({
            let cors = CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
                .max_age(std::time::Duration::from_secs(3600));

            // The answer page is served from the LIFF origin.
            // Example: QUIZCAST_CORS_ORIGINS=https://liff.line.me
            if let Ok(origins_str) = std::env::var("QUIZCAST_CORS_ORIGINS") {
                let origins: Vec<_> = origins_str
                    .split(',')
                    .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
                    .collect();
                cors.allow_origin(origins)
            } else {
                cors.allow_origin(Any)
            }
        })
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the HTTP server.
pub async fn start(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
