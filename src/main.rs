//! Chat Stream Server - Main entry point
//!
//! Loads configuration, builds the generation provider and serves the HTTP API.
//! A misconfigured provider (live mode without a credential) aborts startup
//! before the listener is bound.

use anyhow::{Context, Result};
use axum::Router;
use chat_stream_server::{
    api::{router, ApiDoc, AppState},
    core::{init_metrics, AppConfig},
};
use chrono::Local;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Custom time formatter that uses local timezone (respects TZ environment variable)
struct LocalTime;

impl tracing_subscriber::fmt::time::FormatTime for LocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S"))
    }
}

fn init_tracing() {
    let no_color = std::env::var("NO_COLOR").is_ok();

    let base_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,chat_stream_server=debug".to_string());

    // Always suppress noisy HTTP library logs regardless of RUST_LOG setting
    let filter = tracing_subscriber::EnvFilter::new(format!(
        "{},hyper=warn,hyper_util=warn,h2=warn,reqwest=warn",
        base_filter
    ));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(LocalTime)
                .with_ansi(!no_color),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before reading any environment variables)
    dotenvy::dotenv().ok();

    init_tracing();
    init_metrics();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let addr = config.bind_address();

    let state = Arc::new(
        AppState::from_config(config).context("Failed to initialize generation provider")?,
    );

    let app = build_app(state);

    tracing::info!("Starting chat stream server on {}", addr);
    tracing::info!("Chat API: POST /chat, GET /chat/stream?message=...");
    tracing::info!("Swagger UI: /swagger-ui");
    tracing::info!("Metrics endpoint: /metrics");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Build router with all endpoints and outer layers.
fn build_app(state: Arc<AppState>) -> Router {
    let swagger_ui = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());

    router(state)
        .merge(swagger_ui)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
