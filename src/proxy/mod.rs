//! Prediction proxy HTTP server
//!
//! Accepts a multipart `{image, smash}` upload, turns it into one
//! image-generation call and answers with the forecast as a data URL.

pub mod access_log;
pub mod handlers;
pub mod prompt;
pub mod service;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use axum::{Router, middleware};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::client::proxy::PREDICT_PATH;
use crate::config::{Config, ServerConfig};
use crate::error::{ConfigError, Result};

pub use service::PredictionService;

/// Shared state for every request
pub struct AppState {
    pub predictions: PredictionService,
}

/// Build the proxy router.
pub fn router(state: Arc<AppState>, server: &ServerConfig) -> Result<Router> {
    let cors = cors_layer(server)?;

    Ok(Router::new()
        .route(PREDICT_PATH, post(handlers::predict))
        .layer(DefaultBodyLimit::max(server.body_limit_bytes))
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(access_log::log_access)))
}

fn cors_layer(server: &ServerConfig) -> Result<CorsLayer> {
    let origins = server
        .allowed_origins()
        .iter()
        .map(|o| {
            HeaderValue::from_str(o)
                .map_err(|_| ConfigError::Invalid(format!("invalid CORS origin '{}'", o)))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ORIGIN])
        .allow_credentials(true))
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &Config) -> Result<()> {
    let predictions = PredictionService::from_config(config)?;
    let configured = predictions.is_configured();
    let state = Arc::new(AppState { predictions });
    let app = router(state, &config.server)?;

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Starting Med Mirror proxy on http://{}", addr);
    if !configured {
        log::warn!("Predictions will answer 503 until an API key is configured");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Shutting down Med Mirror proxy");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
