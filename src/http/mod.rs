//! Local admin API over the update orchestrator.
//!
//! Every orchestration endpoint answers 200 with the tagged outcome JSON,
//! including `error`/`failed`/`timeout` outcomes. 400 is reserved for
//! requests rejected before reaching the orchestrator.

mod routes;
mod types;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::UpdaterConfig;
use crate::registry::Origin;
use crate::state::AppState;

fn bad_request(msg: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": msg.into()})),
    )
        .into_response()
}

/// Rejects empty paths and traversals.
fn validate_path_string(path: &str) -> Result<(), String> {
    if path.trim().is_empty() {
        return Err("path is required".to_string());
    }
    if path.contains("..") {
        return Err("Path traversal is not allowed".to_string());
    }
    Ok(())
}

/// A git plugin given either as an absolute checkout path or as a plugin
/// name (optionally `git:`-prefixed) under the plugins directory.
fn resolve_plugin_path(config: &UpdaterConfig, raw: &str) -> Result<PathBuf, String> {
    validate_path_string(raw)?;
    let path = Path::new(raw);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let name = Origin::git_name(raw.trim())?;
    if name.contains(['/', '\\']) {
        return Err("Relative paths must be a plugin name".to_string());
    }
    Ok(config.plugins_path().join(name))
}

/// Build the router (exposed for testing).
pub fn build_router(state: Arc<AppState>) -> Router {
    let allowed_origins = [
        HeaderValue::from_static("http://localhost"),
        HeaderValue::from_static("http://127.0.0.1"),
    ];
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins.to_vec())
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/plugins", get(routes::list_plugins))
        // npm
        .route("/npm/check", get(routes::npm_check))
        .route("/npm/update", post(routes::npm_update))
        .route("/npm/update-all", post(routes::npm_update_all))
        // git
        .route("/git/check", get(routes::git_check))
        .route("/git/update", post(routes::git_update))
        .route("/git/update-all", post(routes::git_update_all))
        // Logs
        .route("/logs", get(routes::get_logs).delete(routes::clear_logs))
        .with_state(state)
        .layer(cors)
}

/// Serve the API on `127.0.0.1:<port>` until Ctrl-C.
pub async fn start_server(state: Arc<AppState>, port: u16) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?;
    let addr = listener.local_addr()?;
    tracing::info!("HTTP API listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down HTTP API");
        })
        .await
}
