use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use std::time::Duration;

use super::types::*;
use super::{bad_request, resolve_plugin_path};
use crate::app_logger::LogEntry;
use crate::git_update::{validate_update_cmd, DEFAULT_UPDATE_CMD};
use crate::npm::{validate_package_name, DEFAULT_TAG};
use crate::report::BatchReport;
use crate::state::AppState;

fn budget(state: &AppState, secs: Option<u64>) -> Duration {
    secs.map(|s| Duration::from_secs(s.max(1)))
        .unwrap_or_else(|| state.updater.config().timeout())
}

fn report_json(report: &BatchReport) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "lines": report.lines,
        "summary": report.summary,
        "text": report.text(),
    }))
}

pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub(super) async fn list_plugins(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PluginsQuery>,
) -> Response {
    match state.updater.registry().list_plugins(q.origin, false) {
        Ok(plugins) => Json(PluginsResponse {
            origin: q.origin,
            plugins,
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

// --- npm ---

pub(super) async fn npm_check(
    State(state): State<Arc<AppState>>,
    Query(q): Query<NameQuery>,
) -> Response {
    if let Err(e) = validate_package_name(&q.name) {
        return bad_request(e);
    }
    Json(state.updater.check_pkg_update(&q.name).await).into_response()
}

pub(super) async fn npm_update(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdatePkgRequest>,
) -> Response {
    if let Err(e) = validate_package_name(&body.name) {
        return bad_request(e);
    }
    let tag = body.tag.as_deref().unwrap_or(DEFAULT_TAG);
    if let Err(e) = validate_package_name(tag) {
        return bad_request(format!("invalid tag: {e}"));
    }
    let _guard = state.update_lock.lock().await;
    Json(state.updater.update_pkg(&body.name, tag).await).into_response()
}

pub(super) async fn npm_update_all(State(state): State<Arc<AppState>>) -> Response {
    let _guard = state.update_lock.lock().await;
    report_json(&state.updater.update_all_pkg().await).into_response()
}

// --- git ---

pub(super) async fn git_check(
    State(state): State<Arc<AppState>>,
    Query(q): Query<GitCheckQuery>,
) -> Response {
    let path = match resolve_plugin_path(state.updater.config(), &q.path) {
        Ok(p) => p,
        Err(e) => return bad_request(e),
    };
    let timeout = budget(&state, q.timeout);
    Json(state.updater.check_git_plugin_update(&path, timeout).await).into_response()
}

pub(super) async fn git_update(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GitUpdateRequest>,
) -> Response {
    let path = match resolve_plugin_path(state.updater.config(), &body.path) {
        Ok(p) => p,
        Err(e) => return bad_request(e),
    };
    let cmd = body.cmd.as_deref().unwrap_or(DEFAULT_UPDATE_CMD);
    if let Err(e) = validate_update_cmd(cmd) {
        return bad_request(e);
    }
    let timeout = budget(&state, body.timeout);
    let _guard = state.update_lock.lock().await;
    Json(state.updater.update_git_plugin(&path, cmd, timeout).await).into_response()
}

/// The body is optional; an empty one means defaults.
pub(super) async fn git_update_all(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: GitUpdateAllRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GitUpdateAllRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(req) => req,
            Err(e) => return bad_request(format!("invalid JSON body: {e}")),
        }
    };
    let cmd = req.cmd.as_deref().unwrap_or(DEFAULT_UPDATE_CMD);
    if let Err(e) = validate_update_cmd(cmd) {
        return bad_request(e);
    }
    let timeout = budget(&state, req.timeout);
    let _guard = state.update_lock.lock().await;
    report_json(&state.updater.update_all_git_plugin(cmd, timeout).await).into_response()
}

// --- logs ---

/// GET /logs: most recent ring buffer entries, oldest first.
pub(super) async fn get_logs(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LogsQuery>,
) -> Json<Vec<LogEntry>> {
    let mut entries = state.log_buffer.lock().get_entries(q.limit);
    if let Some(ref source) = q.source {
        entries.retain(|e| e.source == *source);
    }
    Json(entries)
}

/// DELETE /logs: clear all log entries.
pub(super) async fn clear_logs(State(state): State<Arc<AppState>>) -> StatusCode {
    state.log_buffer.lock().clear();
    StatusCode::NO_CONTENT
}
