use serde::{Deserialize, Serialize};

use crate::registry::Origin;

// --- Request/Response types ---

#[derive(Serialize)]
pub(super) struct HealthResponse {
    pub ok: bool,
    pub version: &'static str,
}

#[derive(Deserialize)]
pub(super) struct PluginsQuery {
    pub origin: Origin,
}

#[derive(Serialize)]
pub(super) struct PluginsResponse {
    pub origin: Origin,
    pub plugins: Vec<String>,
}

#[derive(Deserialize)]
pub(super) struct NameQuery {
    pub name: String,
}

#[derive(Deserialize)]
pub(super) struct UpdatePkgRequest {
    pub name: String,
    pub tag: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct GitCheckQuery {
    pub path: String,
    /// Seconds; falls back to the configured budget.
    pub timeout: Option<u64>,
}

#[derive(Deserialize)]
pub(super) struct GitUpdateRequest {
    pub path: String,
    pub cmd: Option<String>,
    pub timeout: Option<u64>,
}

#[derive(Deserialize, Default)]
pub(super) struct GitUpdateAllRequest {
    pub cmd: Option<String>,
    pub timeout: Option<u64>,
}

#[derive(Deserialize)]
pub(super) struct LogsQuery {
    #[serde(default)]
    pub limit: usize,
    /// Optional source filter: "npm" or "git".
    #[serde(default)]
    pub source: Option<String>,
}
