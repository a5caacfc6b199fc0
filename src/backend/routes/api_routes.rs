/**
 * API Route Handlers
 *
 * Read-only endpoints served next to the WebSocket gate:
 *
 * - `GET /health` - Liveness probe
 * - `GET /api/ws/stats` - Live connection counts per household
 */

use crate::backend::realtime::registry::{ConnectionRegistry, RegistryStats};
use crate::backend::server::state::AppState;
use crate::shared::config::WS_STATS_PATH;
use crate::shared::envelope::now_rfc3339;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

/// Body of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

/// Configure API routes
///
/// # Arguments
///
/// * `router` - The router to add routes to
///
/// # Returns
///
/// Router with API routes configured
pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/health", get(health))
        .route(WS_STATS_PATH, get(ws_stats))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: now_rfc3339(),
    })
}

/// GET /api/ws/stats
///
/// Diagnostics only; nothing in the write path depends on it.
pub async fn ws_stats(State(registry): State<ConnectionRegistry>) -> Json<RegistryStats> {
    Json(registry.stats())
}
