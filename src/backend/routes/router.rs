/**
 * Router Configuration
 *
 * This module provides the main router creation function that combines
 * all route configurations into a single Axum router.
 *
 * # Route Order
 *
 * 1. Realtime upgrade gate (`GET /api/ws`)
 * 2. API routes (health, registry stats)
 * 3. Fallback handler (JSON 404)
 *
 * Every request passes through `TraceLayer`, so upgrades and probes show up
 * in the HTTP spans.
 */

use crate::backend::error::BackendError;
use crate::backend::realtime::gate::ws_upgrade;
use crate::backend::routes::api_routes::configure_api_routes;
use crate::backend::server::state::AppState;
use crate::shared::config::WS_PATH;
use axum::{http::Uri, routing::get, Router};
use tower_http::trace::TraceLayer;

/// Create the Axum router with all routes configured
///
/// # Arguments
///
/// * `app_state` - Registry and session validator shared by all handlers
///
/// # Returns
///
/// Configured Axum Router ready to serve requests
pub fn create_router(app_state: AppState) -> Router<()> {
    let router = Router::new().route(WS_PATH, get(ws_upgrade));

    let router = configure_api_routes(router);

    let router = router.fallback(not_found);

    router
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn not_found(uri: Uri) -> BackendError {
    BackendError::not_found(uri.path())
}
