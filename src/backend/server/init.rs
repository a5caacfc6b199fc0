/**
 * Server Initialization
 *
 * Turns a `ServerConfig` into a ready-to-serve `Router`.
 *
 * # Initialization Process
 *
 * 1. Build the session validator selected by the configuration
 * 2. Create the connection registry and `AppState`
 * 3. Create and configure the router
 *
 * The Postgres validator connects lazily, so startup does not wait for the
 * database; an unreachable database surfaces as rejected upgrades.
 */

use crate::backend::auth::sessions::{JwtSessionValidator, PgSessionValidator, SessionValidator};
use crate::backend::error::BackendError;
use crate::backend::routes::router::create_router;
use crate::backend::server::config::{ServerConfig, SessionBackend};
use crate::backend::server::state::AppState;
use axum::Router;
use std::sync::Arc;

/// Build the session validator for the configured backend
pub fn build_validator(backend: &SessionBackend) -> Result<Arc<dyn SessionValidator>, BackendError> {
    let validator: Arc<dyn SessionValidator> = match backend {
        SessionBackend::Jwt { secret } => {
            tracing::info!("[Server] Validating sessions with signed tokens");
            Arc::new(JwtSessionValidator::new(secret))
        }
        SessionBackend::Postgres { database_url } => {
            tracing::info!("[Server] Validating sessions against the sessions table");
            Arc::new(PgSessionValidator::connect_lazy(database_url)?)
        }
    };
    Ok(validator)
}

/// Build the application state for a configuration
pub fn build_state(config: &ServerConfig) -> Result<AppState, BackendError> {
    let sessions = build_validator(&config.session)?;
    Ok(AppState::new(sessions).with_outbound_buffer(config.outbound_buffer))
}

/// Create the Axum application
///
/// # Returns
///
/// The router together with the state it serves, so the caller can keep a
/// handle on the registry (write paths broadcast through it).
pub fn create_app(config: &ServerConfig) -> Result<(Router, AppState), BackendError> {
    tracing::info!("Initializing homesync realtime server");

    let state = build_state(config)?;
    let app = create_router(state.clone());

    tracing::info!(
        outbound_buffer = state.outbound_buffer,
        "[Server] Router configured"
    );
    Ok((app, state))
}
