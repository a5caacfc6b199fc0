/**
 * Application State Management
 *
 * This module defines the application state structure and implements
 * the necessary `FromRef` traits for Axum state extraction.
 *
 * # Architecture
 *
 * The `AppState` struct is the central state container, holding:
 * - The connection registry (live sockets, scoped by family)
 * - The session validator consulted by the upgrade gate
 * - The per-connection outbound queue size
 *
 * # Thread Safety
 *
 * - `ConnectionRegistry` is a cheap clone over a shared, mutex-guarded table
 * - `Arc<dyn SessionValidator>` is shared by every upgrade request
 *
 * # Example
 *
 * ```rust
 * use homesync::backend::server::state::AppState;
 * use axum::extract::State;
 *
 * async fn handler(State(state): State<AppState>) {
 *     let live = state.registry.len();
 *     // ...
 * }
 * ```
 */

use crate::backend::auth::sessions::SessionValidator;
use crate::backend::realtime::registry::ConnectionRegistry;
use axum::extract::FromRef;
use std::sync::Arc;

/// Default number of frames queued per connection before deliveries fail
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// Application state shared by every handler
///
/// Write-path handlers extract `State<ConnectionRegistry>` and call
/// `broadcast_event` after their mutation commits.
#[derive(Clone)]
pub struct AppState {
    /// Live connections, one entry per admitted socket
    pub registry: ConnectionRegistry,

    /// Resolves session credentials to a household
    pub sessions: Arc<dyn SessionValidator>,

    /// Capacity of each connection's outbound queue
    pub outbound_buffer: usize,
}

impl AppState {
    pub fn new(sessions: Arc<dyn SessionValidator>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            sessions,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }

    /// Override the per-connection queue size (clamped to at least 1)
    pub fn with_outbound_buffer(mut self, outbound_buffer: usize) -> Self {
        self.outbound_buffer = outbound_buffer.max(1);
        self
    }
}

/// Lets handlers take `State<ConnectionRegistry>` directly
impl FromRef<AppState> for ConnectionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.registry.clone()
    }
}

impl FromRef<AppState> for Arc<dyn SessionValidator> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
