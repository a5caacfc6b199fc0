//! Backend Module
//!
//! Server side of homesync's real-time sync layer: an Axum server that keeps
//! one WebSocket per signed-in device and fans change notifications out to
//! every device of the same household.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Architecture
//!
//! - **`server`** - Configuration, application state, app creation
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`realtime`** - Connection registry, upgrade gate, broadcast dispatcher
//! - **`auth`** - Session validation for the upgrade gate
//! - **`error`** - Backend-specific error types
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - homesync-server binary
//! ├── server/         - Server initialization and state
//! ├── routes/         - Route configuration
//! ├── realtime/       - WebSocket fan-out
//! ├── auth/           - Session validators
//! └── error/          - Error types
//! ```
//!
//! # Endpoints
//!
//! - `GET /api/ws` - WebSocket upgrade (session cookie or `?token=`)
//! - `GET /api/ws/stats` - Connection counts per household
//! - `GET /health` - Liveness probe
//!
//! # Tenancy
//!
//! The family id comes from the validated session, never from the client.
//! A broadcast for one household cannot reach a socket of another.
//!
//! # Usage from write paths
//!
//! ```rust
//! use homesync::backend::realtime::{notify_change, ConnectionRegistry};
//! use homesync::shared::{Change, FamilyId, Resource};
//!
//! fn after_grocery_added(registry: &ConnectionRegistry, family: FamilyId, item: serde_json::Value) {
//!     notify_change(registry, family, Resource::Grocery, Change::Added(item));
//! }
//! ```

/// Session validation
pub mod auth;

/// Backend error types
pub mod error;

/// WebSocket registry, gate and broadcast
pub mod realtime;

/// HTTP routes
pub mod routes;

/// Server initialization and state
pub mod server;

pub use error::BackendError;
