//! Route Configuration Module
//!
//! This module configures all HTTP routes for the backend server.
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs          - Module exports and documentation
//! ├── router.rs       - Main router creation
//! └── api_routes.rs   - Health and stats handlers
//! ```
//!
//! # Routes
//!
//! - `GET /api/ws` - Upgrade gate (see `realtime::gate`)
//! - `GET /api/ws/stats` - Registry diagnostics
//! - `GET /health` - Liveness probe
//! - anything else - `404` with a JSON error body

/// Main router creation
pub mod router;

/// API endpoint handlers
pub mod api_routes;

pub use router::create_router;
