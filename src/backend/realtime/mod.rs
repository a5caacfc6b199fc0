//! Real-time Synchronization Module
//!
//! Propagates a change made on one family member's device to every other
//! connected device of the same household, over WebSockets.
//!
//! # Architecture
//!
//! - **`registry`** - Table of live connections keyed by handle, scoped by family
//! - **`gate`** - Upgrade handler: validates the session before admission
//! - **`connection`** - Per-socket task: writer queue, inbound frames, cleanup
//! - **`broadcast`** - The call write paths make after a mutation commits
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs          - Module exports and documentation
//! ├── registry.rs     - ConnectionRegistry
//! ├── gate.rs         - GET /api/ws upgrade gate
//! ├── connection.rs   - Per-connection task
//! └── broadcast.rs    - Broadcast dispatcher helpers
//! ```
//!
//! # Data Flow
//!
//! A write handler commits → `broadcast_event(registry, family_id, envelope)`
//! → the registry queues the frame for every connection of that family →
//! each connection's writer task sends it → the client agent forwards it to
//! the UI, which usually re-reads the resource through the REST API.
//!
//! Delivery is best effort: no replay, no acknowledgements, single process.

/// Connection registry
pub mod registry;

/// Upgrade gate
pub mod gate;

/// Per-connection task
pub mod connection;

/// Broadcast dispatcher
pub mod broadcast;

pub use broadcast::{broadcast_event, broadcast_event_except, notify_change};
pub use gate::ws_upgrade;
pub use registry::{ConnectionHandle, ConnectionRegistry, RegistryStats};
