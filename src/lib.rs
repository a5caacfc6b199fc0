//! homesync - Real-time Sync Layer
//!
//! When one family member changes the grocery list, a task, a bulletin note
//! or the calendar, every other signed-in device of that household hears
//! about it over a WebSocket, without polling.
//!
//! # Module Structure
//!
//! - **`shared`** - Types both ends agree on
//!   - Message envelope and its payload union
//!   - Family and user ids
//!   - Client configuration and endpoint paths
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Axum upgrade gate at `GET /api/ws`
//!   - Connection registry, scoped by family
//!   - Broadcast dispatcher called by write paths
//!   - Session validators (signed tokens or the `sessions` table)
//!
//! - **`client`** - Device-side reconnection agent
//!   - Status state machine with capped exponential backoff
//!   - `tokio-tungstenite` transport
//!
//! # Feature Flags
//!
//! - **`ssr`** - Server stack (axum, sqlx, jsonwebtoken). On by default.
//!
//! # Usage
//!
//! ## Server-Side
//!
//! ```rust,no_run
//! use homesync::backend::server::{create_app, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//! let (app, state) = create_app(&config)?;
//! // Hand `state.registry` to the write paths, then serve `app`.
//! # Ok(())
//! # }
//! ```
//!
//! ## Client-Side
//!
//! ```rust,no_run
//! use homesync::client::{ReconnectionAgent, TungsteniteConnector};
//! use homesync::shared::AgentConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::builder().server_url("http://localhost:3001").build()?;
//! let (agent, _events) = ReconnectionAgent::spawn(config, TungsteniteConnector);
//! agent.connect()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Delivery Guarantees
//!
//! Best effort only: no replay, no acknowledgements, one server process. A
//! device that missed an event sees the right state on its next ordinary
//! read.
//!
//! # Error Handling
//!
//! - `shared::SharedError` - envelope encoding and decoding
//! - `backend::BackendError` - handlers and session stores, renders as JSON
//! - `client::ClientError` - connection attempts and transports

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;

/// Device-side reconnection agent
pub mod client;
