//! # Client Module
//!
//! The device side of the realtime layer: a reconnection agent that keeps
//! a WebSocket to the server open on a best-effort basis and republishes
//! every envelope it receives to the application.
//!
//! ## Architecture
//!
//! - **`agent`** - Status state machine, reconnect scheduling, send surface
//! - **`backoff`** - Delay policy between attempts
//! - **`transport`** - `Connector` seam and the `tokio-tungstenite` implementation
//! - **`error`** - Client error types
//!
//! Envelopes are forwarded without interpretation. A UI store that sees
//! `grocery:added` typically re-reads the list through the REST API rather
//! than trusting the payload.

pub mod agent;
pub mod backoff;
pub mod error;
pub mod transport;

pub use agent::{AgentEvent, AgentEvents, AgentHandle, ConnectionStatus, ReconnectionAgent};
pub use backoff::BackoffPolicy;
pub use error::ClientError;
pub use transport::{ConnectRequest, Connector, TransportCallbacks, TransportEvent, TungsteniteConnector};
