//! Shared Module
//!
//! Types used on both ends of the realtime socket: the message envelope,
//! typed ids, shared errors and the client agent's configuration.

/// Wire envelope and its payload union
pub mod envelope;

/// Family and user ids
pub mod ids;

/// Shared error types
pub mod error;

/// Client configuration
pub mod config;

pub use envelope::{Change, ConnectedPayload, Envelope, Payload, Resource, ResourceEvent};
pub use error::SharedError;
pub use ids::{FamilyId, UserId};
pub use config::{AgentConfig, AgentConfigBuilder, ConfigError};
