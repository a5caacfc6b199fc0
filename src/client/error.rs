//! # Client Errors

use crate::shared::ConfigError;
use thiserror::Error;

/// Errors surfaced by the reconnection agent and its transports
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport could not be opened
    #[error("connection failed: {0}")]
    Connect(String),

    /// An open transport failed
    #[error("transport error: {0}")]
    Transport(String),

    /// The agent was given an unusable configuration
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Every `AgentHandle` command fails once the agent task is gone
    #[error("reconnection agent has stopped")]
    AgentStopped,
}

impl ClientError {
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}
