//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - A real server bound to an ephemeral port
//! - WebSocket client helpers
//! - Custom assertion macros

#[cfg(feature = "ssr")]
pub mod server;

#[cfg(feature = "ssr")]
pub use server::*;
