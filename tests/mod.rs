//! Test suite for homesync
//!
//! This module organizes all tests

pub mod common;
#[cfg(feature = "ssr")]
pub mod e2e;
#[cfg(feature = "ssr")]
pub mod integration;
pub mod property;
