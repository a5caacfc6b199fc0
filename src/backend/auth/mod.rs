//! Authentication Module
//!
//! Session lookup for the realtime upgrade. Sessions are issued by the REST
//! layer; this module only answers "which household does this credential
//! belong to".
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs       - Module exports and documentation
//! └── sessions.rs  - SessionValidator trait, JWT and Postgres validators
//! ```

/// Session validators
pub mod sessions;

pub use sessions::{JwtSessionValidator, PgSessionValidator, Session, SessionClaims, SessionValidator};
