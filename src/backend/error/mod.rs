//! Backend Error Module
//!
//! One error enum for the server side, split the usual way:
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - BackendError and its status mapping
//! └── conversion.rs - IntoResponse (JSON body)
//! ```
//!
//! Session validators return `BackendError` when the store cannot answer;
//! the upgrade gate turns that into a 1008 close rather than an HTTP error.
//! Only the plain HTTP routes ever render it as a response.

/// Error type definitions
pub mod types;

/// IntoResponse implementation
pub mod conversion;

pub use types::BackendError;
