//! Utilities Module
//!
//! Logging, input sanitization and the JSON-RPC transport.

mod http;
pub mod logging;
pub mod sanitize;

pub use http::*;
pub use sanitize::*;
