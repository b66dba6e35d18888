//! HTTP request handlers.
//!
//! REST endpoints for health, version and metrics, the MCP transport
//! endpoint, and the app factory that wires them together.

pub mod health;
pub mod mcp;
pub mod metrics;
pub mod openapi;
pub mod version;

pub use health::*;
pub use mcp::*;
pub use metrics::*;
pub use openapi::*;
pub use version::*;
