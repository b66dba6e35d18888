//! Custom middleware implementations for the API.
//!
//! Request IDs, metrics collection, and MCP transport header extraction.

pub mod mcp;
pub mod metrics;
pub mod request_id;

pub use mcp::*;
pub use metrics::*;
pub use request_id::*;
