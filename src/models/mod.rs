//! Data models for the REST endpoints, the JSON-RPC envelope and MCP payloads.

pub mod api;
pub mod jsonrpc;
pub mod mcp;

pub use api::*;
pub use jsonrpc::{JsonRpcError, JsonRpcMessage, JsonRpcResponse, RequestId};
pub use mcp::*;
