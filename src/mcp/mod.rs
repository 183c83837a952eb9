//! Agent-facing tool server.
//!
//! Speaks newline-delimited JSON-RPC 2.0 (the MCP stdio transport) and
//! exposes a single tool, `discover_podcasts`. Discovery failures are never
//! protocol errors: the tool always answers with the rendered report text.

pub mod jsonrpc;
mod server;

pub use server::{ToolServer, TOOL_NAME};
