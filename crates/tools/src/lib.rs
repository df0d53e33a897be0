//! Built-in tools and the registry that exposes them to agents (§4.3).
//!
//! Shell/process execution is explicitly out of scope for this system —
//! the tools here serve the closed agent set's own scenarios: long-term
//! memory search/ingest, a CRM collaborator stub, and a web-search stub
//! that reports unavailability rather than reaching the network.

pub mod builtins;
pub mod registry;

pub use builtins::register_all;
pub use registry::{Tool, ToolContext, ToolRegistry, ToolResult, ToolResultMetadata};
