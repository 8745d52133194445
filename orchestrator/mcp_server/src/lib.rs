//! MCP server for Kubernetes workloads.
//!
//! Exposes six cluster operations as MCP tools over JSON-RPC 2.0:
//!
//! - **create_pod** / **delete_pod**: single-container pods labeled `app=<name>`
//! - **create_namespace**: unconditional namespace creation
//! - **create_service**: one port mapping plus a label selector
//! - **describe_pod**: spec, status and per-container readiness in one report
//! - **get_pod_logs**: raw log text, optionally for one container
//!
//! # Architecture
//!
//! Tools run against an injected [`ControlPlane`](control_plane_interface::ControlPlane)
//! carried by a [`ToolContext`], which also bounds every call with a deadline
//! and a cancellation signal. Each tool returns a tagged [`ToolOutcome`];
//! rendering it to text is a separate step done by the transport.

pub mod config;
pub mod server;
pub mod tools;

pub use config::{ConfigError, ServerConfig};
pub use server::K8sMcpServer;
pub use server::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::{INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR};
pub use tools::{
    DispatchError, FailureKind, OutcomeData, RegistryError, ToolContext, ToolOutcome, ToolRegistry,
};

// Re-export common types
pub use rmcp;
