//! Observability for the k8s MCP server.
//!
//! Structured logging through `tracing`, with spans carrying the tool name and
//! target resource. Output goes to stderr: stdout carries the protocol.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, parse_level, TracingConfig};

/// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level};
