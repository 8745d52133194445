//! Cluster tools exposed to MCP clients.
//!
//! Every tool runs against the control plane carried by its [`ToolContext`]
//! and returns a [`ToolOutcome`]; nothing here talks to a global client.

pub mod context;
pub mod describe;
pub mod guard;
pub mod namespace;
pub mod outcome;
pub mod pod;
pub mod registry;
pub mod service;

pub use context::{ToolContext, DEFAULT_CALL_TIMEOUT};
pub use describe::{describe, ContainerSummary, DescribePodInput, DescribePodTool, PodDescription};
pub use guard::{ensure_namespace, NamespaceEnsured};
pub use namespace::{CreateNamespaceInput, CreateNamespaceTool};
pub use outcome::{FailureKind, OutcomeData, ToolFailure, ToolOutcome};
pub use pod::{
    build_pod, CreatePodInput, CreatePodTool, DeletePodInput, DeletePodTool, GetPodLogsInput,
    GetPodLogsTool,
};
pub use registry::{DispatchError, RegistryError, Tool, ToolDefinition, ToolRegistry};
pub use service::{build_service, CreateServiceInput, CreateServiceTool};
