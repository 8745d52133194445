//! Tagged tool outcomes and the normalization of control-plane failures.
//!
//! Handlers never return errors to the dispatcher. Every control-plane failure
//! is folded into [`ToolOutcome::Failure`] with one of the [`FailureKind`]s;
//! successes carry a structured [`OutcomeData`] payload. Text for humans is
//! produced separately by [`ToolOutcome::render`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use orchestrator_shared_types::{ControlPlaneError, ResourceRef};

use super::describe::PodDescription;
use super::guard::NamespaceEnsured;

/// Coarse failure taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    NotFound,
    Conflict,
    ApiError,
    Unimplemented,
}

impl FailureKind {
    /// Classify a control-plane error.
    pub fn classify(err: &ControlPlaneError) -> Self {
        match err {
            ControlPlaneError::NotFound { .. } => FailureKind::NotFound,
            ControlPlaneError::Conflict { .. } => FailureKind::Conflict,
            ControlPlaneError::Api { .. }
            | ControlPlaneError::DeadlineExceeded { .. }
            | ControlPlaneError::Cancelled { .. }
            | ControlPlaneError::Transport(_) => FailureKind::ApiError,
        }
    }
}

/// Structured failure detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: FailureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub message: String,
}

impl ToolFailure {
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Unimplemented,
            code: None,
            reason: None,
            message: message.into(),
        }
    }
}

impl From<&ControlPlaneError> for ToolFailure {
    fn from(err: &ControlPlaneError) -> Self {
        Self {
            kind: FailureKind::classify(err),
            code: err.status_code(),
            reason: err.reason().map(str::to_string),
            message: err.to_string(),
        }
    }
}

/// Payload of a successful tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutcomeData {
    PodCreated {
        namespace: NamespaceEnsured,
        pod: ResourceRef,
        image: String,
        labels: BTreeMap<String, String>,
    },
    PodDeleted {
        pod: ResourceRef,
    },
    NamespaceCreated {
        namespace: String,
    },
    ServiceCreated {
        namespace: NamespaceEnsured,
        service: ResourceRef,
        service_type: String,
        port: i32,
        target_port: i32,
        selector: BTreeMap<String, String>,
    },
    PodDescribed(PodDescription),
    PodLogs {
        pod: ResourceRef,
        #[serde(skip_serializing_if = "Option::is_none")]
        container: Option<String>,
        logs: String,
    },
}

fn namespace_of(resource: &ResourceRef) -> &str {
    resource.namespace.as_deref().unwrap_or_default()
}

impl OutcomeData {
    pub fn render(&self) -> String {
        match self {
            OutcomeData::PodCreated {
                namespace,
                pod,
                image,
                ..
            } => format!(
                "{}\n✅ Pod '{}' created in namespace '{}' with image '{}'.",
                namespace.message(),
                pod.name,
                namespace_of(pod),
                image
            ),
            OutcomeData::PodDeleted { pod } => format!(
                "🗑️ Pod '{}' deleted from namespace '{}'.",
                pod.name,
                namespace_of(pod)
            ),
            OutcomeData::NamespaceCreated { namespace } => {
                format!("✅ Namespace '{}' created successfully.", namespace)
            }
            OutcomeData::ServiceCreated {
                namespace,
                service,
                service_type,
                port,
                target_port,
                ..
            } => format!(
                "{}\n✅ Service '{}' created in namespace '{}' of type '{}' exposing port {}->{}.",
                namespace.message(),
                service.name,
                namespace_of(service),
                service_type,
                port,
                target_port
            ),
            OutcomeData::PodDescribed(description) => description.render(),
            OutcomeData::PodLogs { pod, logs, .. } => format!(
                "📜 Logs for Pod '{}' (namespace: {}):\n\n{}",
                pod.name,
                namespace_of(pod),
                logs
            ),
        }
    }
}

/// Result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success {
        tool: String,
        data: OutcomeData,
    },
    Failure {
        tool: String,
        /// Verb phrase used in the rendered message, e.g. "create pod"
        action: String,
        error: ToolFailure,
    },
}

impl ToolOutcome {
    pub fn success(tool: &str, data: OutcomeData) -> Self {
        Self::Success {
            tool: tool.to_string(),
            data,
        }
    }

    /// Normalize a control-plane error into a failure outcome.
    pub fn failure(tool: &str, action: &str, err: &ControlPlaneError) -> Self {
        Self::Failure {
            tool: tool.to_string(),
            action: action.to_string(),
            error: ToolFailure::from(err),
        }
    }

    pub fn tool(&self) -> &str {
        match self {
            Self::Success { tool, .. } | Self::Failure { tool, .. } => tool,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&OutcomeData> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure_detail(&self) -> Option<&ToolFailure> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    /// Human-readable text for the caller.
    pub fn render(&self) -> String {
        match self {
            Self::Success { data, .. } => data.render(),
            Self::Failure { action, error, .. } => {
                format!("❌ Failed to {}: {}", action, error.message)
            }
        }
    }
}
