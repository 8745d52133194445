use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Namespace targeted when a caller does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Kinds of control-plane objects the tools operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Namespace,
    Pod,
    Service,
}

impl ResourceKind {
    /// Lower-case plural form, as the API server spells it in messages.
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Namespace => "namespaces",
            ResourceKind::Pod => "pods",
            ResourceKind::Service => "services",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Namespace => "Namespace",
            ResourceKind::Pod => "Pod",
            ResourceKind::Service => "Service",
        };
        f.write_str(name)
    }
}

/// Identity of a remote object. Namespaces are cluster-scoped, so `namespace` is
/// `None` for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceRef {
    pub fn namespace(name: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Namespace,
            namespace: None,
            name: name.into(),
        }
    }

    pub fn pod(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Pod,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn service(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Service,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Failures reported by the control plane or by the call wrapper around it.
///
/// `NotFound` and `Conflict` are split out because callers act on them; every
/// other API status lands in `Api` with its original code and reason.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlPlaneError {
    #[error("(404) NotFound: {message}")]
    NotFound {
        resource: ResourceRef,
        message: String,
    },
    #[error("(409) AlreadyExists: {message}")]
    Conflict {
        resource: ResourceRef,
        message: String,
    },
    #[error("({code}) {reason}: {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },
    #[error("{operation} did not complete within {}ms", timeout.as_millis())]
    DeadlineExceeded { operation: String, timeout: Duration },
    #[error("{operation} was cancelled")]
    Cancelled { operation: String },
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ControlPlaneError {
    /// Build the not-found error the API server would return for `resource`.
    pub fn not_found(resource: ResourceRef) -> Self {
        let message = format!("{} \"{}\" not found", resource.kind.plural(), resource.name);
        Self::NotFound { resource, message }
    }

    /// Build the already-exists error the API server would return for `resource`.
    pub fn conflict(resource: ResourceRef) -> Self {
        let message = format!(
            "{} \"{}\" already exists",
            resource.kind.plural(),
            resource.name
        );
        Self::Conflict { resource, message }
    }

    pub fn api(code: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// HTTP status code, when the failure came from the API server.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Conflict { .. } => Some(409),
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Machine-readable reason, when the failure came from the API server.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::NotFound { .. } => Some("NotFound"),
            Self::Conflict { .. } => Some("AlreadyExists"),
            Self::Api { reason, .. } => Some(reason.as_str()),
            _ => None,
        }
    }
}

// Generic result type for control-plane operations
pub type Result<T> = std::result::Result<T, ControlPlaneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_matches_api_server() {
        let err = ControlPlaneError::not_found(ResourceRef::pod("default", "web"));
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.to_string(), "(404) NotFound: pods \"web\" not found");
    }

    #[test]
    fn test_conflict_carries_reason() {
        let err = ControlPlaneError::conflict(ResourceRef::namespace("team-a"));
        assert!(err.is_conflict());
        assert_eq!(err.reason(), Some("AlreadyExists"));
        assert!(err.to_string().contains("namespaces \"team-a\" already exists"));
    }

    #[test]
    fn test_deadline_has_no_status_code() {
        let err = ControlPlaneError::DeadlineExceeded {
            operation: "get pod".to_string(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.status_code(), None);
        assert_eq!(err.to_string(), "get pod did not complete within 250ms");
    }

    #[test]
    fn test_resource_ref_display() {
        assert_eq!(ResourceRef::service("prod", "api").to_string(), "Service prod/api");
        assert_eq!(ResourceRef::namespace("prod").to_string(), "Namespace prod");
    }

    #[test]
    fn test_resource_ref_serializes_without_namespace() {
        let json = serde_json::to_value(ResourceRef::namespace("prod")).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "Namespace", "name": "prod" }));
    }
}
