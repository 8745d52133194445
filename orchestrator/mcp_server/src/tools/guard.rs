//! Idempotent namespace creation.

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use orchestrator_shared_types::Result;

use super::context::ToolContext;

/// What [`ensure_namespace`] found or did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceEnsured {
    pub name: String,
    pub already_existed: bool,
}

impl NamespaceEnsured {
    pub fn message(&self) -> String {
        if self.already_existed {
            format!("Namespace '{}' already exists.", self.name)
        } else {
            format!("✅ Namespace '{}' created.", self.name)
        }
    }
}

/// Namespace object with only a name set.
pub fn namespace_object(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Make sure namespace `name` exists.
///
/// Reads first and creates only on NotFound. A Conflict from the create means
/// another caller created it between the read and the create; that counts as
/// already existing. Any other failure is returned unchanged.
pub async fn ensure_namespace(ctx: &ToolContext, name: &str) -> Result<NamespaceEnsured> {
    let existed = NamespaceEnsured {
        name: name.to_string(),
        already_existed: true,
    };

    match ctx
        .call("read namespace", ctx.control_plane().get_namespace(name))
        .await
    {
        Ok(_) => {
            debug!(namespace = %name, "Namespace already exists");
            return Ok(existed);
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    let namespace = namespace_object(name);
    match ctx
        .call(
            "create namespace",
            ctx.control_plane().create_namespace(&namespace),
        )
        .await
    {
        Ok(_) => {
            info!(namespace = %name, "Namespace created");
            Ok(NamespaceEnsured {
                name: name.to_string(),
                already_existed: false,
            })
        }
        Err(e) if e.is_conflict() => {
            debug!(namespace = %name, "Namespace created concurrently");
            Ok(existed)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use control_plane::{MockControlPlane, MockOperation};
    use orchestrator_shared_types::{ControlPlaneError, ResourceRef};
    use std::sync::Arc;

    fn context(cp: &MockControlPlane) -> ToolContext {
        ToolContext::new(Arc::new(cp.clone()))
    }

    #[tokio::test]
    async fn test_creates_missing_namespace() {
        let cp = MockControlPlane::new();
        let ensured = ensure_namespace(&context(&cp), "team-a").await.unwrap();
        assert!(!ensured.already_existed);
        assert_eq!(ensured.message(), "✅ Namespace 'team-a' created.");
        assert!(cp.namespace_exists("team-a").await);
    }

    #[tokio::test]
    async fn test_second_call_reports_existing() {
        let cp = MockControlPlane::new();
        let ctx = context(&cp);
        ensure_namespace(&ctx, "team-a").await.unwrap();
        let second = ensure_namespace(&ctx, "team-a").await.unwrap();
        assert!(second.already_existed);
        assert_eq!(second.message(), "Namespace 'team-a' already exists.");
        assert_eq!(cp.call_count(MockOperation::CreateNamespace).await, 1);
    }

    #[tokio::test]
    async fn test_lost_create_race_counts_as_existing() {
        let cp = MockControlPlane::new();
        cp.add_namespace("team-a").await;
        // The read misses, but by the time we create, someone else has.
        cp.fail_next(
            MockOperation::GetNamespace,
            ControlPlaneError::not_found(ResourceRef::namespace("team-a")),
        )
        .await;

        let ensured = ensure_namespace(&context(&cp), "team-a").await.unwrap();
        assert!(ensured.already_existed);
        assert_eq!(cp.call_count(MockOperation::CreateNamespace).await, 1);
    }

    #[tokio::test]
    async fn test_other_read_failure_propagates() {
        let cp = MockControlPlane::new();
        cp.fail_next(
            MockOperation::GetNamespace,
            ControlPlaneError::api(403, "Forbidden", "namespaces \"team-a\" is forbidden"),
        )
        .await;
        let err = ensure_namespace(&context(&cp), "team-a").await.unwrap_err();
        assert_eq!(err.status_code(), Some(403));
        assert_eq!(cp.call_count(MockOperation::CreateNamespace).await, 0);
    }

    #[tokio::test]
    async fn test_other_create_failure_propagates() {
        let cp = MockControlPlane::new();
        cp.fail_next(
            MockOperation::CreateNamespace,
            ControlPlaneError::api(422, "Invalid", "metadata.name: Invalid value"),
        )
        .await;
        let err = ensure_namespace(&context(&cp), "Bad_Name").await.unwrap_err();
        assert_eq!(err.reason(), Some("Invalid"));
    }
}
