use std::sync::Arc;

use async_trait::async_trait;
use downcast_rs::{impl_downcast, Downcast};
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use orchestrator_shared_types::Result;

/// Narrow view of the cluster control plane used by the tools.
///
/// Every call is a single round-trip. Implementations classify API failures
/// into `ControlPlaneError::NotFound` (404), `ControlPlaneError::Conflict`
/// (409) and `ControlPlaneError::Api` for everything else.
#[async_trait]
pub trait ControlPlane: Downcast + Send + Sync {
    async fn get_namespace(&self, name: &str) -> Result<Namespace>;
    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace>;
    async fn delete_namespace(&self, name: &str) -> Result<()>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod>;
    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod>;
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service>;
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service>;
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()>;

    /// Fetch the current log text of a pod. With no `container`, the control
    /// plane picks the default container or rejects the request when it
    /// cannot.
    async fn pod_logs(&self, namespace: &str, name: &str, container: Option<&str>)
        -> Result<String>;
}

impl_downcast!(ControlPlane);

/// Shared handle injected into the tool layer.
pub type ControlPlaneHandle = Arc<dyn ControlPlane>;
