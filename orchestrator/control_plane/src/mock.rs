//! Mock control plane for testing and development.
//!
//! Keeps namespaces, pods and services in memory and answers with the same
//! status codes an API server would: 404 for missing objects (including the
//! namespace of a namespaced create), 409 for duplicate creates, 400 when a log
//! request cannot pick a container.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, NamespaceStatus, Pod, PodStatus, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tokio::sync::RwLock;
use tracing::{debug, info};

use control_plane_interface::ControlPlane;
use orchestrator_shared_types::{ControlPlaneError, ResourceRef, Result, DEFAULT_NAMESPACE};

/// Annotation naming the container `kubectl logs` picks when none is given.
pub const DEFAULT_CONTAINER_ANNOTATION: &str = "kubectl.kubernetes.io/default-container";

/// Operations that can have a failure injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    GetNamespace,
    CreateNamespace,
    DeleteNamespace,
    GetPod,
    CreatePod,
    DeletePod,
    GetService,
    CreateService,
    DeleteService,
    PodLogs,
}

type Key = (String, String);

#[derive(Debug, Default)]
struct MockState {
    namespaces: BTreeMap<String, Namespace>,
    pods: BTreeMap<Key, Pod>,
    services: BTreeMap<Key, Service>,
    /// Log text by (namespace, pod) and container name
    logs: HashMap<Key, HashMap<String, String>>,
    /// One-shot failures consumed by the next matching call
    failures: HashMap<MockOperation, Vec<ControlPlaneError>>,
    /// Every call in arrival order
    calls: Vec<MockOperation>,
}

/// In-memory control plane.
#[derive(Debug, Clone)]
pub struct MockControlPlane {
    state: Arc<RwLock<MockState>>,
    /// Artificial delay applied before every call
    latency: Option<Duration>,
}

impl Default for MockControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

fn meta(name: &str, namespace: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        ..Default::default()
    }
}

fn active_namespace(name: &str) -> Namespace {
    Namespace {
        metadata: meta(name, None),
        status: Some(NamespaceStatus {
            phase: Some("Active".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

impl MockControlPlane {
    /// A cluster with the `default` and `kube-system` namespaces.
    pub fn new() -> Self {
        let mut state = MockState::default();
        for ns in [DEFAULT_NAMESPACE, "kube-system"] {
            state.namespaces.insert(ns.to_string(), active_namespace(ns));
        }
        Self {
            state: Arc::new(RwLock::new(state)),
            latency: None,
        }
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next call to `operation` fail with `error`.
    pub async fn fail_next(&self, operation: MockOperation, error: ControlPlaneError) {
        self.state
            .write()
            .await
            .failures
            .entry(operation)
            .or_default()
            .push(error);
    }

    /// Add a namespace directly (for testing).
    pub async fn add_namespace(&self, name: &str) {
        self.state
            .write()
            .await
            .namespaces
            .insert(name.to_string(), active_namespace(name));
    }

    /// Insert a pod as-is, bypassing namespace checks (for testing).
    pub async fn insert_pod(&self, pod: Pod) {
        let namespace = pod
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let name = pod.metadata.name.clone().unwrap_or_default();
        info!("MockControlPlane: Inserting pod {}/{}", namespace, name);
        self.state.write().await.pods.insert((namespace, name), pod);
    }

    /// Replace a pod's status, as the kubelet would (for testing).
    pub async fn set_pod_status(&self, namespace: &str, name: &str, status: PodStatus) {
        let mut state = self.state.write().await;
        if let Some(pod) = state.pods.get_mut(&(namespace.to_string(), name.to_string())) {
            pod.status = Some(status);
        }
    }

    /// Seed the log text for one container of a pod (for testing).
    pub async fn set_logs(&self, namespace: &str, pod: &str, container: &str, text: &str) {
        self.state
            .write()
            .await
            .logs
            .entry((namespace.to_string(), pod.to_string()))
            .or_default()
            .insert(container.to_string(), text.to_string());
    }

    pub async fn namespace_exists(&self, name: &str) -> bool {
        self.state.read().await.namespaces.contains_key(name)
    }

    pub async fn pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        self.state
            .read()
            .await
            .pods
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub async fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.state
            .read()
            .await
            .services
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Calls received so far, in order.
    pub async fn calls(&self) -> Vec<MockOperation> {
        self.state.read().await.calls.clone()
    }

    /// Count of calls to `operation`.
    pub async fn call_count(&self, operation: MockOperation) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    /// Record the call, wait out the configured latency and pop any injected
    /// failure for `operation`.
    async fn begin(&self, operation: MockOperation) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.calls.push(operation);
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state.write().await;
        if let Some(queue) = state.failures.get_mut(&operation) {
            if !queue.is_empty() {
                let err = queue.remove(0);
                debug!(?operation, error = %err, "MockControlPlane: Injected failure");
                return Err(err);
            }
        }
        Ok(())
    }
}

fn require_namespace(state: &MockState, namespace: &str) -> Result<()> {
    if state.namespaces.contains_key(namespace) {
        Ok(())
    } else {
        Err(ControlPlaneError::not_found(ResourceRef::namespace(namespace)))
    }
}

fn bad_request(message: String) -> ControlPlaneError {
    ControlPlaneError::api(400, "BadRequest", message)
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn get_namespace(&self, name: &str) -> Result<Namespace> {
        self.begin(MockOperation::GetNamespace).await?;
        self.state
            .read()
            .await
            .namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| ControlPlaneError::not_found(ResourceRef::namespace(name)))
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace> {
        self.begin(MockOperation::CreateNamespace).await?;
        let name = namespace.metadata.name.clone().unwrap_or_default();
        if name.is_empty() {
            return Err(bad_request("namespace name is required".to_string()));
        }

        let mut state = self.state.write().await;
        if state.namespaces.contains_key(&name) {
            return Err(ControlPlaneError::conflict(ResourceRef::namespace(name)));
        }
        let mut created = namespace.clone();
        created.status = active_namespace(&name).status;
        info!("MockControlPlane: Created namespace {}", name);
        state.namespaces.insert(name, created.clone());
        Ok(created)
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        self.begin(MockOperation::DeleteNamespace).await?;
        let mut state = self.state.write().await;
        if state.namespaces.remove(name).is_none() {
            return Err(ControlPlaneError::not_found(ResourceRef::namespace(name)));
        }
        state.pods.retain(|(ns, _), _| ns != name);
        state.services.retain(|(ns, _), _| ns != name);
        info!("MockControlPlane: Deleted namespace {}", name);
        Ok(())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        self.begin(MockOperation::GetPod).await?;
        self.state
            .read()
            .await
            .pods
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ControlPlaneError::not_found(ResourceRef::pod(namespace, name)))
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod> {
        self.begin(MockOperation::CreatePod).await?;
        let name = pod.metadata.name.clone().unwrap_or_default();
        let has_containers = pod
            .spec
            .as_ref()
            .map(|s| !s.containers.is_empty())
            .unwrap_or(false);
        if name.is_empty() || !has_containers {
            return Err(bad_request(format!(
                "Pod \"{}\" is invalid: spec.containers: Required value",
                name
            )));
        }

        let mut state = self.state.write().await;
        require_namespace(&state, namespace)?;
        let key = (namespace.to_string(), name.clone());
        if state.pods.contains_key(&key) {
            return Err(ControlPlaneError::conflict(ResourceRef::pod(namespace, name)));
        }

        let mut created = pod.clone();
        created.metadata.namespace = Some(namespace.to_string());
        created.status = Some(PodStatus {
            phase: Some("Pending".to_string()),
            ..Default::default()
        });
        info!("MockControlPlane: Created pod {}/{}", namespace, name);
        state.pods.insert(key, created.clone());
        Ok(created)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        self.begin(MockOperation::DeletePod).await?;
        let mut state = self.state.write().await;
        let key = (namespace.to_string(), name.to_string());
        if state.pods.remove(&key).is_none() {
            return Err(ControlPlaneError::not_found(ResourceRef::pod(namespace, name)));
        }
        state.logs.remove(&key);
        info!("MockControlPlane: Deleted pod {}/{}", namespace, name);
        Ok(())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service> {
        self.begin(MockOperation::GetService).await?;
        self.state
            .read()
            .await
            .services
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ControlPlaneError::not_found(ResourceRef::service(namespace, name)))
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        self.begin(MockOperation::CreateService).await?;
        let name = service.metadata.name.clone().unwrap_or_default();
        if name.is_empty() {
            return Err(bad_request("service name is required".to_string()));
        }

        let mut state = self.state.write().await;
        require_namespace(&state, namespace)?;
        let key = (namespace.to_string(), name.clone());
        if state.services.contains_key(&key) {
            return Err(ControlPlaneError::conflict(ResourceRef::service(namespace, name)));
        }

        let mut created = service.clone();
        created.metadata.namespace = Some(namespace.to_string());
        info!("MockControlPlane: Created service {}/{}", namespace, name);
        state.services.insert(key, created.clone());
        Ok(created)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        self.begin(MockOperation::DeleteService).await?;
        let mut state = self.state.write().await;
        if state
            .services
            .remove(&(namespace.to_string(), name.to_string()))
            .is_none()
        {
            return Err(ControlPlaneError::not_found(ResourceRef::service(namespace, name)));
        }
        Ok(())
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        container: Option<&str>,
    ) -> Result<String> {
        self.begin(MockOperation::PodLogs).await?;
        let state = self.state.read().await;
        let key = (namespace.to_string(), name.to_string());
        let pod = state
            .pods
            .get(&key)
            .ok_or_else(|| ControlPlaneError::not_found(ResourceRef::pod(namespace, name)))?;

        let containers: Vec<String> = pod
            .spec
            .as_ref()
            .map(|s| s.containers.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default();

        let selected = match container {
            Some(c) if containers.iter().any(|n| n == c) => c.to_string(),
            Some(c) => {
                return Err(bad_request(format!(
                    "container {} is not valid for pod {}",
                    c, name
                )))
            }
            None => {
                let annotated = pod
                    .metadata
                    .annotations
                    .as_ref()
                    .and_then(|a| a.get(DEFAULT_CONTAINER_ANNOTATION))
                    .filter(|c| containers.contains(c))
                    .cloned();
                match (annotated, containers.as_slice()) {
                    (Some(c), _) => c,
                    (None, [only]) => only.clone(),
                    (None, _) => {
                        return Err(bad_request(format!(
                            "a container name must be specified for pod {}, choose one of: [{}]",
                            name,
                            containers.join(" ")
                        )))
                    }
                }
            }
        };

        Ok(state
            .logs
            .get(&key)
            .and_then(|by_container| by_container.get(&selected))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, PodSpec};

    fn test_pod(namespace: &str, name: &str, containers: &[&str]) -> Pod {
        Pod {
            metadata: meta(name, Some(namespace)),
            spec: Some(PodSpec {
                containers: containers
                    .iter()
                    .map(|c| Container {
                        name: c.to_string(),
                        image: Some("nginx".to_string()),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_default_namespace_is_seeded() {
        let cp = MockControlPlane::new();
        assert!(cp.get_namespace("default").await.is_ok());
        assert!(cp.get_namespace("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_namespace_conflicts() {
        let cp = MockControlPlane::new();
        let ns = Namespace {
            metadata: meta("team-a", None),
            ..Default::default()
        };
        cp.create_namespace(&ns).await.unwrap();
        let err = cp.create_namespace(&ns).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_create_pod_requires_namespace() {
        let cp = MockControlPlane::new();
        let err = cp
            .create_pod("nowhere", &test_pod("nowhere", "web", &["main"]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ControlPlaneError::not_found(ResourceRef::namespace("nowhere"))
        );
    }

    #[tokio::test]
    async fn test_create_pod_sets_pending_phase() {
        let cp = MockControlPlane::new();
        let created = cp
            .create_pod("default", &test_pod("default", "web", &["main"]))
            .await
            .unwrap();
        assert_eq!(
            created.status.and_then(|s| s.phase).as_deref(),
            Some("Pending")
        );
        assert!(cp
            .create_pod("default", &test_pod("default", "web", &["main"]))
            .await
            .unwrap_err()
            .is_conflict());
    }

    #[tokio::test]
    async fn test_delete_missing_pod_is_not_found() {
        let cp = MockControlPlane::new();
        let err = cp.delete_pod("default", "ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_namespace_cascades() {
        let cp = MockControlPlane::new();
        cp.add_namespace("scratch").await;
        cp.insert_pod(test_pod("scratch", "web", &["main"])).await;
        cp.delete_namespace("scratch").await.unwrap();
        assert!(cp.pod("scratch", "web").await.is_none());
        assert!(!cp.namespace_exists("scratch").await);
    }

    #[tokio::test]
    async fn test_service_round_trip() {
        let cp = MockControlPlane::new();
        let svc = Service {
            metadata: meta("api", None),
            ..Default::default()
        };
        cp.create_service("default", &svc).await.unwrap();
        let stored = cp.get_service("default", "api").await.unwrap();
        assert_eq!(stored.metadata.namespace.as_deref(), Some("default"));
        cp.delete_service("default", "api").await.unwrap();
        assert!(cp
            .get_service("default", "api")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_logs_single_container_default() {
        let cp = MockControlPlane::new();
        cp.insert_pod(test_pod("default", "web", &["main"])).await;
        cp.set_logs("default", "web", "main", "hello\n").await;
        assert_eq!(cp.pod_logs("default", "web", None).await.unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn test_logs_multi_container_needs_disambiguation() {
        let cp = MockControlPlane::new();
        cp.insert_pod(test_pod("default", "web", &["main", "sidecar"]))
            .await;
        let err = cp.pod_logs("default", "web", None).await.unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert!(err.to_string().contains("choose one of: [main sidecar]"));

        cp.set_logs("default", "web", "sidecar", "proxy up").await;
        assert_eq!(
            cp.pod_logs("default", "web", Some("sidecar")).await.unwrap(),
            "proxy up"
        );
    }

    #[tokio::test]
    async fn test_logs_default_container_annotation() {
        let cp = MockControlPlane::new();
        let mut pod = test_pod("default", "web", &["main", "sidecar"]);
        pod.metadata.annotations = Some(
            [(DEFAULT_CONTAINER_ANNOTATION.to_string(), "main".to_string())]
                .into_iter()
                .collect(),
        );
        cp.insert_pod(pod).await;
        cp.set_logs("default", "web", "main", "from main").await;
        assert_eq!(cp.pod_logs("default", "web", None).await.unwrap(), "from main");
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let cp = MockControlPlane::new();
        cp.fail_next(
            MockOperation::GetNamespace,
            ControlPlaneError::api(403, "Forbidden", "denied"),
        )
        .await;
        assert_eq!(
            cp.get_namespace("default").await.unwrap_err().status_code(),
            Some(403)
        );
        assert!(cp.get_namespace("default").await.is_ok());
        assert_eq!(cp.call_count(MockOperation::GetNamespace).await, 2);
    }
}
