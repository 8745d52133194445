//! `ControlPlane` backed by a Kubernetes API server.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use kube::api::{Api, DeleteParams, LogParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{debug, info};

use control_plane_interface::ControlPlane;
use orchestrator_shared_types::{ControlPlaneError, ResourceRef, Result};

/// Default connection timeout for the kube client
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for the kube client
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// How to reach the API server.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Explicit kubeconfig file. When unset, the usual inference applies
    /// (`KUBECONFIG`, `~/.kube/config`, then in-cluster service account).
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context to use instead of the current one.
    pub context: Option<String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Control plane that forwards every call to the Kubernetes API.
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
}

impl KubeControlPlane {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from `options` and wrap it.
    pub async fn connect(options: &ConnectOptions) -> Result<Self> {
        let kube_options = KubeConfigOptions {
            context: options.context.clone(),
            ..Default::default()
        };

        let mut config = match (&options.kubeconfig, &options.context) {
            (Some(path), _) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    ControlPlaneError::Transport(format!(
                        "failed to read kubeconfig {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &kube_options)
                    .await
                    .map_err(|e| {
                        ControlPlaneError::Transport(format!("failed to load kubeconfig: {}", e))
                    })?
            }
            (None, Some(_)) => Config::from_kubeconfig(&kube_options).await.map_err(|e| {
                ControlPlaneError::Transport(format!("failed to load kubeconfig: {}", e))
            })?,
            (None, None) => Config::infer().await.map_err(|e| {
                ControlPlaneError::Transport(format!("failed to infer config: {}", e))
            })?,
        };
        config.connect_timeout = Some(options.connect_timeout);
        config.read_timeout = Some(options.read_timeout);

        info!(cluster_url = %config.cluster_url, "Connecting to Kubernetes API");

        let client = Client::try_from(config).map_err(|e| {
            ControlPlaneError::Transport(format!("failed to create client: {}", e))
        })?;
        Ok(Self::new(client))
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Classify a kube error for `resource`.
fn map_kube_error(err: kube::Error, resource: ResourceRef) -> ControlPlaneError {
    match err {
        kube::Error::Api(e) if e.code == 404 => ControlPlaneError::NotFound {
            resource,
            message: e.message,
        },
        kube::Error::Api(e) if e.code == 409 => ControlPlaneError::Conflict {
            resource,
            message: e.message,
        },
        kube::Error::Api(e) => ControlPlaneError::Api {
            code: e.code,
            reason: e.reason,
            message: e.message,
        },
        other => ControlPlaneError::Transport(other.to_string()),
    }
}

fn object_name(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> String {
    meta.name.clone().unwrap_or_default()
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn get_namespace(&self, name: &str) -> Result<Namespace> {
        debug!(namespace = %name, "Reading namespace");
        self.namespaces()
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, ResourceRef::namespace(name)))
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace> {
        let name = object_name(&namespace.metadata);
        debug!(namespace = %name, "Creating namespace");
        self.namespaces()
            .create(&PostParams::default(), namespace)
            .await
            .map_err(|e| map_kube_error(e, ResourceRef::namespace(name)))
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        debug!(namespace = %name, "Deleting namespace");
        self.namespaces()
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(e, ResourceRef::namespace(name)))
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        debug!(namespace = %namespace, pod = %name, "Reading pod");
        self.pods(namespace)
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, ResourceRef::pod(namespace, name)))
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod> {
        let name = object_name(&pod.metadata);
        debug!(namespace = %namespace, pod = %name, "Creating pod");
        self.pods(namespace)
            .create(&PostParams::default(), pod)
            .await
            .map_err(|e| map_kube_error(e, ResourceRef::pod(namespace, name)))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        debug!(namespace = %namespace, pod = %name, "Deleting pod");
        self.pods(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(e, ResourceRef::pod(namespace, name)))
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service> {
        debug!(namespace = %namespace, service = %name, "Reading service");
        self.services(namespace)
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, ResourceRef::service(namespace, name)))
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        let name = object_name(&service.metadata);
        debug!(namespace = %namespace, service = %name, "Creating service");
        self.services(namespace)
            .create(&PostParams::default(), service)
            .await
            .map_err(|e| map_kube_error(e, ResourceRef::service(namespace, name)))
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        debug!(namespace = %namespace, service = %name, "Deleting service");
        self.services(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(e, ResourceRef::service(namespace, name)))
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        container: Option<&str>,
    ) -> Result<String> {
        debug!(namespace = %namespace, pod = %name, container = ?container, "Fetching pod logs");
        let params = LogParams {
            container: container.map(str::to_string),
            ..Default::default()
        };
        self.pods(namespace)
            .logs(name, &params)
            .await
            .map_err(|e| map_kube_error(e, ResourceRef::pod(namespace, name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;

    fn api_error(code: u16, reason: &str, message: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_404_maps_to_not_found() {
        let err = map_kube_error(
            api_error(404, "NotFound", "pods \"web\" not found"),
            ResourceRef::pod("default", "web"),
        );
        assert_eq!(
            err,
            ControlPlaneError::NotFound {
                resource: ResourceRef::pod("default", "web"),
                message: "pods \"web\" not found".to_string(),
            }
        );
    }

    #[test]
    fn test_409_maps_to_conflict() {
        let err = map_kube_error(
            api_error(409, "AlreadyExists", "namespaces \"prod\" already exists"),
            ResourceRef::namespace("prod"),
        );
        assert!(err.is_conflict());
    }

    #[test]
    fn test_other_status_keeps_code_and_reason() {
        let err = map_kube_error(
            api_error(403, "Forbidden", "pods is forbidden"),
            ResourceRef::pod("default", "web"),
        );
        assert_eq!(err.status_code(), Some(403));
        assert_eq!(err.reason(), Some("Forbidden"));
        assert_eq!(err.to_string(), "(403) Forbidden: pods is forbidden");
    }

    #[test]
    fn test_default_connect_options() {
        let options = ConnectOptions::default();
        assert!(options.kubeconfig.is_none());
        assert_eq!(options.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(options.read_timeout, DEFAULT_READ_TIMEOUT);
    }
}
