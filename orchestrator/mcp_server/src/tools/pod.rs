//! Pod tools: create, delete, logs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use orchestrator_shared_types::{ResourceRef, Result, DEFAULT_NAMESPACE};

use super::context::ToolContext;
use super::guard::ensure_namespace;
use super::outcome::{OutcomeData, ToolOutcome};
use super::registry::Tool;

/// Image used when the caller does not pick one.
pub const DEFAULT_IMAGE: &str = "nginx";
/// Name of the single container in pods built by `create_pod`.
pub const MAIN_CONTAINER: &str = "main";
/// Label key set to the pod name, so service selectors can find it.
pub const APP_LABEL: &str = "app";

pub(crate) fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

/// Input for creating a pod
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreatePodInput {
    /// Pod name
    pub name: String,
    /// Namespace to create the pod in; created if missing
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Container image (e.g., "nginx:1.27")
    #[serde(default = "default_image")]
    pub image: String,
}

/// Input for deleting a pod
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeletePodInput {
    /// Pod name
    pub name: String,
    /// Namespace of the pod
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

/// Input for fetching pod logs
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetPodLogsInput {
    /// Pod name
    pub name: String,
    /// Namespace of the pod
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Container to read; defaults to the pod's default container
    #[serde(default)]
    pub container: Option<String>,
}

/// Single-container pod labeled `app=<name>`.
pub fn build_pod(name: &str, image: &str) -> Pod {
    let labels = BTreeMap::from([(APP_LABEL.to_string(), name.to_string())]);
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: MAIN_CONTAINER.to_string(),
                image: Some(image.to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

async fn create_pod(ctx: &ToolContext, input: &CreatePodInput) -> Result<OutcomeData> {
    let namespace = ensure_namespace(ctx, &input.namespace).await?;
    let pod = build_pod(&input.name, &input.image);
    let labels = pod.metadata.labels.clone().unwrap_or_default();

    ctx.call(
        "create pod",
        ctx.control_plane().create_pod(&input.namespace, &pod),
    )
    .await?;
    info!(namespace = %input.namespace, pod = %input.name, image = %input.image, "Pod created");

    Ok(OutcomeData::PodCreated {
        namespace,
        pod: ResourceRef::pod(&input.namespace, &input.name),
        image: input.image.clone(),
        labels,
    })
}

pub struct CreatePodTool;

#[async_trait]
impl Tool for CreatePodTool {
    const NAME: &'static str = "create_pod";
    const DESCRIPTION: &'static str =
        "Create a single-container pod labeled app=<name>, creating the namespace if it does not exist";
    type Input = CreatePodInput;

    async fn run(&self, ctx: &ToolContext, input: CreatePodInput) -> ToolOutcome {
        match create_pod(ctx, &input).await {
            Ok(data) => ToolOutcome::success(Self::NAME, data),
            Err(e) => ToolOutcome::failure(Self::NAME, "create pod", &e),
        }
    }
}

pub struct DeletePodTool;

#[async_trait]
impl Tool for DeletePodTool {
    const NAME: &'static str = "delete_pod";
    const DESCRIPTION: &'static str = "Delete a pod";
    type Input = DeletePodInput;

    async fn run(&self, ctx: &ToolContext, input: DeletePodInput) -> ToolOutcome {
        let result = ctx
            .call(
                "delete pod",
                ctx.control_plane().delete_pod(&input.namespace, &input.name),
            )
            .await;
        match result {
            Ok(()) => {
                info!(namespace = %input.namespace, pod = %input.name, "Pod deleted");
                ToolOutcome::success(
                    Self::NAME,
                    OutcomeData::PodDeleted {
                        pod: ResourceRef::pod(input.namespace, input.name),
                    },
                )
            }
            Err(e) => ToolOutcome::failure(Self::NAME, "delete pod", &e),
        }
    }
}

pub struct GetPodLogsTool;

#[async_trait]
impl Tool for GetPodLogsTool {
    const NAME: &'static str = "get_pod_logs";
    const DESCRIPTION: &'static str =
        "Get the logs of a pod (like `kubectl logs`), optionally for a specific container";
    type Input = GetPodLogsInput;

    async fn run(&self, ctx: &ToolContext, input: GetPodLogsInput) -> ToolOutcome {
        let result = ctx
            .call(
                "get pod logs",
                ctx.control_plane().pod_logs(
                    &input.namespace,
                    &input.name,
                    input.container.as_deref(),
                ),
            )
            .await;
        match result {
            Ok(logs) => ToolOutcome::success(
                Self::NAME,
                OutcomeData::PodLogs {
                    pod: ResourceRef::pod(input.namespace, input.name),
                    container: input.container,
                    logs,
                },
            ),
            Err(e) => ToolOutcome::failure(Self::NAME, "get pod logs", &e),
        }
    }
}
