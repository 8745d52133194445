//! Pod description: merges spec, status and per-container status into one
//! report.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, ContainerStatus, Pod};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::context::ToolContext;
use super::outcome::{OutcomeData, ToolFailure, ToolOutcome};
use super::pod::default_namespace;
use super::registry::Tool;

const NONE: &str = "<none>";
const EVENTS_UNIMPLEMENTED: &str = "Events functionality is not implemented.";

/// One container line of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub name: String,
    pub image: Option<String>,
    /// `None` until the control plane reports a status for the container
    pub ready: Option<bool>,
    pub restart_count: i32,
}

/// Aggregated view of a pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodDescription {
    pub name: String,
    pub namespace: Option<String>,
    pub node: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub phase: Option<String>,
    pub pod_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_containers: Vec<ContainerSummary>,
    pub containers: Vec<ContainerSummary>,
    /// Event retrieval is not implemented; always an `Unimplemented` marker.
    pub events: ToolFailure,
}

fn summarize(containers: &[Container], statuses: &[ContainerStatus]) -> Vec<ContainerSummary> {
    containers
        .iter()
        .map(|c| {
            let status = statuses.iter().find(|s| s.name == c.name);
            ContainerSummary {
                name: c.name.clone(),
                image: c.image.clone(),
                ready: status.map(|s| s.ready),
                restart_count: status.map(|s| s.restart_count).unwrap_or(0),
            }
        })
        .collect()
}

/// Build the description of `pod`. Missing metadata, spec or status fields
/// are left empty rather than treated as errors.
pub fn describe(pod: &Pod) -> PodDescription {
    let meta = &pod.metadata;
    let spec = pod.spec.as_ref();
    let status = pod.status.as_ref();

    let statuses = status
        .and_then(|s| s.container_statuses.as_deref())
        .unwrap_or_default();
    let init_statuses = status
        .and_then(|s| s.init_container_statuses.as_deref())
        .unwrap_or_default();

    let containers = spec.map(|s| s.containers.as_slice()).unwrap_or_default();
    let init_containers = spec
        .and_then(|s| s.init_containers.as_deref())
        .unwrap_or_default();

    PodDescription {
        name: meta.name.clone().unwrap_or_default(),
        namespace: meta.namespace.clone(),
        node: spec.and_then(|s| s.node_name.clone()),
        labels: meta.labels.clone().unwrap_or_default(),
        annotations: meta.annotations.clone().unwrap_or_default(),
        phase: status.and_then(|s| s.phase.clone()),
        pod_ip: status.and_then(|s| s.pod_ip.clone()),
        init_containers: summarize(init_containers, init_statuses),
        containers: summarize(containers, statuses),
        events: ToolFailure::unimplemented(EVENTS_UNIMPLEMENTED),
    }
}

fn render_map(map: &BTreeMap<String, String>) -> String {
    if map.is_empty() {
        return NONE.to_string();
    }
    map.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

fn render_container(c: &ContainerSummary) -> String {
    let ready = match c.ready {
        Some(ready) => ready.to_string(),
        None => "unknown".to_string(),
    };
    format!(
        "  - Name: {}, Image: {}, Ready: {}, RestartCount: {}",
        c.name,
        c.image.as_deref().unwrap_or(NONE),
        ready,
        c.restart_count
    )
}

impl PodDescription {
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("Name:        {}", self.name),
            format!("Namespace:   {}", self.namespace.as_deref().unwrap_or(NONE)),
            format!("Node:        {}", self.node.as_deref().unwrap_or(NONE)),
            format!("Labels:      {}", render_map(&self.labels)),
            format!("Annotations: {}", render_map(&self.annotations)),
            format!("Status:      {}", self.phase.as_deref().unwrap_or("Unknown")),
            format!("IP:          {}", self.pod_ip.as_deref().unwrap_or(NONE)),
        ];
        if !self.init_containers.is_empty() {
            lines.push("Init Containers:".to_string());
            lines.extend(self.init_containers.iter().map(render_container));
        }
        lines.push("Containers:".to_string());
        lines.extend(self.containers.iter().map(render_container));
        lines.push(String::new());
        lines.push("Events:".to_string());
        lines.push(self.events.message.clone());
        lines.join("\n")
    }
}

/// Input for describing a pod
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DescribePodInput {
    /// Pod name
    pub name: String,
    /// Namespace of the pod
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

pub struct DescribePodTool;

#[async_trait]
impl Tool for DescribePodTool {
    const NAME: &'static str = "describe_pod";
    const DESCRIPTION: &'static str =
        "Describe a pod: node, labels, phase, IP and per-container readiness and restarts";
    type Input = DescribePodInput;

    async fn run(&self, ctx: &ToolContext, input: DescribePodInput) -> ToolOutcome {
        let result = ctx
            .call(
                "read pod",
                ctx.control_plane().get_pod(&input.namespace, &input.name),
            )
            .await;
        match result {
            Ok(pod) => ToolOutcome::success(Self::NAME, OutcomeData::PodDescribed(describe(&pod))),
            Err(e) => ToolOutcome::failure(Self::NAME, "describe pod", &e),
        }
    }
}
