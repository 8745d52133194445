//! Service creation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use orchestrator_shared_types::{ResourceRef, Result};

use super::context::ToolContext;
use super::guard::ensure_namespace;
use super::outcome::{OutcomeData, ToolOutcome};
use super::pod::{default_namespace, APP_LABEL};
use super::registry::Tool;

fn default_port() -> i32 {
    80
}

fn default_service_type() -> String {
    "ClusterIP".to_string()
}

fn default_selector_key() -> String {
    APP_LABEL.to_string()
}

/// Input for creating a service
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateServiceInput {
    /// Service name
    pub name: String,
    /// Namespace to create the service in; created if missing
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Port the service exposes
    #[serde(default = "default_port")]
    pub port: i32,
    /// Container port traffic is forwarded to
    #[serde(default = "default_port")]
    pub target_port: i32,
    /// Service type (ClusterIP, NodePort, LoadBalancer)
    #[serde(default = "default_service_type")]
    pub service_type: String,
    /// Label key the selector matches on
    #[serde(default = "default_selector_key")]
    pub selector_key: String,
    /// Label value the selector matches; defaults to the service name
    #[serde(default)]
    pub selector_value: Option<String>,
}

impl CreateServiceInput {
    /// Selector as requested, with an unset or empty value replaced by the
    /// service name.
    pub fn selector(&self) -> BTreeMap<String, String> {
        let value = self
            .selector_value
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(self.name.as_str());
        BTreeMap::from([(self.selector_key.clone(), value.to_string())])
    }
}

/// Service with one port mapping and the given selector.
pub fn build_service(
    name: &str,
    service_type: &str,
    port: i32,
    target_port: i32,
    selector: BTreeMap<String, String>,
) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(service_type.to_string()),
            selector: Some(selector),
            ports: Some(vec![ServicePort {
                port,
                target_port: Some(IntOrString::Int(target_port)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

async fn create_service(ctx: &ToolContext, input: &CreateServiceInput) -> Result<OutcomeData> {
    let namespace = ensure_namespace(ctx, &input.namespace).await?;
    let selector = input.selector();
    let service = build_service(
        &input.name,
        &input.service_type,
        input.port,
        input.target_port,
        selector.clone(),
    );

    ctx.call(
        "create service",
        ctx.control_plane().create_service(&input.namespace, &service),
    )
    .await?;
    info!(
        namespace = %input.namespace,
        service = %input.name,
        service_type = %input.service_type,
        port = input.port,
        target_port = input.target_port,
        "Service created"
    );

    Ok(OutcomeData::ServiceCreated {
        namespace,
        service: ResourceRef::service(&input.namespace, &input.name),
        service_type: input.service_type.clone(),
        port: input.port,
        target_port: input.target_port,
        selector,
    })
}

pub struct CreateServiceTool;

#[async_trait]
impl Tool for CreateServiceTool {
    const NAME: &'static str = "create_service";
    const DESCRIPTION: &'static str =
        "Create a service routing one port to pods matching a label selector, creating the namespace if it does not exist";
    type Input = CreateServiceInput;

    async fn run(&self, ctx: &ToolContext, input: CreateServiceInput) -> ToolOutcome {
        match create_service(ctx, &input).await {
            Ok(data) => ToolOutcome::success(Self::NAME, data),
            Err(e) => ToolOutcome::failure(Self::NAME, "create service", &e),
        }
    }
}
