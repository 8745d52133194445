//! Tool registration and dispatch.
//!
//! Each tool declares a typed input; its JSON Schema (generated with
//! `schemars`) is the argument schema advertised to callers, and serde fills
//! the declared defaults when the dispatcher decodes an invocation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn, Instrument};

use observability::tool_span;

use super::context::ToolContext;
use super::describe::DescribePodTool;
use super::namespace::CreateNamespaceTool;
use super::outcome::ToolOutcome;
use super::pod::{CreatePodTool, DeletePodTool, GetPodLogsTool};
use super::service::CreateServiceTool;

/// A named operation with a typed argument set.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    /// Stable public name; part of the compatibility surface.
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    type Input: DeserializeOwned + JsonSchema + Send;

    /// Run the tool. Control-plane failures come back as a failure outcome.
    async fn run(&self, ctx: &ToolContext, input: Self::Input) -> ToolOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),
    #[error("Invalid input schema for {tool}: {message}")]
    Schema { tool: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Unknown operation: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
}

/// Advertised description of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments
    pub input_schema: Value,
}

/// Object-safe form of [`Tool`].
#[async_trait]
trait ErasedTool: Send + Sync {
    async fn invoke(&self, ctx: &ToolContext, arguments: Value)
        -> Result<ToolOutcome, DispatchError>;
}

struct Typed<T>(T);

#[async_trait]
impl<T: Tool> ErasedTool for Typed<T> {
    async fn invoke(
        &self,
        ctx: &ToolContext,
        arguments: Value,
    ) -> Result<ToolOutcome, DispatchError> {
        // Callers may omit `arguments` entirely
        let arguments = match arguments {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let input: T::Input =
            serde_json::from_value(arguments).map_err(|e| DispatchError::InvalidArguments {
                tool: T::NAME.to_string(),
                message: e.to_string(),
            })?;
        Ok(self.0.run(ctx, input).await)
    }
}

struct RegisteredTool {
    definition: ToolDefinition,
    handler: Box<dyn ErasedTool>,
}

/// Name → tool mapping used to route invocations.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the six cluster tools.
    pub fn standard() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(CreatePodTool)?;
        registry.register(DeletePodTool)?;
        registry.register(CreateNamespaceTool)?;
        registry.register(CreateServiceTool)?;
        registry.register(DescribePodTool)?;
        registry.register(GetPodLogsTool)?;
        Ok(registry)
    }

    /// Register `tool` under `T::NAME`. Names are unique; a second
    /// registration under the same name is rejected.
    pub fn register<T: Tool>(&mut self, tool: T) -> Result<(), RegistryError> {
        if self.tools.contains_key(T::NAME) {
            return Err(RegistryError::DuplicateTool(T::NAME.to_string()));
        }
        let input_schema = serde_json::to_value(schemars::schema_for!(T::Input)).map_err(|e| {
            RegistryError::Schema {
                tool: T::NAME.to_string(),
                message: e.to_string(),
            }
        })?;
        let definition = ToolDefinition {
            name: T::NAME.to_string(),
            description: T::DESCRIPTION.to_string(),
            input_schema,
        };
        debug!(tool = T::NAME, "Registered tool");
        self.tools.insert(
            T::NAME.to_string(),
            RegisteredTool {
                definition,
                handler: Box::new(Typed(tool)),
            },
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Definitions of every tool, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    pub fn definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|t| &t.definition)
    }

    /// Route an invocation to its tool.
    pub async fn invoke(
        &self,
        ctx: &ToolContext,
        name: &str,
        arguments: Value,
    ) -> Result<ToolOutcome, DispatchError> {
        let tool = self.tools.get(name).ok_or_else(|| {
            warn!(tool = %name, "Unknown tool");
            DispatchError::UnknownTool(name.to_string())
        })?;

        let outcome = tool
            .handler
            .invoke(ctx, arguments)
            .instrument(tool_span!(name))
            .await?;

        match outcome.failure_detail() {
            None => debug!(tool = %name, "Tool succeeded"),
            Some(failure) => warn!(
                tool = %name,
                kind = ?failure.kind,
                code = ?failure.code,
                error = %failure.message,
                "Tool failed"
            ),
        }
        Ok(outcome)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::outcome::OutcomeData;
    use control_plane::MockControlPlane;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EchoInput {
        name: String,
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        const NAME: &'static str = "create_namespace";
        const DESCRIPTION: &'static str = "Echo the name back";
        type Input = EchoInput;

        async fn run(&self, _ctx: &ToolContext, input: EchoInput) -> ToolOutcome {
            ToolOutcome::success(
                Self::NAME,
                OutcomeData::NamespaceCreated {
                    namespace: input.name,
                },
            )
        }
    }

    fn context() -> ToolContext {
        ToolContext::new(Arc::new(MockControlPlane::new()))
    }

    #[test]
    fn test_standard_registry_has_six_tools() {
        let registry = ToolRegistry::standard().unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "create_namespace",
                "create_pod",
                "create_service",
                "delete_pod",
                "describe_pod",
                "get_pod_logs",
            ]
        );
        assert!(registry.contains("describe_pod"));
        assert!(!registry.contains("scale_deployment"));
    }

    #[test]
    fn test_schema_error_display() {
        let err = RegistryError::Schema {
            tool: "create_pod".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid input schema for create_pod: boom");
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::standard().unwrap();
        let err = registry.register(EchoTool).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateTool("create_namespace".to_string())
        );
        assert_eq!(registry.len(), 6);
        assert!(registry.contains("create_namespace"));
    }

    #[test]
    fn test_schema_declares_required_and_defaults() {
        let registry = ToolRegistry::standard().unwrap();
        let schema = &registry.definition("create_service").unwrap().input_schema;

        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, vec!["name"]);

        let props = &schema["properties"];
        assert_eq!(props["namespace"]["default"], "default");
        assert_eq!(props["port"]["default"], 80);
        assert_eq!(props["target_port"]["default"], 80);
        assert_eq!(props["service_type"]["default"], "ClusterIP");
        assert_eq!(props["selector_key"]["default"], "app");
        assert!(props["selector_value"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::standard().unwrap();
        let err = registry
            .invoke(&context(), "scale_deployment", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::UnknownTool("scale_deployment".to_string()));
        assert_eq!(err.to_string(), "Unknown operation: scale_deployment");
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let registry = ToolRegistry::standard().unwrap();
        let err = registry
            .invoke(&context(), "delete_pod", json!({ "namespace": "prod" }))
            .await
            .unwrap_err();
        match err {
            DispatchError::InvalidArguments { tool, message } => {
                assert_eq!(tool, "delete_pod");
                assert!(message.contains("name"), "unexpected message: {}", message);
            }
            other => panic!("expected InvalidArguments, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_null_arguments_treated_as_empty() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        let err = registry
            .invoke(&context(), "create_namespace", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_routes_to_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        let outcome = registry
            .invoke(&context(), "create_namespace", json!({ "name": "echo" }))
            .await
            .unwrap();
        assert_eq!(outcome.render(), "✅ Namespace 'echo' created successfully.");
    }
}
