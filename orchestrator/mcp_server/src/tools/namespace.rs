//! Unconditional namespace creation.
//!
//! Unlike [`ensure_namespace`](super::guard::ensure_namespace), this tool does
//! not look first: creating a namespace that already exists is reported as a
//! Conflict failure.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::context::ToolContext;
use super::guard::namespace_object;
use super::outcome::{OutcomeData, ToolOutcome};
use super::registry::Tool;

/// Input for creating a namespace
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateNamespaceInput {
    /// Namespace name
    pub name: String,
}

pub struct CreateNamespaceTool;

#[async_trait]
impl Tool for CreateNamespaceTool {
    const NAME: &'static str = "create_namespace";
    const DESCRIPTION: &'static str =
        "Create a namespace; fails with a conflict if it already exists";
    type Input = CreateNamespaceInput;

    async fn run(&self, ctx: &ToolContext, input: CreateNamespaceInput) -> ToolOutcome {
        let namespace = namespace_object(&input.name);
        let result = ctx
            .call(
                "create namespace",
                ctx.control_plane().create_namespace(&namespace),
            )
            .await;
        match result {
            Ok(_) => {
                info!(namespace = %input.name, "Namespace created");
                ToolOutcome::success(
                    Self::NAME,
                    OutcomeData::NamespaceCreated {
                        namespace: input.name,
                    },
                )
            }
            Err(e) => ToolOutcome::failure(Self::NAME, "create namespace", &e),
        }
    }
}
