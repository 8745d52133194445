//! MCP server binary for Kubernetes workloads.
//!
//! # Usage
//!
//! Run with stdio transport (for MCP client integration):
//! ```bash
//! k8s-mcp --context staging --call-timeout-secs 10
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use control_plane::KubeControlPlane;
use mcp_server::{K8sMcpServer, ServerConfig, ToolContext, ToolRegistry};
use observability::init_tracing;

/// Kubernetes MCP server
#[derive(Parser, Debug)]
#[command(name = "k8s-mcp")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "K8S_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Kubeconfig file; inferred when omitted
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, env = "K8S_MCP_CONTEXT")]
    context: Option<String>,

    /// Deadline for each control-plane call, in seconds
    #[arg(long, env = "K8S_MCP_CALL_TIMEOUT_SECS")]
    call_timeout_secs: Option<u64>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "K8S_MCP_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(kubeconfig) = &self.kubeconfig {
            config.kubernetes.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(context) = &self.context {
            config.kubernetes.context = Some(context.clone());
        }
        if let Some(secs) = self.call_timeout_secs {
            config.tools.call_timeout_secs = secs;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.log_json {
            config.logging.json = true;
        }
    }
}

/// Load the config file (if any), apply overrides, then validate the result.
async fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .await
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli).await?;

    // Logs go to stderr: stdout is reserved for the protocol
    init_tracing(config.tracing_config());
    info!("Starting k8s MCP server...");

    let control_plane = KubeControlPlane::connect(&config.connect_options())
        .await
        .context("connecting to the Kubernetes API")?;

    let cancel = CancellationToken::new();
    let context = ToolContext::new(Arc::new(control_plane))
        .with_call_timeout(config.call_timeout())
        .with_cancellation(cancel.clone());
    let server = K8sMcpServer::new(ToolRegistry::standard()?, context);

    tokio::select! {
        result = server.serve_stdio() => result.map_err(|e| anyhow::anyhow!(e))?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; cancelling in-flight calls");
            cancel.cancel();
        }
    }

    info!("k8s MCP server stopped");
    Ok(())
}
