//! MCP server for the cluster tools.
//!
//! Speaks JSON-RPC 2.0 over newline-delimited stdio. Each request is handled
//! on its own task, so a slow tool call does not hold up the others;
//! responses are written as they complete.

use std::sync::Arc;

use rmcp::model::Implementation;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use control_plane_interface::ControlPlaneHandle;

use crate::tools::{DispatchError, RegistryError, ToolContext, ToolRegistry};

/// Protocol version answered when the client does not ask for one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP server exposing a [`ToolRegistry`] against one control plane.
#[derive(Clone)]
pub struct K8sMcpServer {
    registry: Arc<ToolRegistry>,
    context: ToolContext,
}

impl K8sMcpServer {
    pub fn new(registry: ToolRegistry, context: ToolContext) -> Self {
        Self {
            registry: Arc::new(registry),
            context,
        }
    }

    /// Server with the standard tool set and default call settings.
    pub fn with_control_plane(control_plane: ControlPlaneHandle) -> Result<Self, RegistryError> {
        Ok(Self::new(
            ToolRegistry::standard()?,
            ToolContext::new(control_plane),
        ))
    }

    /// Get server info for MCP initialization.
    pub fn server_info() -> Implementation {
        Implementation {
            name: "k8s-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("Kubernetes MCP Server".to_string()),
            website_url: None,
            icons: None,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }
}

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID; absent for notifications
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name
    pub method: String,
    /// Parameters (optional)
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID (null when the request could not be read)
    pub id: Option<Value>,
    /// Result (on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Create an error response with data.
    pub fn error_with_data(
        id: Option<Value>,
        code: i32,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: Some(data),
            }),
        }
    }
}

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// ============================================================================
// MCP Protocol Implementation
// ============================================================================

impl K8sMcpServer {
    /// Handle an incoming JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %request.method, "Handling MCP request");

        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::error(
                request.id,
                INVALID_REQUEST,
                format!("Unsupported JSON-RPC version: {}", request.jsonrpc),
            );
        }

        match request.method.as_str() {
            // MCP Protocol Methods
            "initialize" => self.handle_initialize(request.id, request.params).await,
            "initialized" | "notifications/initialized" => {
                self.handle_initialized(request.id).await
            }
            "ping" => self.handle_ping(request.id).await,

            // Tool Methods
            "tools/list" => self.handle_tools_list(request.id).await,
            "tools/call" => self.handle_tools_call(request.id, request.params).await,

            // Unknown method
            _ => {
                warn!(method = %request.method, "Unknown method");
                JsonRpcResponse::error(
                    request.id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", request.method),
                )
            }
        }
    }

    /// Handle one line of input. Returns `None` for notifications, which get
    /// no response.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match parse_request(line) {
            Ok(request) => {
                let notification = request.is_notification();
                let response = self.handle_request(request).await;
                (!notification).then_some(response)
            }
            Err(response) => Some(response),
        }
    }

    /// Handle initialize request.
    async fn handle_initialize(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        #[derive(Debug, Default, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct InitializeParams {
            #[serde(default)]
            protocol_version: Option<String>,
            #[serde(default)]
            client_info: Option<Value>,
        }

        let params: InitializeParams = if params.is_null() {
            InitializeParams::default()
        } else {
            match serde_json::from_value(params) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        format!("Invalid params: {}", e),
                    );
                }
            }
        };

        let server_info = Self::server_info();
        let protocol_version = params
            .protocol_version
            .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string());
        let result = json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": server_info.name,
                "version": server_info.version,
                "title": server_info.title
            }
        });

        info!(
            protocol_version = %protocol_version,
            client = ?params.client_info,
            "MCP server initialized"
        );
        JsonRpcResponse::success(id, result)
    }

    /// Handle initialized notification.
    async fn handle_initialized(&self, id: Option<Value>) -> JsonRpcResponse {
        debug!("Client sent initialized notification");
        JsonRpcResponse::success(id, json!({}))
    }

    /// Handle ping request.
    async fn handle_ping(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({}))
    }

    /// Handle tools/list request.
    async fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools: Vec<Value> = self
            .registry
            .definitions()
            .into_iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema
                })
            })
            .collect();

        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    /// Handle tools/call request.
    async fn handle_tools_call(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        #[derive(Debug, Deserialize)]
        struct ToolCallParams {
            name: String,
            #[serde(default)]
            arguments: Value,
        }

        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid params: {}", e),
                );
            }
        };

        debug!(tool = %params.name, "Calling tool");

        let outcome = match self
            .registry
            .invoke(&self.context, &params.name, params.arguments)
            .await
        {
            Ok(outcome) => outcome,
            Err(e @ DispatchError::UnknownTool(_)) => {
                return JsonRpcResponse::error(id, METHOD_NOT_FOUND, e.to_string());
            }
            Err(DispatchError::InvalidArguments { tool, message }) => {
                return JsonRpcResponse::error_with_data(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid arguments for {}: {}", tool, message),
                    json!({ "tool": tool }),
                );
            }
        };

        let structured = match serde_json::to_value(&outcome) {
            Ok(value) => value,
            Err(e) => {
                error!(tool = %params.name, error = %e, "Failed to serialize outcome");
                return JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string());
            }
        };

        // Format result as MCP tool result
        JsonRpcResponse::success(
            id,
            json!({
                "content": [{
                    "type": "text",
                    "text": outcome.render()
                }],
                "structuredContent": structured,
                "isError": !outcome.is_success()
            }),
        )
    }

    /// Serve newline-delimited JSON-RPC from `reader`, writing responses to
    /// `writer`, until `reader` reaches EOF and every in-flight request has
    /// answered.
    pub async fn serve<R, W>(
        &self,
        reader: R,
        mut writer: W,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = reader;
        let mut buf = Vec::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        // Dropped at EOF so the channel closes once in-flight tasks finish.
        let mut tx = Some(tx);

        loop {
            tokio::select! {
                // Partial reads stay in `buf` if the other branch wins.
                read = reader.read_until(b'\n', &mut buf), if tx.is_some() => match read? {
                    0 => {
                        debug!("Input closed; draining in-flight requests");
                        tx = None;
                    }
                    _ => {
                        let line = std::mem::take(&mut buf);
                        if let Some(tx) = tx.as_ref() {
                            self.dispatch(line, tx);
                        }
                    }
                },
                Some(response) = rx.recv() => {
                    let response_json = serde_json::to_string(&response)?;
                    debug!(response = %response_json, "Sending response");
                    writer.write_all(response_json.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await?;
                }
                else => break,
            }
        }

        Ok(())
    }

    fn dispatch(&self, line: Vec<u8>, tx: &mpsc::UnboundedSender<JsonRpcResponse>) {
        let line = match String::from_utf8(line) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Request is not valid UTF-8");
                let _ = tx.send(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
                return;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        debug!(request = %line, "Received request");

        let request = match parse_request(line) {
            Ok(request) => request,
            Err(response) => {
                let _ = tx.send(response);
                return;
            }
        };

        let server = self.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let notification = request.is_notification();
            let response = server.handle_request(request).await;
            if !notification {
                // The receiver only goes away when serving has failed.
                let _ = tx.send(response);
            }
        });
    }

    /// Run the MCP server over stdio.
    pub async fn serve_stdio(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(tools = self.registry.len(), "MCP server listening on stdio");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await?;
        info!("MCP server shutdown");
        Ok(())
    }
}

/// Decode one request line. Malformed JSON is a parse error; well-formed JSON
/// that is not a request is an invalid request.
fn parse_request(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        error!(error = %e, "Failed to parse request");
        JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e))
    })?;
    let id = value.get("id").cloned().filter(|id| !id.is_null());
    serde_json::from_value(value).map_err(|e| {
        warn!(error = %e, "Invalid request");
        JsonRpcResponse::error(id, INVALID_REQUEST, format!("Invalid request: {}", e))
    })
}
