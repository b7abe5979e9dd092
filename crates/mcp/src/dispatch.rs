//! Per-frame request handling and the connection loop.
//!
//! A frame is parsed as a JSON-RPC envelope, routed by method and answered
//! with exactly one envelope. Per-request failures become error envelopes or
//! `isError` tool results; only a transport failure ends [`serve`].

use crate::{
    args::Arguments,
    protocol::{
        CallToolParams, ErrorObject, INVALID_REQUEST, Implementation, InitializeParams,
        InitializeResult, JSONRPC_VERSION, ListToolsResult, PROTOCOL_VERSION, Request, Response,
        ServerCapabilities, ToolResult,
    },
    registry::Registry,
    transport::Transport,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Routes parsed requests to `initialize`, the tool catalogue, or a tool.
///
/// Holds only read-only state, so one instance is shared by every
/// connection.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    server_info: Implementation,
}

impl Dispatcher {
    pub fn new(registry: Registry, server_info: Implementation) -> Self {
        Self {
            registry: Arc::new(registry),
            server_info,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handle one raw frame, returning the serialized reply if one is due.
    pub async fn handle_frame(&self, frame: &str) -> Option<String> {
        let response = match parse_request(frame) {
            Ok(request) => self.handle_request(request).await?,
            Err((id, error)) => {
                warn!(code = error.code, "rejected frame: {}", error.message);
                Response::error(id, error)
            }
        };
        Some(serde_json::to_string(&response).unwrap_or_else(|e| {
            json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": response.id,
                "error": ErrorObject::server_error(format!("failed to encode response: {e}")),
            })
            .to_string()
        }))
    }

    /// Handle a parsed request. Notifications yield `None`.
    pub async fn handle_request(&self, request: Request) -> Option<Response> {
        if request.is_notification() {
            debug!(method = %request.method, "notification");
            return None;
        }
        let id = request.id.unwrap_or(Value::Null);
        let outcome = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "mcp.list_tools" | "tools/list" => self.list_tools(),
            "mcp.call_tool" | "tools/call" => self.call_tool(request.params).await,
            "ping" => Ok(json!({})),
            other => Err(ErrorObject::method_not_found(other)),
        };
        Some(match outcome {
            Ok(result) => Response::success(id, result),
            Err(error) => {
                warn!(method = %request.method, code = error.code, "{}", error.message);
                Response::error(id, error)
            }
        })
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, ErrorObject> {
        let params: InitializeParams = match params {
            None => InitializeParams::default(),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| ErrorObject::invalid_params(format!("invalid initialize params: {e}")))?,
        };
        info!(
            client = ?params.client_info,
            protocol = params.protocol_version.as_deref().unwrap_or("unspecified"),
            "initialize"
        );
        to_value(InitializeResult {
            server_info: self.server_info.clone(),
            protocol_version: PROTOCOL_VERSION,
            capabilities: ServerCapabilities::default(),
        })
    }

    fn list_tools(&self) -> Result<Value, ErrorObject> {
        to_value(ListToolsResult {
            tools: self.registry.list(),
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, ErrorObject> {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| ErrorObject::invalid_params(format!("invalid call_tool params: {e}")))?;
        let result = match self.registry.get(&params.name) {
            Some(tool) => {
                info!(tool = %params.name, "call_tool");
                let args = Arguments::new(params.arguments.unwrap_or_default());
                tool.call(args).await
            }
            None => ToolResult::error(format!("unknown tool: {}", params.name)),
        };
        if result.is_error() {
            warn!(
                tool = %params.name,
                "tool failed: {}",
                result.content.first().map(|c| c.as_text()).unwrap_or_default()
            );
        }
        to_value(result)
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, ErrorObject> {
    serde_json::to_value(value).map_err(|e| ErrorObject::server_error(e.to_string()))
}

/// Parse one frame into a request. A rejected frame carries the id to
/// answer with: the frame's own `id` member when it has one, else null.
fn parse_request(frame: &str) -> Result<Request, (Value, ErrorObject)> {
    let value: Value = serde_json::from_str(frame).map_err(|e| {
        (
            Value::Null,
            ErrorObject::parse_error(format!("parse error: {e}")),
        )
    })?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: Request = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => return Err((id, ErrorObject::parse_error(format!("parse error: {e}")))),
    };
    if request.jsonrpc != JSONRPC_VERSION {
        let error = ErrorObject::new(
            INVALID_REQUEST,
            format!("unsupported jsonrpc version: {}", request.jsonrpc),
        );
        return Err((id, error));
    }
    Ok(request)
}

/// Drive one connection until EOF, shutdown, or a transport failure.
///
/// Requests are handled one at a time, so replies leave in arrival order.
/// Shutdown is only observed while waiting for the next frame.
pub async fn serve<T: Transport>(
    dispatcher: &Dispatcher,
    mut transport: T,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("shutdown requested; closing connection");
                return Ok(());
            }
            frame = transport.read_frame() => frame?,
        };
        let Some(frame) = frame else {
            debug!("transport reached end of input");
            return Ok(());
        };
        debug!(frame = %frame, "recv");
        if let Some(reply) = dispatcher.handle_frame(&frame).await {
            debug!(frame = %reply, "send");
            transport.write_frame(&reply).await?;
        }
    }
}
