//! The JSON-RPC envelope and the method dispatcher.
//!
//! A request moves through `Received → MethodResolved → HandlerInvoked →
//! ResponseReady`; an unknown method short-circuits to a transport-level
//! error object, while a failure inside a tool handler comes back as an
//! error-shaped success response. The one notification method produces no
//! response at all.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::catalog;
use crate::context::GatewayContext;
use crate::error::Error;

/// The protocol revision echoed during capability negotiation.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
/// The server identity echoed during capability negotiation.
pub const SERVER_NAME: &str = "snapshot-gateway";
/// The code used for every transport-level error object.
pub const INTERNAL_ERROR: i64 = -32603;

/// One decoded request envelope. Consumed once, never mutated.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    /// Protocol version tag; tolerated when absent.
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Correlation id, echoed back in the response.
    #[serde(default)]
    pub id: Option<Value>,
    /// The method to dispatch on.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

/// One response envelope: the echoed correlation id plus exactly one of
/// `result` or `error`.
#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Echo of the request's correlation id.
    pub id: Value,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Structured failure object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// A transport-level failure object.
#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

impl RpcResponse {
    /// A successful response carrying `result`.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    /// A transport-level error response.
    pub fn error(id: Value, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError { code, message }),
        }
    }
}

/// Dispatches one decoded request.
///
/// Returns `None` for the fire-and-forget notification: the transport
/// must send nothing back for that one case, not even an empty object.
pub async fn handle_request(
    ctx: &GatewayContext,
    request: RpcRequest,
) -> Option<RpcResponse> {
    let id = request.id.unwrap_or(Value::Null);
    match request.method.as_str() {
        "initialize" => Some(RpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        )),
        "notifications/initialized" => {
            tracing::debug!("client finished initialization");
            None
        }
        "tools/list" => Some(RpcResponse::success(
            id,
            json!({ "tools": catalog::tools() }),
        )),
        "tools/call" => Some(
            handle_tool_call(ctx, id, request.params.unwrap_or(Value::Null))
                .await,
        ),
        other => Some(RpcResponse::error(
            id,
            INTERNAL_ERROR,
            format!("Unknown method: {other}"),
        )),
    }
}

/// Invokes one catalog entry and folds the outcome into the response.
///
/// An unknown tool is a well-formed request, so it surfaces as an
/// error-shaped tool result rather than a transport fault.
async fn handle_tool_call(
    ctx: &GatewayContext,
    id: Value,
    params: Value,
) -> RpcResponse {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return RpcResponse::error(
            id,
            INTERNAL_ERROR,
            "Missing tool name".into(),
        );
    };
    let args = params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| json!({}));
    match catalog::call(ctx, name, &args).await {
        Ok(wrapper) => RpcResponse::success(
            id,
            json!({
                "content": [{ "type": "text", "text": wrapper.to_string() }],
            }),
        ),
        Err(e @ Error::UnknownTool(_)) => RpcResponse::success(
            id,
            json!({
                "content": [{ "type": "text", "text": e.chain() }],
                "isError": true,
            }),
        ),
        Err(e) => {
            tracing::error!(tool = %name, error = %e, "tool invocation failed");
            RpcResponse::success(
                id,
                json!({
                    "content": [{ "type": "text", "text": e.chain() }],
                    "isError": true,
                }),
            )
        }
    }
}
