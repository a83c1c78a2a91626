//! JSON-RPC 2.0 envelopes and the MCP payloads the client exchanges.

use crate::mcp_client::{domain::ToolDefinition, ports::SessionError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub(crate) const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision offered during `initialize`.
pub(crate) const PROTOCOL_VERSION: &str = "2025-03-26";

/// Revisions the client accepts from a server.
pub(crate) const SUPPORTED_PROTOCOL_VERSIONS: [&str; 2] = ["2025-03-26", "2024-11-05"];

pub(crate) mod methods {
    pub(crate) const INITIALIZE: &str = "initialize";
    pub(crate) const INITIALIZED: &str = "notifications/initialized";
    pub(crate) const TOOLS_LIST: &str = "tools/list";
    pub(crate) const TOOLS_CALL: &str = "tools/call";
    pub(crate) const PING: &str = "ping";
}

pub(crate) mod error_codes {
    /// The method does not exist or is not available.
    pub(crate) const METHOD_NOT_FOUND: i64 = -32601;
    /// Internal JSON-RPC error.
    pub(crate) const INTERNAL_ERROR: i64 = -32603;
}

#[derive(Debug, Serialize)]
pub(crate) struct OutgoingRequest<'a> {
    pub(crate) jsonrpc: &'static str,
    pub(crate) id: u64,
    pub(crate) method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OutgoingNotification<'a> {
    pub(crate) jsonrpc: &'static str,
    pub(crate) method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OutgoingReply {
    pub(crate) jsonrpc: &'static str,
    pub(crate) id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<RpcErrorObject>,
}

/// Any message a server may write: response, request, or notification.
#[derive(Debug, Deserialize)]
pub(crate) struct IncomingMessage {
    #[serde(default)]
    pub(crate) id: Option<Value>,
    #[serde(default)]
    pub(crate) method: Option<String>,
    #[serde(default)]
    pub(crate) result: Option<Value>,
    #[serde(default)]
    pub(crate) error: Option<RpcErrorObject>,
}

impl IncomingMessage {
    pub(crate) fn response_id(&self) -> Option<u64> {
        if self.method.is_some() {
            return None;
        }
        self.id.as_ref().and_then(Value::as_u64)
    }

    /// Converts a response into its result payload.
    pub(crate) fn into_result(self) -> Result<Value, SessionError> {
        if let Some(error) = self.error {
            return Err(SessionError::Protocol {
                code: error.code,
                message: error.message,
            });
        }
        self.result.ok_or_else(|| SessionError::Protocol {
            code: error_codes::INTERNAL_ERROR,
            message: "response missing both result and error".to_owned(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RpcErrorObject {
    pub(crate) code: i64,
    pub(crate) message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InitializeResult {
    pub(crate) protocol_version: String,
    #[serde(default)]
    pub(crate) server_info: Option<ServerInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerInfo {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListToolsResult {
    #[serde(default)]
    pub(crate) tools: Vec<WireTool>,
    #[serde(default)]
    pub(crate) next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireTool {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default = "empty_object_schema")]
    pub(crate) input_schema: Value,
}

fn empty_object_schema() -> Value {
    json!({"type": "object"})
}

impl TryFrom<WireTool> for ToolDefinition {
    type Error = SessionError;

    fn try_from(tool: WireTool) -> Result<Self, Self::Error> {
        Self::new(tool.name, tool.description, tool.input_schema)
            .map_err(|err| SessionError::ProtocolMismatch(err.to_string()))
    }
}

pub(crate) fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

pub(crate) fn list_tools_params(cursor: Option<&str>) -> Option<Value> {
    cursor.map(|value| json!({ "cursor": value }))
}

pub(crate) fn call_tool_params(name: &str, arguments: Value) -> Value {
    json!({ "name": name, "arguments": arguments })
}
