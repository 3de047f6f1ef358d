//! JSON-RPC 2.0 message envelope.
//!
//! Every line on the ACP stream is exactly one [`Message`]: a request (has
//! `id` and `method`), a response (has `id` and one of `result` / `error`),
//! or a notification (has `method`, no `id`).

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{AppError, Result};

/// JSON-RPC protocol version string carried on every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Invalid JSON was received.
pub const PARSE_ERROR: i64 = -32700;
/// The JSON sent is not a valid request object.
pub const INVALID_REQUEST: i64 = -32600;
/// The method does not exist or is not available.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i64 = -32603;

/// Request identifier: JSON-RPC allows numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric identifier (all client-issued ids are numeric).
    Number(i64),
    /// String identifier (some agents use these).
    Str(String),
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(i64::try_from(id).unwrap_or(i64::MAX))
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code.
    pub code: i64,
    /// Short description.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Build an error object without `data`.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// `-32601` for `method`.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    /// `-32602` with a description of what was wrong.
    #[must_use]
    pub fn invalid_params(detail: impl Display) -> Self {
        Self::new(INVALID_PARAMS, format!("invalid params: {detail}"))
    }

    /// `-32603` with a description of the failure.
    #[must_use]
    pub fn internal(detail: impl Display) -> Self {
        Self::new(INTERNAL_ERROR, detail.to_string())
    }
}

impl From<RpcError> for AppError {
    fn from(err: RpcError) -> Self {
        Self::Rpc {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

impl From<&AppError> for RpcError {
    /// Map a handler failure to the error object sent back to the agent.
    fn from(err: &AppError) -> Self {
        match err {
            AppError::Rpc {
                code,
                message,
                data,
            } => Self {
                code: *code,
                message: message.clone(),
                data: data.clone(),
            },
            AppError::Acp(msg) => Self::invalid_params(msg),
            other => Self::internal(other),
        }
    }
}

/// A parsed ACP wire message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A call expecting exactly one response.
    Request {
        /// Correlation id.
        id: RequestId,
        /// Method name.
        method: String,
        /// Parameters (`Value::Null` when absent).
        params: Value,
    },
    /// The answer to an earlier request.
    Response {
        /// Id of the request being answered.
        id: RequestId,
        /// Success payload or error object.
        outcome: std::result::Result<Value, RpcError>,
    },
    /// Fire-and-forget message.
    Notification {
        /// Method name.
        method: String,
        /// Parameters (`Value::Null` when absent).
        params: Value,
    },
}

impl Message {
    /// Build a request.
    #[must_use]
    pub fn request(id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Self::Request {
            id,
            method: method.into(),
            params,
        }
    }

    /// Build a notification.
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self::Notification {
            method: method.into(),
            params,
        }
    }

    /// Build a success response.
    #[must_use]
    pub fn result(id: RequestId, result: Value) -> Self {
        Self::Response {
            id,
            outcome: Ok(result),
        }
    }

    /// Build an error response.
    #[must_use]
    pub fn error(id: RequestId, error: RpcError) -> Self {
        Self::Response {
            id,
            outcome: Err(error),
        }
    }

    /// Method name for requests and notifications.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => Some(method),
            Self::Response { .. } => None,
        }
    }

    /// Parse one NDJSON line.
    ///
    /// # Errors
    ///
    /// - [`AppError::Acp`]`("malformed json: …")`: not valid JSON.
    /// - [`AppError::Acp`]`("invalid envelope: …")`: valid JSON that is not
    ///   a JSON-RPC request, response, or notification.
    pub fn parse(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| AppError::Acp(format!("malformed json: {e}")))?;
        Self::from_value(value)
    }

    /// Interpret an already-parsed JSON value as a message.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Acp`]`("invalid envelope: …")` for values that do
    /// not fit any of the three shapes.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut obj) = value else {
            return Err(AppError::Acp("invalid envelope: not an object".into()));
        };

        let id = match obj.remove("id") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(
                serde_json::from_value::<RequestId>(raw)
                    .map_err(|_| AppError::Acp("invalid envelope: bad id".into()))?,
            ),
        };
        let method = match obj.remove("method") {
            None => None,
            Some(Value::String(m)) => Some(m),
            Some(_) => {
                return Err(AppError::Acp(
                    "invalid envelope: method is not a string".into(),
                ))
            }
        };
        let params = obj.remove("params").unwrap_or(Value::Null);

        match (id, method) {
            (Some(id), Some(method)) => Ok(Self::Request { id, method, params }),
            (None, Some(method)) => Ok(Self::Notification { method, params }),
            (Some(id), None) => Ok(Self::Response {
                id,
                outcome: response_outcome(&mut obj)?,
            }),
            (None, None) => Err(AppError::Acp(
                "invalid envelope: neither id nor method present".into(),
            )),
        }
    }

    /// Serialize to the JSON-RPC wire object (always carries `jsonrpc`).
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Request { id, method, params } => {
                let mut obj = json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "method": method });
                insert_params(&mut obj, params);
                obj
            }
            Self::Notification { method, params } => {
                let mut obj = json!({ "jsonrpc": JSONRPC_VERSION, "method": method });
                insert_params(&mut obj, params);
                obj
            }
            Self::Response { id, outcome } => match outcome {
                Ok(result) => json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "result": result }),
                Err(error) => json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "error": error }),
            },
        }
    }
}

/// Extract exactly one of `result` / `error` from a response object.
fn response_outcome(obj: &mut Map<String, Value>) -> Result<std::result::Result<Value, RpcError>> {
    match (obj.remove("result"), obj.remove("error")) {
        (Some(result), None) => Ok(Ok(result)),
        (None, Some(error)) => serde_json::from_value::<RpcError>(error)
            .map(Err)
            .map_err(|e| AppError::Acp(format!("invalid envelope: bad error object: {e}"))),
        // Tolerate `"error": null` alongside a result.
        (Some(result), Some(Value::Null)) => Ok(Ok(result)),
        (Some(_), Some(_)) => Err(AppError::Acp(
            "invalid envelope: response carries both result and error".into(),
        )),
        (None, None) => Err(AppError::Acp(
            "invalid envelope: response carries neither result nor error".into(),
        )),
    }
}

fn insert_params(obj: &mut Value, params: &Value) {
    if params.is_null() {
        return;
    }
    if let Value::Object(map) = obj {
        map.insert("params".to_owned(), params.clone());
    }
}
