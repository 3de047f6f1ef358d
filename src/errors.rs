//! Error types shared across the client.

use std::fmt::{Display, Formatter};

use serde_json::Value;

use crate::error_kind::{classify, ClassifiedError, ErrorKind};

/// Shared client result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Client error enumeration covering all failure modes.
///
/// Cloneable so a single teardown error can settle every pending request.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// ACP framing or protocol violation (malformed message, bad envelope).
    Acp(String),
    /// The agent executable could not be launched.
    Spawn(String),
    /// A request did not settle within its timeout window.
    Timeout(String),
    /// The agent process or its stdio streams went away.
    ConnectionClosed(String),
    /// JSON-RPC error object returned by the peer.
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<Value>,
    },
    /// Operation not permitted in the current connection or session state.
    InvalidState(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// File system path failed validation against the workspace root.
    PathViolation(String),
}

impl AppError {
    /// Classify this error into the shared taxonomy.
    ///
    /// Environmental variants map directly to their kind; the rest are
    /// matched against the message heuristics in [`crate::error_kind`].
    #[must_use]
    pub fn classify(&self, backend: Option<&str>) -> ClassifiedError {
        let message = self.to_string();
        let kind = match self {
            Self::Spawn(_) => ErrorKind::SpawnFailed,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::ConnectionClosed(_) => ErrorKind::ConnectionClosed,
            Self::Acp(_) => ErrorKind::ProtocolError,
            Self::Rpc { code, .. } if is_protocol_code(*code) => ErrorKind::ProtocolError,
            _ => return classify(&message, backend),
        };
        ClassifiedError::new(kind, message)
    }

    /// Shorthand for [`classify`](Self::classify)`(backend).kind`.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.classify(None).kind
    }
}

/// Standard JSON-RPC codes that indicate a malformed exchange rather than a
/// domain failure reported by the agent.
fn is_protocol_code(code: i64) -> bool {
    matches!(code, -32700 | -32600 | -32601 | -32602)
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Acp(msg) => write!(f, "acp: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::ConnectionClosed(msg) => write!(f, "connection closed: {msg}"),
            Self::Rpc { code, message, .. } => write!(f, "rpc error {code}: {message}"),
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::PathViolation(msg) => write!(f, "path violation: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Acp(format!("json: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
