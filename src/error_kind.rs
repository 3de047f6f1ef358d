//! Failure classification shared by the connection and session layers.
//!
//! [`classify`] maps a raw failure message to an [`ErrorKind`] with a
//! retryability flag. Matching is by ordered substring rules over the
//! lowercased message; the first rule that matches wins. Backend-specific
//! phrases are consulted only when a backend identifier is supplied.
//!
//! The core never retries on its own. Hosts use the `retryable` flag to
//! decide between offering a retry and surfacing the failure.

use serde::{Deserialize, Serialize};

/// Failure taxonomy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A request did not complete within its deadline.
    Timeout,
    /// Transient network failure, rate limiting, or backend overload.
    NetworkError,
    /// Credentials missing, rejected, or expired.
    AuthenticationFailed,
    /// The session existed but is no longer usable.
    SessionExpired,
    /// The referenced session is unknown to the agent.
    SessionNotFound,
    /// The operation was refused by policy.
    PermissionDenied,
    /// The agent executable could not be launched.
    SpawnFailed,
    /// The agent process or its streams went away.
    ConnectionClosed,
    /// Malformed message or unknown method.
    ProtocolError,
    /// Anything not matched by a rule.
    Unknown,
}

impl ErrorKind {
    /// Whether an operation failing with this kind may succeed if repeated.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::NetworkError | Self::ConnectionClosed
        )
    }

    /// Short human-readable category label for UI display.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Timeout => "Request timed out",
            Self::NetworkError => "Network error",
            Self::AuthenticationFailed => "Authentication failed",
            Self::SessionExpired => "Session expired",
            Self::SessionNotFound => "Session not found",
            Self::PermissionDenied => "Permission denied",
            Self::SpawnFailed => "Agent failed to start",
            Self::ConnectionClosed => "Connection closed",
            Self::ProtocolError => "Protocol error",
            Self::Unknown => "Unexpected error",
        }
    }
}

/// A classified failure: kind, retryability, and the raw diagnostic text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    /// Taxonomy bucket.
    pub kind: ErrorKind,
    /// Whether the failed operation may be retried by the caller.
    pub retryable: bool,
    /// Raw, unmodified failure message.
    pub message: String,
}

impl ClassifiedError {
    /// Build a classified error, deriving `retryable` from `kind`.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            retryable: kind.is_retryable(),
            message: message.into(),
        }
    }
}

/// Ordered generic rules. Earlier entries win.
const RULES: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::Timeout,
        &["timed out", "timeout", "deadline exceeded"],
    ),
    (
        ErrorKind::AuthenticationFailed,
        &[
            "authentication",
            "unauthorized",
            "unauthenticated",
            "invalid api key",
            "api key",
            "not logged in",
            "login required",
            "auth required",
            "credentials",
        ],
    ),
    (
        ErrorKind::SessionExpired,
        &["session expired", "session has expired", "expired session"],
    ),
    (
        ErrorKind::SessionNotFound,
        &["session not found", "unknown session", "no such session", "invalid session"],
    ),
    (
        ErrorKind::PermissionDenied,
        &["permission denied", "forbidden", "access denied", "not permitted", "eacces"],
    ),
    (
        ErrorKind::SpawnFailed,
        &[
            "enoent",
            "failed to spawn",
            "spawn",
            "command not found",
            "no such file or directory",
            "failed to start",
        ],
    ),
    (
        ErrorKind::ConnectionClosed,
        &[
            "connection closed",
            "stream closed",
            "broken pipe",
            "epipe",
            "process exited",
            "disconnected",
        ],
    ),
    (
        ErrorKind::NetworkError,
        &[
            "econnrefused",
            "econnreset",
            "enotfound",
            "socket hang up",
            "network",
            "connection refused",
            "connection reset",
            "dns",
        ],
    ),
    (
        ErrorKind::ProtocolError,
        &[
            "parse error",
            "invalid request",
            "method not found",
            "invalid params",
            "malformed",
            "invalid json",
        ],
    ),
];

/// Backend-specific rules, consulted before the generic ones when the
/// backend identifier matches.
const BACKEND_RULES: &[(&str, ErrorKind, &[&str])] = &[
    (
        "claude",
        ErrorKind::NetworkError,
        &["rate limit", "rate_limit", "overloaded", "529", "429"],
    ),
    (
        "claude",
        ErrorKind::AuthenticationFailed,
        &["please run /login", "oauth token"],
    ),
    (
        "gemini",
        ErrorKind::NetworkError,
        &["quota exceeded", "resource_exhausted", "resource exhausted", "429"],
    ),
    (
        "gemini",
        ErrorKind::AuthenticationFailed,
        &["gemini_api_key", "google_api_key"],
    ),
    (
        "codex",
        ErrorKind::NetworkError,
        &["rate_limit_exceeded", "rate limit", "429"],
    ),
    (
        "codex",
        ErrorKind::AuthenticationFailed,
        &["openai_api_key", "codex login"],
    ),
];

/// Classify a raw failure message.
///
/// `backend` is an optional agent identifier (`claude`, `gemini`, `codex`,
/// …); unrecognised identifiers fall through to the generic rules.
#[must_use]
pub fn classify(message: &str, backend: Option<&str>) -> ClassifiedError {
    let lower = message.to_lowercase();

    if let Some(backend) = backend.map(str::to_lowercase) {
        let hit = BACKEND_RULES
            .iter()
            .filter(|(name, _, _)| backend.contains(name))
            .find(|(_, _, needles)| needles.iter().any(|n| lower.contains(n)));
        if let Some((_, kind, _)) = hit {
            return ClassifiedError::new(*kind, message);
        }
    }

    let kind = RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map_or(ErrorKind::Unknown, |(kind, _)| *kind);

    ClassifiedError::new(kind, message)
}
