//! ACP initialization handshake.
//!
//! Before any session can be opened the client performs:
//!
//! 1. **`initialize`**: advertises the protocol version, the client's
//!    file-system/terminal capabilities and its identity; the agent answers
//!    with its own capabilities and the authentication methods it supports.
//! 2. **`authenticate`** (optional), only when a method id is configured.
//!    The id must be one the agent advertised; anything else is rejected
//!    locally.
//!
//! The request/response exchange itself runs through the connection's
//! registry; this module builds the payloads and checks the results.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::acp::schema::{
    AuthMethod, AuthenticateRequest, ClientCapabilities, Implementation, InitializeRequest,
    InitializeResponse, PROTOCOL_VERSION,
};
use crate::{AppError, Result};

/// Name this client reports in `clientInfo`.
pub const CLIENT_NAME: &str = "acp-client";

/// Build the `initialize` parameters for `capabilities`.
#[must_use]
pub fn initialize_request(capabilities: ClientCapabilities) -> InitializeRequest {
    InitializeRequest {
        protocol_version: PROTOCOL_VERSION,
        client_capabilities: capabilities,
        client_info: Some(Implementation {
            name: CLIENT_NAME.to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            title: None,
        }),
    }
}

/// Decode and sanity-check the agent's `initialize` result.
///
/// A protocol version other than ours is logged but accepted; agents are
/// expected to answer with the closest version they support.
///
/// # Errors
///
/// Returns [`AppError::Acp`] if the result does not match the
/// `initialize` response shape.
pub fn parse_initialize_response(result: Value) -> Result<InitializeResponse> {
    let response: InitializeResponse = serde_json::from_value(result)
        .map_err(|e| AppError::Acp(format!("invalid initialize response: {e}")))?;

    if response.protocol_version != PROTOCOL_VERSION {
        warn!(
            ours = PROTOCOL_VERSION,
            theirs = response.protocol_version,
            "agent negotiated a different protocol version"
        );
    }

    info!(
        agent = response.agent_info.as_ref().map(|i| i.name.as_str()),
        load_session = response.agent_capabilities.load_session,
        auth_methods = response.auth_methods.len(),
        "handshake: initialize complete"
    );
    Ok(response)
}

/// Decide whether (and how) to call `authenticate`.
///
/// Returns `Ok(None)` when no method is configured.
///
/// # Errors
///
/// Returns [`AppError::Config`] when `configured` names a method the agent
/// did not advertise.
pub fn authenticate_request(
    configured: Option<&str>,
    advertised: &[AuthMethod],
) -> Result<Option<AuthenticateRequest>> {
    let Some(method_id) = configured else {
        debug!("handshake: no auth method configured, skipping authenticate");
        return Ok(None);
    };

    if advertised.iter().any(|m| m.id == method_id) {
        return Ok(Some(AuthenticateRequest {
            method_id: method_id.to_owned(),
        }));
    }

    let available: Vec<&str> = advertised.iter().map(|m| m.id.as_str()).collect();
    Err(AppError::Config(format!(
        "auth method '{method_id}' is not offered by the agent (available: {})",
        if available.is_empty() {
            "none".to_owned()
        } else {
            available.join(", ")
        }
    )))
}
