//! Session model and turn-state helpers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::acp::schema::{AgentCapabilities, SessionModeState, SessionModelState};

/// Turn-processing status of the active session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Ready for the next prompt.
    #[default]
    Idle,
    /// A prompt is in flight.
    Processing,
    /// Cancel requested; waiting for the agent to acknowledge.
    Cancelled,
}

impl SessionStatus {
    /// Determine whether a status transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Processing)
                | (Self::Processing, Self::Idle | Self::Cancelled)
                | (Self::Cancelled, Self::Idle)
        )
    }
}

/// The conversation context opened by `session/new` or `session/load`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Agent-assigned identifier.
    pub session_id: String,
    /// Directory the agent operates in.
    pub working_dir: PathBuf,
    /// What the agent said it can do during `initialize`.
    pub capabilities: AgentCapabilities,
    /// Mode currently in effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_mode_id: Option<String>,
    /// Model currently in effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_model_id: Option<String>,
    /// Modes the agent offers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modes: Option<SessionModeState>,
    /// Models the agent offers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<SessionModelState>,
}

impl Session {
    /// Build a session from the agent's answer to `session/new` or `session/load`.
    #[must_use]
    pub fn new(
        session_id: String,
        working_dir: PathBuf,
        capabilities: AgentCapabilities,
        modes: Option<SessionModeState>,
        models: Option<SessionModelState>,
    ) -> Self {
        Self {
            session_id,
            working_dir,
            capabilities,
            current_mode_id: modes.as_ref().map(|m| m.current_mode_id.clone()),
            current_model_id: models.as_ref().map(|m| m.current_model_id.clone()),
            modes,
            models,
        }
    }

    /// Record a mode switch.
    pub fn set_mode(&mut self, mode_id: &str) {
        self.current_mode_id = Some(mode_id.to_owned());
        if let Some(modes) = self.modes.as_mut() {
            modes.current_mode_id = mode_id.to_owned();
        }
    }

    /// Record a model switch.
    pub fn set_model(&mut self, model_id: &str) {
        self.current_model_id = Some(model_id.to_owned());
        if let Some(models) = self.models.as_mut() {
            models.current_model_id = model_id.to_owned();
        }
    }
}
