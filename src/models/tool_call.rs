//! Tool-call tracking.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::acp::schema::{
    ToolCallContent, ToolCallLocation, ToolCallStatus, ToolCallUpdate, ToolKind,
};

/// Accumulated state of one agent tool call, keyed by `tool_call_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Correlation key.
    pub tool_call_id: String,
    /// Human-readable title.
    pub title: String,
    /// Tool category.
    pub kind: ToolKind,
    /// Latest status.
    pub status: ToolCallStatus,
    /// Raw tool input, as reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<Value>,
    /// Raw tool output, as reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<Value>,
    /// All content produced so far, in arrival order.
    #[serde(default)]
    pub content: Vec<ToolCallContent>,
    /// Affected locations (latest report wins).
    #[serde(default)]
    pub locations: Vec<ToolCallLocation>,
}

impl ToolCall {
    /// Start tracking a tool call from its first report.
    #[must_use]
    pub fn from_update(update: ToolCallUpdate) -> Self {
        let mut call = Self {
            tool_call_id: update.tool_call_id.clone(),
            title: String::new(),
            kind: ToolKind::default(),
            status: ToolCallStatus::default(),
            raw_input: None,
            raw_output: None,
            content: Vec::new(),
            locations: Vec::new(),
        };
        call.apply(update);
        call
    }

    /// Merge a later report into this call.
    ///
    /// Scalar fields present in `update` replace the current values;
    /// content is appended.
    pub fn apply(&mut self, update: ToolCallUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(kind) = update.kind {
            self.kind = kind;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(content) = update.content {
            self.content.extend(content);
        }
        if let Some(locations) = update.locations {
            self.locations = locations;
        }
        if update.raw_input.is_some() {
            self.raw_input = update.raw_input;
        }
        if update.raw_output.is_some() {
            self.raw_output = update.raw_output;
        }
    }

    /// Whether the call has reached a terminal status.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            ToolCallStatus::Completed | ToolCallStatus::Failed
        )
    }
}
