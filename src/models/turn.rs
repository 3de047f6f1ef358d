//! Conversation turns.
//!
//! A [`Turn`] is opened when a prompt is sent and closed when the agent
//! reports a stop reason, the prompt fails, or (during history replay) the
//! next user message begins. Mutators are no-ops on a closed turn and
//! report that by returning `false`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::acp::schema::{PlanEntry, StopReason, ToolCallUpdate};
use crate::error_kind::ClassifiedError;
use crate::models::tool_call::ToolCall;

/// One message within a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TurnMessage {
    /// Unique message identifier.
    pub id: String,
    /// Text accumulated so far.
    pub content: String,
    /// `true` while chunks may still arrive.
    pub is_streaming: bool,
}

impl TurnMessage {
    fn new(content: String, is_streaming: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            is_streaming,
        }
    }
}

/// One prompt → completion cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    /// Unique turn identifier.
    pub id: String,
    /// What the user sent.
    pub user_message: TurnMessage,
    /// The agent's reply; absent until the first chunk, or when the turn failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_message: Option<TurnMessage>,
    /// Tool calls in the order they were first reported.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Reasoning chunks in arrival order.
    #[serde(default)]
    pub thoughts: Vec<String>,
    /// Latest plan reported during this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<PlanEntry>>,
    /// When the prompt was sent.
    pub start_time: DateTime<Utc>,
    /// When the turn closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Why the agent ended the turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    /// Failure that ended the turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ClassifiedError>,
}

impl Turn {
    /// Open a turn for `user_text`.
    #[must_use]
    pub fn open(user_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_message: TurnMessage::new(user_text.into(), false),
            assistant_message: None,
            tool_calls: Vec::new(),
            thoughts: Vec::new(),
            plan: None,
            start_time: Utc::now(),
            end_time: None,
            stop_reason: None,
            error: None,
        }
    }

    /// Whether the turn still accepts updates.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Whether anything beyond the user message has been recorded.
    #[must_use]
    pub fn has_agent_output(&self) -> bool {
        self.assistant_message.is_some()
            || !self.tool_calls.is_empty()
            || !self.thoughts.is_empty()
            || self.plan.is_some()
    }

    /// Append replayed user text (history replay delivers it in chunks).
    pub fn append_user(&mut self, text: &str) -> bool {
        if !self.is_open() {
            return false;
        }
        self.user_message.content.push_str(text);
        true
    }

    /// Append a chunk of the agent's reply, creating the message if needed.
    pub fn append_assistant(&mut self, text: &str) -> bool {
        if !self.is_open() {
            return false;
        }
        self.assistant_message
            .get_or_insert_with(|| TurnMessage::new(String::new(), true))
            .content
            .push_str(text);
        true
    }

    /// Append a chunk of reasoning.
    pub fn append_thought(&mut self, text: &str) -> bool {
        if !self.is_open() {
            return false;
        }
        self.thoughts.push(text.to_owned());
        true
    }

    /// The reasoning chunks joined into one text.
    #[must_use]
    pub fn thought_text(&self) -> String {
        self.thoughts.concat()
    }

    /// Create or merge a tool call by id.
    pub fn upsert_tool_call(&mut self, update: ToolCallUpdate) -> bool {
        if !self.is_open() {
            return false;
        }
        match self
            .tool_calls
            .iter_mut()
            .find(|c| c.tool_call_id == update.tool_call_id)
        {
            Some(call) => call.apply(update),
            None => self.tool_calls.push(ToolCall::from_update(update)),
        }
        true
    }

    /// Replace the plan wholesale.
    pub fn replace_plan(&mut self, entries: Vec<PlanEntry>) -> bool {
        if !self.is_open() {
            return false;
        }
        self.plan = Some(entries);
        true
    }

    /// Look up a tool call by id.
    #[must_use]
    pub fn tool_call(&self, tool_call_id: &str) -> Option<&ToolCall> {
        self.tool_calls
            .iter()
            .find(|c| c.tool_call_id == tool_call_id)
    }

    /// Close the turn normally.
    pub fn close(&mut self, stop_reason: Option<StopReason>) -> bool {
        if !self.is_open() {
            return false;
        }
        if let Some(message) = self.assistant_message.as_mut() {
            message.is_streaming = false;
        }
        self.stop_reason = stop_reason;
        self.end_time = Some(Utc::now());
        true
    }

    /// Close the turn because its prompt failed. Any partial reply is
    /// discarded.
    pub fn fail(&mut self, error: ClassifiedError) -> bool {
        if !self.is_open() {
            return false;
        }
        self.assistant_message = None;
        self.error = Some(error);
        self.end_time = Some(Utc::now());
        true
    }
}
