//! Typed ACP method parameters and results.
//!
//! Field names follow the ACP wire format (camelCase). Only the subset of
//! the protocol this client speaks is modelled; unknown fields on inbound
//! objects are ignored unless noted.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// ACP protocol version this client implements.
pub const PROTOCOL_VERSION: u16 = 1;

/// Method names.
pub mod methods {
    /// Capability negotiation (client → agent).
    pub const INITIALIZE: &str = "initialize";
    /// Optional authentication (client → agent).
    pub const AUTHENTICATE: &str = "authenticate";
    /// Create a session (client → agent).
    pub const SESSION_NEW: &str = "session/new";
    /// Resume a session (client → agent).
    pub const SESSION_LOAD: &str = "session/load";
    /// Send a user prompt (client → agent).
    pub const SESSION_PROMPT: &str = "session/prompt";
    /// Cancel the running turn (client → agent notification).
    pub const SESSION_CANCEL: &str = "session/cancel";
    /// Switch the session mode (client → agent).
    pub const SESSION_SET_MODE: &str = "session/set_mode";
    /// Switch the session model (client → agent).
    pub const SESSION_SET_MODEL: &str = "session/set_model";
    /// Streamed session update (agent → client notification).
    pub const SESSION_UPDATE: &str = "session/update";
    /// Tool-call permission ask (agent → client).
    pub const SESSION_REQUEST_PERMISSION: &str = "session/request_permission";
    /// Read a text file on behalf of the agent (agent → client).
    pub const FS_READ_TEXT_FILE: &str = "fs/read_text_file";
    /// Write a text file on behalf of the agent (agent → client).
    pub const FS_WRITE_TEXT_FILE: &str = "fs/write_text_file";
}

// ── Handshake ─────────────────────────────────────────────────────────────────

/// Name and version of a protocol participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
    /// Programmatic name.
    pub name: String,
    /// Version string.
    #[serde(default)]
    pub version: String,
    /// Optional display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// File-system capabilities the client offers to the agent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemCapability {
    /// Client answers `fs/read_text_file`.
    #[serde(default)]
    pub read_text_file: bool,
    /// Client answers `fs/write_text_file`.
    #[serde(default)]
    pub write_text_file: bool,
}

/// Capabilities advertised by the client during `initialize`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    /// File-system access.
    #[serde(default)]
    pub fs: FileSystemCapability,
    /// Client implements the terminal methods.
    #[serde(default)]
    pub terminal: bool,
}

/// `initialize` parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    /// Latest protocol version the client supports.
    pub protocol_version: u16,
    /// Client capabilities.
    pub client_capabilities: ClientCapabilities,
    /// Client identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<Implementation>,
}

/// Prompt content types the agent accepts beyond plain text.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptCapabilities {
    /// Image blocks.
    #[serde(default)]
    pub image: bool,
    /// Audio blocks.
    #[serde(default)]
    pub audio: bool,
    /// Embedded resource blocks.
    #[serde(default)]
    pub embedded_context: bool,
}

/// MCP transports the agent can connect to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct McpCapabilities {
    /// Streamable HTTP servers.
    #[serde(default)]
    pub http: bool,
    /// SSE servers.
    #[serde(default)]
    pub sse: bool,
}

/// Capabilities advertised by the agent in the `initialize` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// Agent supports `session/load`.
    #[serde(default)]
    pub load_session: bool,
    /// Accepted prompt content.
    #[serde(default)]
    pub prompt_capabilities: PromptCapabilities,
    /// Supported MCP transports.
    #[serde(default)]
    pub mcp_capabilities: McpCapabilities,
    /// Unmodelled capability fields, kept verbatim.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// An authentication method the agent offers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthMethod {
    /// Identifier passed back in `authenticate`.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `initialize` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    /// Protocol version the agent selected.
    pub protocol_version: u16,
    /// Agent capabilities.
    #[serde(default)]
    pub agent_capabilities: AgentCapabilities,
    /// Authentication methods, empty when none are needed.
    #[serde(default)]
    pub auth_methods: Vec<AuthMethod>,
    /// Agent identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_info: Option<Implementation>,
}

/// `authenticate` parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest {
    /// One of the advertised [`AuthMethod::id`] values.
    pub method_id: String,
}

// ── MCP server configuration ──────────────────────────────────────────────────

/// Name/value pair for environment variables and HTTP headers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NameValue {
    /// Variable or header name.
    pub name: String,
    /// Value.
    pub value: String,
}

/// MCP server the agent should connect to, forwarded into `session/new`.
///
/// The known transports are a closed set; anything else is carried as an
/// opaque JSON object so hosts can pass agent-specific shapes through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum McpServer {
    /// A `stdio`, `http`, or `sse` server.
    Known(KnownMcpServer),
    /// Unrecognised shape, forwarded verbatim.
    Opaque(Map<String, Value>),
}

/// MCP server transports the client understands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum KnownMcpServer {
    /// Launched by the agent as a subprocess.
    Stdio {
        /// Server name.
        name: String,
        /// Executable.
        command: String,
        /// Arguments.
        #[serde(default)]
        args: Vec<String>,
        /// Environment variables.
        #[serde(default)]
        env: Vec<NameValue>,
    },
    /// Streamable HTTP endpoint.
    Http {
        /// Server name.
        name: String,
        /// Endpoint URL.
        url: String,
        /// Extra request headers.
        #[serde(default)]
        headers: Vec<NameValue>,
    },
    /// Server-sent events endpoint.
    Sse {
        /// Server name.
        name: String,
        /// Endpoint URL.
        url: String,
        /// Extra request headers.
        #[serde(default)]
        headers: Vec<NameValue>,
    },
}

impl McpServer {
    /// Server name, when the shape carries one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Known(
                KnownMcpServer::Stdio { name, .. }
                | KnownMcpServer::Http { name, .. }
                | KnownMcpServer::Sse { name, .. },
            ) => Some(name),
            Self::Opaque(map) => map.get("name").and_then(Value::as_str),
        }
    }
}

// ── Sessions ──────────────────────────────────────────────────────────────────

/// `session/new` parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionRequest {
    /// Absolute working directory.
    pub cwd: PathBuf,
    /// MCP servers to attach.
    pub mcp_servers: Vec<McpServer>,
}

/// A selectable session mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionMode {
    /// Mode identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Modes offered by the agent and the one in effect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionModeState {
    /// Active mode.
    pub current_mode_id: String,
    /// All modes.
    #[serde(default)]
    pub available_modes: Vec<SessionMode>,
}

/// A selectable model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Model identifier.
    pub model_id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Models offered by the agent and the one in effect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionModelState {
    /// Active model.
    pub current_model_id: String,
    /// All models.
    #[serde(default)]
    pub available_models: Vec<ModelInfo>,
}

/// `session/new` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionResponse {
    /// Identifier used by every later session call.
    pub session_id: String,
    /// Mode state, when the agent supports modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modes: Option<SessionModeState>,
    /// Model state, when the agent supports model selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<SessionModelState>,
}

/// `session/load` parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadSessionRequest {
    /// Session to resume.
    pub session_id: String,
    /// Absolute working directory.
    pub cwd: PathBuf,
    /// MCP servers to attach.
    pub mcp_servers: Vec<McpServer>,
}

/// `session/load` result (agents may also answer `null`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadSessionResponse {
    /// Mode state, when the agent supports modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modes: Option<SessionModeState>,
    /// Model state, when the agent supports model selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<SessionModelState>,
}

/// `session/set_mode` parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetSessionModeRequest {
    /// Target session.
    pub session_id: String,
    /// Mode to activate.
    pub mode_id: String,
}

/// `session/set_model` parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetSessionModelRequest {
    /// Target session.
    pub session_id: String,
    /// Model to activate.
    pub model_id: String,
}

/// `session/cancel` notification parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CancelNotification {
    /// Session whose turn should stop.
    pub session_id: String,
}

// ── Prompting ─────────────────────────────────────────────────────────────────

/// A unit of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// Base64 image.
    Image {
        /// Base64 payload.
        data: String,
        /// MIME type.
        mime_type: String,
    },
    /// Base64 audio.
    Audio {
        /// Base64 payload.
        data: String,
        /// MIME type.
        mime_type: String,
    },
    /// Link to a resource the agent can fetch.
    ResourceLink {
        /// Resource URI.
        uri: String,
        /// Display name.
        name: String,
    },
    /// Embedded resource contents, kept verbatim.
    Resource {
        /// Resource payload.
        resource: Value,
    },
}

impl ContentBlock {
    /// Build a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Text carried by this block, if it is textual.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// `session/prompt` parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    /// Target session.
    pub session_id: String,
    /// User message content.
    pub prompt: Vec<ContentBlock>,
}

/// Why the agent ended a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Normal completion.
    EndTurn,
    /// Token limit reached.
    MaxTokens,
    /// Model request limit for the turn reached.
    MaxTurnRequests,
    /// The agent refused to continue.
    Refusal,
    /// The client cancelled the turn.
    Cancelled,
}

impl StopReason {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EndTurn => "end_turn",
            Self::MaxTokens => "max_tokens",
            Self::MaxTurnRequests => "max_turn_requests",
            Self::Refusal => "refusal",
            Self::Cancelled => "cancelled",
        }
    }
}

/// `session/prompt` result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptResponse {
    /// Turn end cause.
    pub stop_reason: StopReason,
}

// ── Session updates ───────────────────────────────────────────────────────────

/// `session/update` notification parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionNotification {
    /// Session the update belongs to.
    pub session_id: String,
    /// The update.
    pub update: SessionUpdate,
}

/// Known `session/update` variants, discriminated by `sessionUpdate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "sessionUpdate",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum SessionUpdate {
    /// Chunk of a user message (replayed during `session/load`).
    UserMessageChunk {
        /// Chunk content.
        content: ContentBlock,
    },
    /// Chunk of the agent's reply.
    AgentMessageChunk {
        /// Chunk content.
        content: ContentBlock,
    },
    /// Chunk of the agent's reasoning.
    AgentThoughtChunk {
        /// Chunk content.
        content: ContentBlock,
    },
    /// A new tool call.
    ToolCall(ToolCallUpdate),
    /// Progress on an existing tool call.
    ToolCallUpdate(ToolCallUpdate),
    /// The agent's execution plan, replacing any previous plan.
    Plan {
        /// All plan entries.
        entries: Vec<PlanEntry>,
    },
    /// Slash commands the agent accepts; forwarded uninterpreted.
    AvailableCommandsUpdate {
        /// Command descriptors.
        available_commands: Vec<Value>,
    },
    /// The agent switched modes.
    CurrentModeUpdate {
        /// Mode now in effect.
        current_mode_id: String,
    },
}

impl SessionUpdate {
    /// Every `sessionUpdate` tag this client understands.
    pub const KNOWN_TAGS: &'static [&'static str] = &[
        "user_message_chunk",
        "agent_message_chunk",
        "agent_thought_chunk",
        "tool_call",
        "tool_call_update",
        "plan",
        "available_commands_update",
        "current_mode_update",
    ];
}

/// Category of tool being invoked.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Reading files or data.
    Read,
    /// Modifying files.
    Edit,
    /// Removing files.
    Delete,
    /// Moving or renaming files.
    Move,
    /// Searching.
    Search,
    /// Running commands.
    Execute,
    /// Internal reasoning.
    Think,
    /// Retrieving external data.
    Fetch,
    /// Switching session mode.
    SwitchMode,
    /// Anything else, including kinds this client does not know.
    #[default]
    #[serde(other)]
    Other,
}

/// Tool-call execution status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    /// Not started (awaiting input or approval).
    #[default]
    Pending,
    /// Running.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error or was rejected.
    Failed,
}

/// Content produced by a tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ToolCallContent {
    /// Regular content.
    Content {
        /// The content block.
        content: ContentBlock,
    },
    /// A file modification.
    Diff {
        /// File path.
        path: PathBuf,
        /// Original text; absent for new files.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_text: Option<String>,
        /// Replacement text.
        new_text: String,
    },
    /// Embedded terminal output.
    Terminal {
        /// Terminal identifier.
        terminal_id: String,
    },
}

/// A file location touched by a tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallLocation {
    /// File path.
    pub path: PathBuf,
    /// Optional line number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Fields of a `tool_call` / `tool_call_update`; everything but the id is
/// optional so updates can carry only what changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallUpdate {
    /// Correlation key.
    pub tool_call_id: String,
    /// Human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Tool category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ToolKind>,
    /// Execution status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolCallStatus>,
    /// Content blocks to append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ToolCallContent>>,
    /// Affected locations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<ToolCallLocation>>,
    /// Raw tool input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<Value>,
    /// Raw tool output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<Value>,
}

/// Plan entry priority.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntryPriority {
    /// High.
    High,
    /// Medium.
    #[default]
    Medium,
    /// Low.
    Low,
}

/// Plan entry progress.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntryStatus {
    /// Not started.
    #[default]
    Pending,
    /// Underway.
    InProgress,
    /// Done.
    Completed,
}

/// One step of the agent's plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    /// Description of the step.
    pub content: String,
    /// Relative importance.
    #[serde(default)]
    pub priority: PlanEntryPriority,
    /// Progress.
    #[serde(default)]
    pub status: PlanEntryStatus,
}

// ── Permissions ───────────────────────────────────────────────────────────────

/// Semantic hint for a permission option.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOptionKind {
    /// Allow this one time.
    AllowOnce,
    /// Allow from now on.
    AllowAlways,
    /// Reject this one time.
    RejectOnce,
    /// Reject from now on.
    RejectAlways,
}

impl PermissionOptionKind {
    /// Whether choosing this option lets the tool run.
    #[must_use]
    pub fn is_allow(self) -> bool {
        matches!(self, Self::AllowOnce | Self::AllowAlways)
    }
}

/// A choice offered to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOption {
    /// Identifier returned in [`PermissionOutcome::Selected`].
    pub option_id: String,
    /// Display label.
    pub name: String,
    /// Semantic hint.
    pub kind: PermissionOptionKind,
}

/// `session/request_permission` parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestPermissionRequest {
    /// Session the tool call belongs to.
    pub session_id: String,
    /// The tool call awaiting approval.
    pub tool_call: ToolCallUpdate,
    /// Choices to present.
    pub options: Vec<PermissionOption>,
}

/// The user's decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PermissionOutcome {
    /// The turn was cancelled before a choice was made.
    Cancelled,
    /// An option was chosen.
    Selected {
        /// The chosen [`PermissionOption::option_id`].
        option_id: String,
    },
}

impl PermissionOutcome {
    /// Shorthand for `Selected`.
    #[must_use]
    pub fn selected(option_id: impl Into<String>) -> Self {
        Self::Selected {
            option_id: option_id.into(),
        }
    }
}

/// `session/request_permission` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RequestPermissionResponse {
    /// The decision.
    pub outcome: PermissionOutcome,
}

// ── File system ───────────────────────────────────────────────────────────────

/// `fs/read_text_file` parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadTextFileRequest {
    /// Requesting session.
    pub session_id: String,
    /// Absolute path.
    pub path: PathBuf,
    /// First line to return (1-based).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Maximum number of lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// `fs/read_text_file` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadTextFileResponse {
    /// File contents.
    pub content: String,
}

/// `fs/write_text_file` parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WriteTextFileRequest {
    /// Requesting session.
    pub session_id: String,
    /// Absolute path.
    pub path: PathBuf,
    /// New contents.
    pub content: String,
}
