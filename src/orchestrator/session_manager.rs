//! Session state machine on top of a [`Connection`].
//!
//! The [`SessionManager`] owns one active session and its turn history.
//! It issues prompts, tracks the `idle → processing → idle` (or
//! `processing → cancelled → idle`) cycle, folds `session/update`
//! notifications into the open turn, and reports everything through a
//! [`SessionEvents`] implementation supplied by the host.
//!
//! Host callbacks are never invoked while internal state is locked, so a
//! callback may call back into the manager (for example to render the
//! transcript).

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::acp::connection::{Connection, ConnectionOptions};
use crate::acp::handler::{ClientHandler, HandlerFuture};
use crate::acp::message::RpcError;
use crate::acp::schema::{
    methods, AgentCapabilities, ContentBlock, FileSystemCapability, McpServer, PermissionOutcome,
    PlanEntry, ReadTextFileRequest, RequestPermissionRequest, SessionNotification, SessionUpdate,
    StopReason, WriteTextFileRequest,
};
use crate::acp::spawner::SpawnConfig;
use crate::error_kind::ClassifiedError;
use crate::models::{Session, SessionStatus, ToolCall, Turn};
use crate::orchestrator::stream_buffer::{StreamFlush, StreamingBuffer, StreamingConfig};
use crate::orchestrator::transcript;
use crate::{AppError, Result};

// ── Collaborator contracts ───────────────────────────────────────────────────

/// Decides tool-call permission requests.
pub trait PermissionHandler: Send + Sync {
    /// Choose one of `request.options`, or return
    /// [`PermissionOutcome::Cancelled`].
    fn decide(&self, request: RequestPermissionRequest) -> HandlerFuture<'_, PermissionOutcome>;
}

/// Serves the agent's file-system requests.
pub trait FileSystemHandler: Send + Sync {
    /// Return the requested file content.
    fn read_text_file(&self, request: ReadTextFileRequest) -> HandlerFuture<'_, Result<String>>;

    /// Write `request.content` to `request.path`.
    fn write_text_file(&self, request: WriteTextFileRequest) -> HandlerFuture<'_, Result<()>>;
}

/// Which stream of a turn a flush belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// The agent's reply.
    Assistant,
    /// The agent's reasoning.
    Thought,
}

/// Key of one streamed message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    /// Turn the stream belongs to.
    pub turn_id: String,
    /// Reply or reasoning.
    pub kind: StreamKind,
}

impl StreamKey {
    fn new(turn_id: &str, kind: StreamKind) -> Self {
        Self {
            turn_id: turn_id.to_owned(),
            kind,
        }
    }
}

/// Host-facing event surface. Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait SessionEvents: Send + Sync {
    /// The turn status changed.
    fn on_status(&self, status: SessionStatus) {}
    /// Coalesced streamed text.
    fn on_stream(&self, flush: &StreamFlush<StreamKey>) {}
    /// A tool call was created or updated.
    fn on_tool_call(&self, turn_id: &str, call: &ToolCall) {}
    /// The plan was replaced.
    fn on_plan(&self, turn_id: &str, entries: &[PlanEntry]) {}
    /// The agent's slash commands, uninterpreted.
    fn on_available_commands(&self, commands: &[Value]) {}
    /// The session mode changed.
    fn on_mode_changed(&self, mode_id: &str) {}
    /// A turn closed with a stop reason.
    fn on_turn_complete(&self, turn: &Turn) {}
    /// A turn-related or connection-level failure.
    fn on_error(&self, error: &ClassifiedError) {}
    /// The agent went away unexpectedly.
    fn on_disconnected(&self, reason: &str) {}
    /// Non-JSON output the agent printed on stdout.
    fn on_diagnostic(&self, line: &str) {}
}

/// Events sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEvents;

impl SessionEvents for NoopEvents {}

// ── Options ──────────────────────────────────────────────────────────────────

/// Settings for a [`SessionManager`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Connection settings.
    pub connection: ConnectionOptions,
    /// Stream coalescing thresholds.
    pub streaming: StreamingConfig,
    /// How long `cancel` waits for the agent to end the turn.
    pub cancel_grace: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connection: ConnectionOptions::default(),
            streaming: StreamingConfig::default(),
            cancel_grace: Duration::from_secs(5),
        }
    }
}

// ── Core state ───────────────────────────────────────────────────────────────

struct State {
    session: Option<Session>,
    /// Session id accepted for updates while `session/load` is replaying.
    loading: Option<String>,
    turns: Vec<Turn>,
    turn_cancel: CancellationToken,
}

impl State {
    fn open_turn(&mut self) -> Option<&mut Turn> {
        self.turns.last_mut().filter(|t| t.is_open())
    }

    fn accepts(&self, session_id: &str) -> bool {
        self.loading.as_deref() == Some(session_id)
            || self
                .session
                .as_ref()
                .is_some_and(|s| s.session_id == session_id)
    }
}

struct Core {
    state: Mutex<State>,
    status: watch::Sender<SessionStatus>,
    permissions: Arc<dyn PermissionHandler>,
    files: Option<Arc<dyn FileSystemHandler>>,
    events: Arc<dyn SessionEvents>,
    buffer: StreamingBuffer<StreamKey>,
}

impl Core {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Apply a status change if the state machine allows it.
    fn transition(&self, next: SessionStatus) -> bool {
        let changed = self.status.send_if_modified(|current| {
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if changed {
            debug!(?next, "session status changed");
            self.events.on_status(next);
        }
        changed
    }

    /// Force the status back to idle after a teardown.
    fn force_idle(&self) {
        let previous = self.status.send_replace(SessionStatus::Idle);
        if previous != SessionStatus::Idle {
            self.events.on_status(SessionStatus::Idle);
        }
    }

    fn end_streams(&self, turn_id: &str) {
        self.buffer.end(&StreamKey::new(turn_id, StreamKind::Assistant));
        self.buffer.end(&StreamKey::new(turn_id, StreamKind::Thought));
    }

    fn discard_streams(&self, turn_id: &str) {
        self.buffer
            .discard(&StreamKey::new(turn_id, StreamKind::Assistant));
        self.buffer
            .discard(&StreamKey::new(turn_id, StreamKind::Thought));
    }

    /// Fold one update into state; returns the host notification to emit
    /// once the lock is released.
    fn apply_update(state: &mut State, update: SessionUpdate) -> Option<Emit> {
        let replaying = state.loading.is_some();
        match update {
            SessionUpdate::UserMessageChunk { content } => {
                if !replaying {
                    debug!("user message chunk outside history replay ignored");
                    return None;
                }
                let text = content.as_text().unwrap_or_default();
                let reuse = state
                    .open_turn()
                    .is_some_and(|turn| !turn.has_agent_output());
                if !reuse {
                    if let Some(turn) = state.open_turn() {
                        turn.close(None);
                    }
                    state.turns.push(Turn::open(String::new()));
                }
                if let Some(turn) = state.open_turn() {
                    turn.append_user(text);
                }
                None
            }
            SessionUpdate::AgentMessageChunk { content } => {
                let text = content.as_text()?;
                let turn = replay_or_open(state, replaying)?;
                turn.append_assistant(text);
                (!replaying).then(|| {
                    Emit::Chunk(StreamKey::new(&turn.id, StreamKind::Assistant), text.to_owned())
                })
            }
            SessionUpdate::AgentThoughtChunk { content } => {
                let text = content.as_text()?;
                let turn = replay_or_open(state, replaying)?;
                turn.append_thought(text);
                (!replaying).then(|| {
                    Emit::Chunk(StreamKey::new(&turn.id, StreamKind::Thought), text.to_owned())
                })
            }
            SessionUpdate::ToolCall(update) | SessionUpdate::ToolCallUpdate(update) => {
                let turn = replay_or_open(state, replaying)?;
                let id = update.tool_call_id.clone();
                turn.upsert_tool_call(update);
                let call = turn.tool_call(&id)?.clone();
                (!replaying).then(|| Emit::ToolCall(turn.id.clone(), call))
            }
            SessionUpdate::Plan { entries } => {
                let turn = replay_or_open(state, replaying)?;
                turn.replace_plan(entries.clone());
                (!replaying).then(|| Emit::Plan(turn.id.clone(), entries))
            }
            SessionUpdate::AvailableCommandsUpdate { available_commands } => {
                Some(Emit::Commands(available_commands))
            }
            SessionUpdate::CurrentModeUpdate { current_mode_id } => {
                if let Some(session) = state.session.as_mut() {
                    session.set_mode(&current_mode_id);
                }
                Some(Emit::Mode(current_mode_id))
            }
        }
    }

    /// Close the session after the agent went away.
    fn reset_after_disconnect(&self, reason: &str) -> Option<ClassifiedError> {
        let error = AppError::ConnectionClosed(reason.to_owned()).classify(None);
        let failed_turn = {
            let mut state = self.state();
            state.turn_cancel.cancel();
            state.session = None;
            state.loading = None;
            state.open_turn().map(|turn| {
                turn.fail(error.clone());
                turn.id.clone()
            })
        };
        if let Some(turn_id) = &failed_turn {
            self.discard_streams(turn_id);
        }
        self.buffer.end_all();
        self.force_idle();
        failed_turn.map(|_| error)
    }
}

/// Find the open turn, opening an anonymous one during replay.
fn replay_or_open(state: &mut State, replaying: bool) -> Option<&mut Turn> {
    if replaying && state.open_turn().is_none() {
        state.turns.push(Turn::open(String::new()));
    }
    let turn = state.open_turn();
    if turn.is_none() {
        debug!("session update outside an open turn ignored");
    }
    turn
}

/// Host notification collected under the lock and emitted after it.
enum Emit {
    Chunk(StreamKey, String),
    ToolCall(String, ToolCall),
    Plan(String, Vec<PlanEntry>),
    Commands(Vec<Value>),
    Mode(String),
}

impl ClientHandler for Core {
    fn request_permission(
        &self,
        request: RequestPermissionRequest,
    ) -> HandlerFuture<'_, PermissionOutcome> {
        Box::pin(async move {
            let token = {
                let state = self.state();
                if !state.accepts(&request.session_id) {
                    warn!(session_id = %request.session_id, "permission request for unknown session");
                    return PermissionOutcome::Cancelled;
                }
                state.turn_cancel.clone()
            };
            if token.is_cancelled() {
                return PermissionOutcome::Cancelled;
            }

            let tool_call_id = request.tool_call.tool_call_id.clone();
            let outcome = tokio::select! {
                outcome = self.permissions.decide(request) => outcome,
                () = token.cancelled() => {
                    info!(%tool_call_id, "turn cancelled while permission was pending");
                    PermissionOutcome::Cancelled
                }
            };
            debug!(%tool_call_id, ?outcome, "permission decided");
            outcome
        })
    }

    fn read_text_file(&self, request: ReadTextFileRequest) -> HandlerFuture<'_, Result<String>> {
        match &self.files {
            Some(files) => files.read_text_file(request),
            None => Box::pin(async {
                Err(RpcError::method_not_found(methods::FS_READ_TEXT_FILE).into())
            }),
        }
    }

    fn write_text_file(&self, request: WriteTextFileRequest) -> HandlerFuture<'_, Result<()>> {
        match &self.files {
            Some(files) => files.write_text_file(request),
            None => Box::pin(async {
                Err(RpcError::method_not_found(methods::FS_WRITE_TEXT_FILE).into())
            }),
        }
    }

    fn session_update(&self, notification: SessionNotification) {
        let emit = {
            let mut state = self.state();
            if !state.accepts(&notification.session_id) {
                debug!(session_id = %notification.session_id, "update for inactive session ignored");
                return;
            }
            Self::apply_update(&mut state, notification.update)
        };

        match emit {
            Some(Emit::Chunk(key, text)) => self.buffer.push(&key, &text),
            Some(Emit::ToolCall(turn_id, call)) => self.events.on_tool_call(&turn_id, &call),
            Some(Emit::Plan(turn_id, entries)) => self.events.on_plan(&turn_id, &entries),
            Some(Emit::Commands(commands)) => self.events.on_available_commands(&commands),
            Some(Emit::Mode(mode_id)) => self.events.on_mode_changed(&mode_id),
            None => {}
        }
    }

    fn diagnostic(&self, line: &str) {
        self.events.on_diagnostic(line);
    }

    fn disconnected(&self, reason: &str) {
        warn!(reason, "agent disconnected, closing session");
        if let Some(error) = self.reset_after_disconnect(reason) {
            self.events.on_error(&error);
        }
        self.events.on_disconnected(reason);
    }
}

// ── Manager ──────────────────────────────────────────────────────────────────

/// Drives one ACP session.
pub struct SessionManager {
    core: Arc<Core>,
    connection: Connection,
    cancel_grace: Duration,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status())
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Build a manager and its (disconnected) connection.
    ///
    /// File-system capabilities are only advertised when `files` is given.
    #[must_use]
    pub fn new(
        mut options: SessionOptions,
        permissions: Arc<dyn PermissionHandler>,
        files: Option<Arc<dyn FileSystemHandler>>,
        events: Arc<dyn SessionEvents>,
    ) -> Self {
        if files.is_none() {
            options.connection.client_capabilities.fs = FileSystemCapability::default();
        }

        let sink_events = Arc::clone(&events);
        let buffer = StreamingBuffer::new(
            options.streaming,
            Arc::new(move |flush: StreamFlush<StreamKey>| sink_events.on_stream(&flush)),
        );
        let (status, _) = watch::channel(SessionStatus::Idle);

        let core = Arc::new(Core {
            state: Mutex::new(State {
                session: None,
                loading: None,
                turns: Vec::new(),
                turn_cancel: CancellationToken::new(),
            }),
            status,
            permissions,
            files,
            events,
            buffer,
        });
        let handler: Arc<dyn ClientHandler> = Arc::clone(&core) as Arc<dyn ClientHandler>;
        let connection = Connection::new(options.connection, handler);

        Self {
            core,
            connection,
            cancel_grace: options.cancel_grace,
        }
    }

    /// Spawn the agent and complete the handshake.
    ///
    /// # Errors
    ///
    /// Any connection failure; it is also reported through
    /// [`SessionEvents::on_error`].
    pub async fn connect(&self, spawn: &SpawnConfig) -> Result<()> {
        let result = self.connection.connect(spawn).await;
        self.report(result)
    }

    /// Connect over an existing stream pair.
    ///
    /// # Errors
    ///
    /// Any handshake failure.
    pub async fn connect_streams<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let result = self.connection.connect_streams(reader, writer).await;
        self.report(result)
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.core.events.on_error(&self.connection.classify(err));
        }
        result
    }

    /// The underlying protocol connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Open a new session in `cwd`. Any previous history is cleared.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidState`] while a turn is in progress, or the
    /// `session/new` failure.
    pub async fn start(&self, cwd: &Path, mcp_servers: Vec<McpServer>) -> Result<Session> {
        self.ensure_idle()?;
        let response = self
            .report(self.connection.new_session(cwd, mcp_servers).await)?;

        let session = Session::new(
            response.session_id,
            cwd.to_path_buf(),
            self.agent_capabilities(),
            response.modes,
            response.models,
        );
        {
            let mut state = self.core.state();
            state.session = Some(session.clone());
            state.turns.clear();
            state.turn_cancel = CancellationToken::new();
        }
        self.core.force_idle();
        info!(session_id = %session.session_id, "session started");
        Ok(session)
    }

    /// Resume an earlier session. The agent replays its history as updates,
    /// which are rebuilt into closed turns.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidState`] while a turn is in progress or when the
    /// agent cannot load sessions, or the `session/load` failure.
    pub async fn load(
        &self,
        session_id: &str,
        cwd: &Path,
        mcp_servers: Vec<McpServer>,
    ) -> Result<Session> {
        self.ensure_idle()?;
        {
            let mut state = self.core.state();
            state.session = None;
            state.loading = Some(session_id.to_owned());
            state.turns.clear();
            state.turn_cancel = CancellationToken::new();
        }

        let result = self
            .connection
            .load_session(session_id, cwd, mcp_servers)
            .instrument(info_span!("session_load", session_id))
            .await;

        let mut state = self.core.state();
        state.loading = None;
        if let Some(turn) = state.open_turn() {
            turn.close(None);
        }
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                state.turns.clear();
                drop(state);
                return self.report(Err(err));
            }
        };

        let session = Session::new(
            session_id.to_owned(),
            cwd.to_path_buf(),
            self.agent_capabilities(),
            response.modes,
            response.models,
        );
        state.session = Some(session.clone());
        let replayed = state.turns.len();
        drop(state);

        self.core.force_idle();
        info!(session_id, replayed, "session loaded");
        Ok(session)
    }

    /// Send `text` as the next prompt and wait for the turn to end.
    ///
    /// Returns the closed turn.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidState`] without a session or while a turn is in
    ///   progress.
    /// - The `session/prompt` failure. The turn is closed without an
    ///   assistant message and the classified error goes to
    ///   [`SessionEvents::on_error`].
    pub async fn send_prompt(&self, text: &str) -> Result<Turn> {
        let session_id = self.session_id()?;
        if !self.core.transition(SessionStatus::Processing) {
            return Err(AppError::InvalidState(format!(
                "cannot prompt while {:?}",
                self.core.status()
            )));
        }
        let turn_id = {
            let mut state = self.core.state();
            let turn = Turn::open(text);
            let turn_id = turn.id.clone();
            state.turns.push(turn);
            state.turn_cancel = CancellationToken::new();
            turn_id
        };

        let result = self
            .connection
            .prompt(&session_id, vec![ContentBlock::text(text)])
            .instrument(info_span!("prompt", %session_id, %turn_id))
            .await;

        match result {
            Ok(response) => Ok(self.complete_turn(&turn_id, response.stop_reason)),
            Err(err) => {
                let classified = self.connection.classify(&err);
                self.fail_turn(&turn_id, classified);
                Err(err)
            }
        }
    }

    fn complete_turn(&self, turn_id: &str, stop_reason: StopReason) -> Turn {
        self.core.end_streams(turn_id);
        let (closed, turn) = {
            let mut state = self.core.state();
            match state.turns.iter_mut().rev().find(|t| t.id == turn_id) {
                Some(turn) => (turn.close(Some(stop_reason)), Some(turn.clone())),
                None => (false, None),
            }
        };
        if closed {
            self.core.transition(SessionStatus::Idle);
        }
        info!(turn_id, stop_reason = stop_reason.as_str(), "turn complete");

        match turn {
            Some(turn) => {
                if closed {
                    self.core.events.on_turn_complete(&turn);
                }
                turn
            }
            // History was reset underneath us; report what the agent said.
            None => {
                let mut turn = Turn::open(String::new());
                turn.close(Some(stop_reason));
                turn
            }
        }
    }

    fn fail_turn(&self, turn_id: &str, error: ClassifiedError) {
        self.core.discard_streams(turn_id);
        let failed = {
            let mut state = self.core.state();
            state
                .turns
                .iter_mut()
                .rev()
                .find(|t| t.id == turn_id)
                .is_some_and(|turn| turn.fail(error.clone()))
        };
        // A disconnect may already have failed the turn and reported it.
        if failed {
            self.core.transition(SessionStatus::Idle);
            warn!(turn_id, kind = ?error.kind, message = %error.message, "turn failed");
            self.core.events.on_error(&error);
        }
    }

    /// Ask the agent to stop the current turn.
    ///
    /// Waits until the prompt resolves or the cancel grace period runs out;
    /// in the latter case the turn is closed locally as cancelled. Pending
    /// permission requests for the turn are answered `cancelled` at once.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidState`] when no turn is in progress.
    pub async fn cancel(&self) -> Result<()> {
        if !self.core.transition(SessionStatus::Cancelled) {
            return Err(AppError::InvalidState(format!(
                "nothing to cancel while {:?}",
                self.core.status()
            )));
        }
        let session_id = {
            let state = self.core.state();
            state.turn_cancel.cancel();
            state.session.as_ref().map(|s| s.session_id.clone())
        };

        if let Some(session_id) = &session_id {
            if let Err(err) = self.connection.cancel(session_id).await {
                warn!(%err, "failed to send session/cancel");
            }
        }

        let mut status = self.core.status.subscribe();
        let acknowledged = tokio::time::timeout(
            self.cancel_grace,
            status.wait_for(|s| *s != SessionStatus::Cancelled),
        )
        .await
        .is_ok();

        if !acknowledged {
            warn!(
                grace_ms = u64::try_from(self.cancel_grace.as_millis()).unwrap_or(u64::MAX),
                "agent did not acknowledge cancel in time, closing turn locally"
            );
            let turn = {
                let mut state = self.core.state();
                state.open_turn().and_then(|turn| {
                    turn.close(Some(StopReason::Cancelled))
                        .then(|| turn.clone())
                })
            };
            if let Some(turn) = &turn {
                self.core.end_streams(&turn.id);
            }
            self.core.transition(SessionStatus::Idle);
            if let Some(turn) = turn {
                self.core.events.on_turn_complete(&turn);
            }
        }
        Ok(())
    }

    /// Switch the session mode.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidState`] without a session, or the request failure.
    pub async fn set_mode(&self, mode_id: &str) -> Result<()> {
        let session_id = self.session_id()?;
        self.report(self.connection.set_mode(&session_id, mode_id).await)?;
        if let Some(session) = self.core.state().session.as_mut() {
            session.set_mode(mode_id);
        }
        self.core.events.on_mode_changed(mode_id);
        Ok(())
    }

    /// Switch the session model.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidState`] without a session, or the request failure.
    pub async fn set_model(&self, model_id: &str) -> Result<()> {
        let session_id = self.session_id()?;
        self.report(self.connection.set_model(&session_id, model_id).await)?;
        if let Some(session) = self.core.state().session.as_mut() {
            session.set_model(model_id);
        }
        Ok(())
    }

    /// Tear down the connection and close the session. Idempotent.
    ///
    /// Nothing is reported to [`SessionEvents`] beyond the status change: an
    /// open turn is failed before the connection goes away, so the prompt
    /// that wakes up afterwards finds it already closed.
    pub async fn disconnect(&self) {
        self.core.reset_after_disconnect("disconnected");
        self.connection.disconnect().await;
    }

    /// Current turn status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.core.status()
    }

    /// Watch turn status changes.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.core.status.subscribe()
    }

    /// The active session, if any.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.core.state().session.clone()
    }

    /// Snapshot of the turn history.
    #[must_use]
    pub fn turns(&self) -> Vec<Turn> {
        self.core.state().turns.clone()
    }

    /// Structured transcript of the history.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let state = self.core.state();
        transcript::to_json(state.session.as_ref(), &state.turns)
    }

    /// Markdown transcript of the history.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let state = self.core.state();
        transcript::to_markdown(state.session.as_ref(), &state.turns)
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.core.status() {
            SessionStatus::Idle => Ok(()),
            other => Err(AppError::InvalidState(format!(
                "a turn is in progress ({other:?})"
            ))),
        }
    }

    fn session_id(&self) -> Result<String> {
        self.core
            .state()
            .session
            .as_ref()
            .map(|s| s.session_id.clone())
            .ok_or_else(|| AppError::InvalidState("no active session".into()))
    }

    fn agent_capabilities(&self) -> AgentCapabilities {
        self.connection
            .agent()
            .map(|a| a.agent_capabilities)
            .unwrap_or_default()
    }
}
