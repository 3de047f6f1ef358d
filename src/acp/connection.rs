//! ACP protocol connection.
//!
//! A [`Connection`] sits between the transport and the session layer. It
//! runs the `initialize`/`authenticate` handshake, correlates responses with
//! the requests in its [`RequestRegistry`], and routes everything else the
//! agent sends to a [`ClientHandler`].
//!
//! All inbound traffic is handled by one dispatch loop per connection:
//!
//! - responses settle the matching registry entry;
//! - `session/update` notifications go to the handler synchronously, so
//!   they are observed in emission order;
//! - agent requests run on their own task and always get exactly one reply.
//!
//! The connection never touches session state.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::acp::handler::ClientHandler;
use crate::acp::handshake;
use crate::acp::message::{Message, RequestId, RpcError};
use crate::acp::registry::RequestRegistry;
use crate::acp::schema::{
    methods, CancelNotification, ClientCapabilities, ContentBlock, InitializeResponse,
    LoadSessionRequest, LoadSessionResponse, McpServer, NewSessionRequest, NewSessionResponse,
    PromptRequest, PromptResponse, ReadTextFileResponse, RequestPermissionResponse,
    SessionNotification, SessionUpdate, SetSessionModeRequest, SetSessionModelRequest,
};
use crate::acp::spawner::SpawnConfig;
use crate::acp::transport::{Transport, TransportEvent};
use crate::error_kind::ClassifiedError;
use crate::{AppError, Result};

/// How long `disconnect` waits for the dispatch loop to drain.
const DISPATCH_STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No agent attached.
    Disconnected,
    /// Spawning the agent and running the handshake.
    Connecting,
    /// Handshake complete; session operations are allowed.
    Connected,
    /// The last connection attempt failed.
    Error,
}

/// Connection-level settings.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Capabilities advertised in `initialize`.
    pub client_capabilities: ClientCapabilities,
    /// Auth method to use after `initialize`, if any.
    pub auth_method: Option<String>,
    /// Timeout for ordinary requests.
    pub request_timeout: Option<Duration>,
    /// Timeout for `initialize` and `authenticate`.
    pub initialize_timeout: Option<Duration>,
    /// Timeout for `session/prompt`; `None` waits for the agent.
    pub prompt_timeout: Option<Duration>,
    /// How long a terminated agent gets before it is killed.
    pub shutdown_grace: Duration,
    /// Backend identifier used when classifying errors.
    pub backend: Option<String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            client_capabilities: ClientCapabilities::default(),
            auth_method: None,
            request_timeout: Some(Duration::from_secs(60)),
            initialize_timeout: Some(Duration::from_secs(30)),
            prompt_timeout: None,
            shutdown_grace: Duration::from_secs(2),
            backend: None,
        }
    }
}

/// The live transport plus the dispatch task reading from it.
struct Link {
    generation: u64,
    transport: Arc<Transport>,
    dispatch: JoinHandle<()>,
}

struct Shared {
    options: ConnectionOptions,
    handler: Arc<dyn ClientHandler>,
    registry: RequestRegistry,
    state: watch::Sender<ConnectionState>,
    link: Mutex<Option<Link>>,
    agent: Mutex<Option<InitializeResponse>>,
    generation: AtomicU64,
}

impl Shared {
    fn link(&self) -> MutexGuard<'_, Option<Link>> {
        self.link
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Detach the link if it still belongs to `generation`.
    fn take_link(&self, generation: Option<u64>) -> Option<Link> {
        let mut slot = self.link();
        match (slot.as_ref(), generation) {
            (Some(link), Some(g)) if link.generation != g => None,
            _ => slot.take(),
        }
    }

    fn transport(&self) -> Result<Arc<Transport>> {
        self.link()
            .as_ref()
            .map(|link| Arc::clone(&link.transport))
            .ok_or_else(|| AppError::ConnectionClosed("not connected".into()))
    }
}

/// Client end of one ACP agent connection.
pub struct Connection {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("registry", &self.shared.registry)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create a disconnected connection that will dispatch to `handler`.
    #[must_use]
    pub fn new(options: ConnectionOptions, handler: Arc<dyn ClientHandler>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                options,
                handler,
                registry: RequestRegistry::new(),
                state,
                link: Mutex::new(None),
                agent: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Spawn the agent described by `spawn` and run the handshake.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidState`] if already connecting or connected.
    /// - [`AppError::Spawn`] if the process cannot be started.
    /// - Any handshake failure. In every error case the state becomes
    ///   [`ConnectionState::Error`] and the process is torn down.
    pub async fn connect(&self, spawn: &SpawnConfig) -> Result<()> {
        self.begin_connect()?;
        match Transport::spawn(spawn, self.shared.options.shutdown_grace) {
            Ok((transport, events)) => self.establish(transport, events).await,
            Err(err) => {
                warn!(%err, "agent spawn failed");
                self.shared.state.send_replace(ConnectionState::Error);
                Err(err)
            }
        }
    }

    /// Run the protocol over an already-open byte stream pair.
    ///
    /// # Errors
    ///
    /// Same as [`connect`](Self::connect), minus spawn failures.
    pub async fn connect_streams<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.begin_connect()?;
        let (transport, events) = Transport::from_streams(reader, writer);
        self.establish(transport, events).await
    }

    fn begin_connect(&self) -> Result<()> {
        let allowed = self.shared.state.send_if_modified(|state| {
            let idle = matches!(state, ConnectionState::Disconnected | ConnectionState::Error);
            if idle {
                *state = ConnectionState::Connecting;
            }
            idle
        });
        if allowed {
            Ok(())
        } else {
            Err(AppError::InvalidState(format!(
                "cannot connect while {:?}",
                self.state()
            )))
        }
    }

    async fn establish(
        &self,
        transport: Transport,
        events: mpsc::Receiver<TransportEvent>,
    ) -> Result<()> {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let transport = Arc::new(transport);
        let dispatch = tokio::spawn(
            dispatch_loop(
                Arc::clone(&self.shared),
                Arc::clone(&transport),
                events,
                generation,
            )
            .instrument(info_span!("acp_dispatch", generation, pid = ?transport.pid())),
        );
        *self.shared.link() = Some(Link {
            generation,
            transport,
            dispatch,
        });

        match self.handshake().await {
            Ok(()) => {
                self.shared.state.send_replace(ConnectionState::Connected);
                info!("acp connection established");
                Ok(())
            }
            Err(err) => {
                warn!(%err, "acp handshake failed, tearing down agent");
                self.teardown(AppError::ConnectionClosed(format!("handshake failed: {err}")))
                    .await;
                self.shared.state.send_replace(ConnectionState::Error);
                Err(err)
            }
        }
    }

    async fn handshake(&self) -> Result<()> {
        let options = &self.shared.options;
        let init = handshake::initialize_request(options.client_capabilities);
        let result = self
            .call(methods::INITIALIZE, &init, options.initialize_timeout)
            .await?;
        let response = handshake::parse_initialize_response(result)?;

        if let Some(auth) =
            handshake::authenticate_request(options.auth_method.as_deref(), &response.auth_methods)?
        {
            self.call(methods::AUTHENTICATE, &auth, options.initialize_timeout)
                .await?;
            info!(method_id = %auth.method_id, "handshake: authenticated");
        }

        *self
            .shared
            .agent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(response);
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch lifecycle transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// The agent's `initialize` result, once connected.
    #[must_use]
    pub fn agent(&self) -> Option<InitializeResponse> {
        self.shared
            .agent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// In-flight request tracking.
    #[must_use]
    pub fn registry(&self) -> &RequestRegistry {
        &self.shared.registry
    }

    /// Options this connection was built with.
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.shared.options
    }

    /// Classify `error` with this connection's backend hint.
    #[must_use]
    pub fn classify(&self, error: &AppError) -> ClassifiedError {
        error.classify(self.shared.options.backend.as_deref())
    }

    // ── Outgoing operations ──────────────────────────────────────────────

    /// `session/new`.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidState`] when not connected, or the request failure.
    pub async fn new_session(
        &self,
        cwd: &Path,
        mcp_servers: Vec<McpServer>,
    ) -> Result<NewSessionResponse> {
        let params = NewSessionRequest {
            cwd: cwd.to_path_buf(),
            mcp_servers,
        };
        self.request(methods::SESSION_NEW, &params).await
    }

    /// `session/load`. History is replayed as `session/update`
    /// notifications before the response arrives.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidState`] when not connected or when the agent did
    /// not advertise `loadSession`; otherwise the request failure.
    pub async fn load_session(
        &self,
        session_id: &str,
        cwd: &Path,
        mcp_servers: Vec<McpServer>,
    ) -> Result<LoadSessionResponse> {
        let supported = self
            .agent()
            .is_some_and(|a| a.agent_capabilities.load_session);
        if !supported {
            return Err(AppError::InvalidState(
                "agent does not support session/load".into(),
            ));
        }
        let params = LoadSessionRequest {
            session_id: session_id.to_owned(),
            cwd: cwd.to_path_buf(),
            mcp_servers,
        };
        self.request(methods::SESSION_LOAD, &params).await
    }

    /// `session/prompt`; resolves when the turn ends.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidState`] when not connected, or the request failure.
    pub async fn prompt(
        &self,
        session_id: &str,
        prompt: Vec<ContentBlock>,
    ) -> Result<PromptResponse> {
        self.ensure_connected()?;
        let params = PromptRequest {
            session_id: session_id.to_owned(),
            prompt,
        };
        let value = self
            .call(
                methods::SESSION_PROMPT,
                &params,
                self.shared.options.prompt_timeout,
            )
            .await?;
        decode(methods::SESSION_PROMPT, value)
    }

    /// `session/cancel`. A notification: the matching `session/prompt`
    /// resolving with `cancelled` is the acknowledgement.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidState`] when not connected, or
    /// [`AppError::ConnectionClosed`] if the write fails.
    pub async fn cancel(&self, session_id: &str) -> Result<()> {
        self.ensure_connected()?;
        let params = serde_json::to_value(CancelNotification {
            session_id: session_id.to_owned(),
        })?;
        debug!(session_id, "sending session/cancel");
        self.shared
            .transport()?
            .send(&Message::notification(methods::SESSION_CANCEL, params))
            .await
    }

    /// `session/set_mode`.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidState`] when not connected, or the request failure.
    pub async fn set_mode(&self, session_id: &str, mode_id: &str) -> Result<()> {
        let params = SetSessionModeRequest {
            session_id: session_id.to_owned(),
            mode_id: mode_id.to_owned(),
        };
        self.request::<_, Value>(methods::SESSION_SET_MODE, &params)
            .await
            .map(drop)
    }

    /// `session/set_model`.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidState`] when not connected, or the request failure.
    pub async fn set_model(&self, session_id: &str, model_id: &str) -> Result<()> {
        let params = SetSessionModelRequest {
            session_id: session_id.to_owned(),
            model_id: model_id.to_owned(),
        };
        self.request::<_, Value>(methods::SESSION_SET_MODEL, &params)
            .await
            .map(drop)
    }

    /// Fail everything pending, stop the agent, and release the transport.
    ///
    /// Safe to call any number of times.
    pub async fn disconnect(&self) {
        if self.shared.link().is_none() {
            return;
        }
        info!("disconnecting from agent");
        self.teardown(AppError::ConnectionClosed("disconnected".into()))
            .await;
        self.shared
            .state
            .send_replace(ConnectionState::Disconnected);
    }

    async fn teardown(&self, error: AppError) {
        let Some(link) = self.shared.take_link(None) else {
            return;
        };
        self.shared.registry.fail_all(&error);
        link.transport.shutdown().await;

        let mut dispatch = link.dispatch;
        if tokio::time::timeout(DISPATCH_STOP_TIMEOUT, &mut dispatch)
            .await
            .is_err()
        {
            debug!("dispatch loop still running after shutdown, aborting");
            dispatch.abort();
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            other => Err(AppError::InvalidState(format!(
                "connection is {other:?}, not connected"
            ))),
        }
    }

    async fn request<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.ensure_connected()?;
        let value = self
            .call(method, params, self.shared.options.request_timeout)
            .await?;
        decode(method, value)
    }

    /// Register, send, and await one request.
    async fn call<P>(&self, method: &str, params: &P, timeout: Option<Duration>) -> Result<Value>
    where
        P: Serialize + Sync,
    {
        let transport = self.shared.transport()?;
        let params = serde_json::to_value(params)?;
        let pending = self.shared.registry.register(method, timeout);
        let id = pending.id();

        if let Err(err) = transport
            .send(&Message::request(id.into(), method, params))
            .await
        {
            self.shared.registry.settle(id, Err(err));
        }
        pending.wait().await
    }
}

/// Deserialize a result; `null` is read as an empty object.
fn decode<R: DeserializeOwned>(method: &str, value: Value) -> Result<R> {
    let value = if value.is_null() { json!({}) } else { value };
    serde_json::from_value(value)
        .map_err(|e| AppError::Acp(format!("invalid {method} response: {e}")))
}

// ── Dispatch ─────────────────────────────────────────────────────────────────

async fn dispatch_loop(
    shared: Arc<Shared>,
    transport: Arc<Transport>,
    mut events: mpsc::Receiver<TransportEvent>,
    generation: u64,
) {
    let reason = loop {
        let Some(event) = events.recv().await else {
            break "transport stopped".to_owned();
        };
        match event {
            TransportEvent::Message(message) => {
                dispatch_message(&shared, &transport, message);
            }
            TransportEvent::Diagnostic(line) => {
                debug!(line = %line, "agent diagnostic output");
                shared.handler.diagnostic(&line);
            }
            TransportEvent::Closed { reason } => break reason,
            TransportEvent::Exited { exit_code, reason } => {
                info!(?exit_code, %reason, "agent exited");
                break reason;
            }
        }
    };

    // Only the current link may change connection state; an explicit
    // disconnect has already detached it.
    let Some(link) = shared.take_link(Some(generation)) else {
        debug!(%reason, "dispatch loop ended after disconnect");
        return;
    };

    let was_connected = *shared.state.borrow() == ConnectionState::Connected;
    warn!(%reason, "agent connection closed");
    shared
        .registry
        .fail_all(&AppError::ConnectionClosed(reason.clone()));
    link.transport.shutdown().await;
    shared.state.send_replace(ConnectionState::Disconnected);

    if was_connected {
        shared.handler.disconnected(&reason);
    }
}

fn dispatch_message(shared: &Arc<Shared>, transport: &Arc<Transport>, message: Message) {
    match message {
        Message::Response { id, outcome } => {
            let Some(id) = numeric_id(&id) else {
                debug!(%id, "response with foreign id discarded");
                return;
            };
            shared
                .registry
                .settle(id, outcome.map_err(AppError::from));
        }
        Message::Notification { method, params } => {
            if method == methods::SESSION_UPDATE {
                dispatch_update(shared, params);
            } else {
                debug!(%method, "unhandled notification ignored");
            }
        }
        Message::Request { id, method, params } => {
            let shared = Arc::clone(shared);
            let transport = Arc::clone(transport);
            let span = info_span!("agent_request", %id, %method);
            tokio::spawn(
                async move {
                    let outcome = handle_request(&shared, &method, params).await;
                    if let Err(ref err) = outcome {
                        debug!(code = err.code, message = %err.message, "agent request failed");
                    }
                    let reply = match outcome {
                        Ok(result) => Message::result(id, result),
                        Err(err) => Message::error(id, err),
                    };
                    if let Err(err) = transport.send(&reply).await {
                        warn!(%err, "could not reply to agent request");
                    }
                }
                .instrument(span),
            );
        }
    }
}

fn dispatch_update(shared: &Shared, params: Value) {
    match serde_json::from_value::<SessionNotification>(params.clone()) {
        Ok(notification) => shared.handler.session_update(notification),
        Err(err) => {
            let tag = params
                .pointer("/update/sessionUpdate")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if SessionUpdate::KNOWN_TAGS.contains(&tag) {
                warn!(tag, %err, "malformed session/update skipped");
            } else {
                debug!(tag, "unknown session/update kind skipped");
            }
        }
    }
}

async fn handle_request(
    shared: &Shared,
    method: &str,
    params: Value,
) -> std::result::Result<Value, RpcError> {
    let fs = shared.options.client_capabilities.fs;
    match method {
        methods::SESSION_REQUEST_PERMISSION => {
            let request = parse_params(params)?;
            let _hold = shared.registry.hold();
            let outcome = shared.handler.request_permission(request).await;
            to_result(&RequestPermissionResponse { outcome })
        }
        methods::FS_READ_TEXT_FILE if fs.read_text_file => {
            let request = parse_params(params)?;
            let content = shared
                .handler
                .read_text_file(request)
                .await
                .map_err(|e| RpcError::from(&e))?;
            to_result(&ReadTextFileResponse { content })
        }
        methods::FS_WRITE_TEXT_FILE if fs.write_text_file => {
            let request = parse_params(params)?;
            shared
                .handler
                .write_text_file(request)
                .await
                .map_err(|e| RpcError::from(&e))?;
            Ok(json!({}))
        }
        other => Err(RpcError::method_not_found(other)),
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> std::result::Result<T, RpcError> {
    serde_json::from_value(params).map_err(RpcError::invalid_params)
}

fn to_result<T: Serialize>(value: &T) -> std::result::Result<Value, RpcError> {
    serde_json::to_value(value).map_err(RpcError::internal)
}

/// Client-issued ids are positive integers; anything else cannot be ours.
fn numeric_id(id: &RequestId) -> Option<u64> {
    match id {
        RequestId::Number(n) => u64::try_from(*n).ok(),
        RequestId::Str(s) => s.parse().ok(),
    }
}
