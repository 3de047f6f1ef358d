//! Byte-level transport to an ACP agent.
//!
//! A [`Transport`] owns the reader, writer, and stderr-drain tasks for one
//! agent, plus (for spawned agents) the exit monitor. Everything the agent
//! produces arrives on a single [`TransportEvent`] channel in emission order.

use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use crate::acp::message::Message;
use crate::acp::reader::{run_reader, run_stderr_drain};
use crate::acp::spawner::{monitor_exit, spawn_agent, SpawnConfig};
use crate::acp::writer::run_writer;
use crate::{AppError, Result};

/// Capacity of the inbound event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;
/// Capacity of the outbound message channel.
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;
/// How long `shutdown` waits for the writer to close stdin.
const WRITER_CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Something the agent side of the transport produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A parsed JSON-RPC message.
    Message(Message),
    /// A stdout line that was not JSON.
    Diagnostic(String),
    /// The agent's stdout reached EOF or failed.
    Closed {
        /// Human-readable cause.
        reason: String,
    },
    /// The agent process exited.
    Exited {
        /// Exit status code; `None` when killed by a signal.
        exit_code: Option<i32>,
        /// Human-readable cause.
        reason: String,
    },
}

/// Handle to a running transport.
///
/// Dropping the handle does not stop the background tasks; call
/// [`shutdown`](Self::shutdown). Spawned children are `kill_on_drop`, so a
/// leaked transport still cannot leave an orphan process behind once the
/// exit monitor task ends.
#[derive(Debug)]
pub struct Transport {
    outbound: mpsc::Sender<Value>,
    io_cancel: CancellationToken,
    process_cancel: CancellationToken,
    writer: Mutex<Option<JoinHandle<()>>>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    pid: Option<u32>,
}

impl Transport {
    /// Spawn the agent process and start its I/O tasks.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Spawn`] when the process cannot be launched.
    pub fn spawn(
        config: &SpawnConfig,
        shutdown_grace: Duration,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let process = spawn_agent(config)?;
        let pid = process.child.id();

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let io_cancel = CancellationToken::new();
        let process_cancel = CancellationToken::new();
        let reader_done = CancellationToken::new();

        let (outbound, writer) = start_io(
            process.stdout,
            process.stdin,
            &event_tx,
            reader_done.clone(),
            &io_cancel,
        );

        tokio::spawn(
            run_stderr_drain(process.stderr, io_cancel.clone())
                .instrument(info_span!("agent_stderr", pid = ?pid)),
        );

        let monitor = monitor_exit(
            process.child,
            event_tx.clone(),
            reader_done,
            process_cancel.clone(),
            shutdown_grace,
        );

        Ok((
            Self {
                outbound,
                io_cancel,
                process_cancel,
                writer: Mutex::new(Some(writer)),
                monitor: Mutex::new(Some(monitor)),
                pid,
            },
            event_rx,
        ))
    }

    /// Build a transport over an arbitrary reader/writer pair.
    ///
    /// Used for in-process agents and tests. There is no process to
    /// monitor, so only [`TransportEvent::Closed`] signals the end.
    pub fn from_streams<R, W>(reader: R, writer: W) -> (Self, mpsc::Receiver<TransportEvent>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let io_cancel = CancellationToken::new();
        let (outbound, writer_handle) =
            start_io(reader, writer, &event_tx, CancellationToken::new(), &io_cancel);

        (
            Self {
                outbound,
                io_cancel,
                process_cancel: CancellationToken::new(),
                writer: Mutex::new(Some(writer_handle)),
                monitor: Mutex::new(None),
                pid: None,
            },
            event_rx,
        )
    }

    /// OS process id of the agent, when it was spawned by this transport.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Queue one message for the writer task.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ConnectionClosed`] once the writer has stopped.
    pub async fn send(&self, message: &Message) -> Result<()> {
        self.outbound
            .send(message.to_value())
            .await
            .map_err(|_| AppError::ConnectionClosed("transport is closed".into()))
    }

    /// Stop all I/O and terminate the agent process.
    ///
    /// Stdin is closed first, then the process gets `SIGTERM` and the grace
    /// period before being killed. Calling this more than once is harmless.
    pub async fn shutdown(&self) {
        self.io_cancel.cancel();

        let writer = self.writer.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = writer {
            if tokio::time::timeout(WRITER_CLOSE_TIMEOUT, handle).await.is_err() {
                debug!("writer did not finish closing stdin in time");
            }
        }

        self.process_cancel.cancel();

        let monitor = self.monitor.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = monitor {
            if let Err(err) = handle.await {
                warn!(%err, "exit monitor task failed");
            }
        }
    }
}

/// Start the reader and writer tasks; returns the outbound sender and the
/// writer's join handle.
fn start_io<R, W>(
    reader: R,
    writer: W,
    event_tx: &mpsc::Sender<TransportEvent>,
    reader_done: CancellationToken,
    cancel: &CancellationToken,
) -> (mpsc::Sender<Value>, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);

    tokio::spawn(
        run_reader(reader, event_tx.clone(), reader_done, cancel.clone())
            .instrument(info_span!("acp_reader")),
    );

    let writer_cancel = cancel.clone();
    let handle = tokio::spawn(
        async move {
            if let Err(err) = run_writer(writer, outbound_rx, writer_cancel).await {
                warn!(%err, "acp writer stopped with error");
            }
        }
        .instrument(info_span!("acp_writer")),
    );

    (outbound_tx, handle)
}
