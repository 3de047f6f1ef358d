//! ACP reader task.
//!
//! Reads newline-delimited JSON from the agent's stdout, parses each line
//! into a [`Message`], and forwards the results as [`TransportEvent`]s
//! through a tokio [`mpsc`] channel, strictly in arrival order.
//!
//! The reader is driven by [`FramedRead`] backed by [`AcpCodec`], which
//! buffers partial lines across reads and drops oversized lines before any
//! JSON parsing happens. The stream only ends on EOF or an I/O error.
//!
//! | Line content                     | Emitted as                          |
//! |----------------------------------|-------------------------------------|
//! | JSON-RPC request/response/notif. | [`TransportEvent::Message`]         |
//! | Not JSON (agent log output)      | [`TransportEvent::Diagnostic`]      |
//! | JSON but not a JSON-RPC envelope | Skipped; logged at `WARN`           |
//! | Empty / whitespace               | Skipped                             |
//! | Over the line limit              | Skipped by the codec; `WARN`        |

use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::acp::codec::AcpCodec;
use crate::acp::message::Message;
use crate::acp::transport::TransportEvent;
use crate::Result;

/// Classification of a single inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundLine {
    /// A well-formed JSON-RPC message.
    Message(Message),
    /// Non-JSON output, forwarded to the diagnostic side-channel.
    Diagnostic(String),
    /// Nothing to deliver (blank line).
    Empty,
}

/// Classify one NDJSON line from the agent.
///
/// # Errors
///
/// Returns [`AppError::Acp`](crate::AppError::Acp)`("invalid envelope: …")` when the line is valid
/// JSON but not a JSON-RPC message. Non-JSON text is *not* an error; it is
/// returned as [`InboundLine::Diagnostic`].
pub fn parse_inbound_line(line: &str) -> Result<InboundLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(InboundLine::Empty);
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => Message::from_value(value).map(InboundLine::Message),
        Err(_) => Ok(InboundLine::Diagnostic(trimmed.to_owned())),
    }
}

/// ACP reader task. Reads NDJSON lines from `stdout` and emits events.
///
/// On clean EOF or an unrecoverable I/O error, sends
/// [`TransportEvent::Closed`] before returning. Oversized lines and invalid
/// envelopes are logged and skipped; they do **not** end the task.
///
/// `done` is cancelled when the task exits for any reason, letting the exit
/// monitor know every buffered message has been delivered.
///
/// # Cancellation
///
/// When `cancel` fires the reader exits without emitting a close event.
pub async fn run_reader<R>(
    stdout: R,
    event_tx: mpsc::Sender<TransportEvent>,
    done: CancellationToken,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin + Send,
{
    let _done = done.drop_guard();
    let mut framed = FramedRead::new(stdout, AcpCodec::new());

    loop {
        let item = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("acp reader: cancellation received, stopping");
                return;
            }

            item = framed.next() => item,
        };

        let event = match item {
            None => {
                debug!("acp reader: EOF detected");
                TransportEvent::Closed {
                    reason: "stream closed".to_owned(),
                }
            }

            Some(Err(e)) => {
                warn!(error = %e, "acp reader: IO error, stopping");
                TransportEvent::Closed {
                    reason: format!("stream error: {e}"),
                }
            }

            Some(Ok(line)) => match parse_inbound_line(&line) {
                Ok(InboundLine::Message(message)) => {
                    trace!(method = message.method(), "acp reader: message received");
                    TransportEvent::Message(message)
                }
                Ok(InboundLine::Diagnostic(text)) => TransportEvent::Diagnostic(text),
                Ok(InboundLine::Empty) => continue,
                Err(e) => {
                    warn!(error = %e, raw_line = %line, "acp reader: parse error, skipping line");
                    continue;
                }
            },
        };

        let closing = matches!(event, TransportEvent::Closed { .. });
        if event_tx.send(event).await.is_err() {
            debug!("acp reader: event_tx closed, stopping");
            return;
        }
        if closing {
            return;
        }
    }
}

/// Drain the agent's stderr into the log at `DEBUG` level.
pub async fn run_stderr_drain<R>(stderr: R, cancel: CancellationToken)
where
    R: AsyncRead + Unpin + Send,
{
    let mut lines = BufReader::new(stderr).lines();
    let mut line_count: u64 = 0;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    line_count += 1;
                    debug!(line_number = line_count, "agent stderr: {line}");
                }
                Ok(None) | Err(_) => break,
            },
        }
    }

    debug!(total_lines = line_count, "agent stderr: stream ended");
}
