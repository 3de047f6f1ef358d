//! ACP writer task.
//!
//! The writer is the only task that touches the agent's stdin. Outbound
//! messages arrive on a tokio [`mpsc`] channel and are written one complete
//! NDJSON line per `write_all`, so concurrent callers can never interleave
//! bytes on the wire.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{AppError, Result};

/// ACP writer task. Serialises outbound JSON messages and writes to `stdin`.
///
/// Each [`serde_json::Value`] from `msg_rx` is serialised to a compact
/// single-line string, terminated with `\n`, written, and flushed.
///
/// The task exits cleanly when `cancel` is triggered or `msg_rx` is closed;
/// either way `stdin` is dropped, which the agent observes as EOF.
///
/// # Errors
///
/// - [`AppError::Acp`]`("failed to serialise outbound message: …")`.
/// - [`AppError::ConnectionClosed`]`("write failed: …")` if the write to
///   `stdin` fails (e.g. the agent process has exited).
pub async fn run_writer<W>(
    stdin: W,
    mut msg_rx: mpsc::Receiver<serde_json::Value>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut stdin = stdin;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("acp writer: cancellation received, stopping");
                break;
            }

            msg = msg_rx.recv() => {
                let Some(value) = msg else {
                    debug!("acp writer: message channel closed, stopping");
                    break;
                };

                let mut bytes = serde_json::to_vec(&value).map_err(|e| {
                    AppError::Acp(format!("failed to serialise outbound message: {e}"))
                })?;

                // NDJSON: append the newline delimiter.
                bytes.push(b'\n');
                trace!(bytes = bytes.len(), "acp writer: writing line");

                let written = async {
                    stdin.write_all(&bytes).await?;
                    stdin.flush().await
                }
                .await;

                written.map_err(|e| {
                    warn!(error = %e, "acp writer: write to stdin failed");
                    AppError::ConnectionClosed(format!("write failed: {e}"))
                })?;
            }
        }
    }

    let _ = stdin.shutdown().await;
    Ok(())
}
