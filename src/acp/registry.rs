//! In-flight request tracking for one ACP connection.
//!
//! Every outgoing request is registered here before it is written. The
//! registry hands out the JSON-RPC id, keeps a one-shot settlement handle,
//! and runs the request's timeout. Timeouts can be paused per request or
//! for every request at once while a permission round trip is waiting on
//! the user.
//!
//! A request leaves the registry exactly once: on its response, on timeout,
//! or through [`RequestRegistry::fail_all`]. Anything arriving afterwards for
//! the same id is logged and dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

use crate::{AppError, Result};

/// Countdown state of one request.
#[derive(Debug, Clone, Copy)]
struct Budget {
    /// Time left as of the last pause (or registration).
    remaining: Duration,
    /// Set while the countdown is running.
    running_since: Option<Instant>,
}

impl Budget {
    fn remaining_at(&self, now: Instant) -> Duration {
        match self.running_since {
            Some(since) => self.remaining.saturating_sub(now.saturating_duration_since(since)),
            None => self.remaining,
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.running_since.map(|since| since + self.remaining)
    }
}

struct PendingRequest {
    method: String,
    created_at: Instant,
    budget: Option<Budget>,
    paused: bool,
    reply: oneshot::Sender<Result<Value>>,
    wake: Arc<Notify>,
}

impl PendingRequest {
    /// Reconcile the countdown with the pause flags.
    fn apply(&mut self, hold_depth: usize, now: Instant) {
        let should_run = !self.paused && hold_depth == 0;
        let Some(budget) = self.budget.as_mut() else {
            return;
        };
        match (should_run, budget.running_since) {
            (true, None) => budget.running_since = Some(now),
            (false, Some(_)) => {
                budget.remaining = budget.remaining_at(now);
                budget.running_since = None;
            }
            _ => return,
        }
        self.wake.notify_one();
    }
}

#[derive(Default)]
struct Inner {
    pending: HashMap<u64, PendingRequest>,
    hold_depth: usize,
}

/// Tracks in-flight requests and their timeouts.
pub struct RequestRegistry {
    next_id: AtomicU64,
    inner: Arc<Mutex<Inner>>,
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RequestRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRegistry")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// Awaitable settlement of one registered request.
#[derive(Debug)]
pub struct PendingResponse {
    id: u64,
    rx: oneshot::Receiver<Result<Value>>,
}

impl PendingResponse {
    /// The JSON-RPC id assigned to this request.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the request to settle.
    ///
    /// # Errors
    ///
    /// Whatever the request settled with: an [`AppError::Rpc`] from the
    /// agent, [`AppError::Timeout`], or [`AppError::ConnectionClosed`].
    pub async fn wait(self) -> Result<Value> {
        self.rx.await.unwrap_or_else(|_| {
            Err(AppError::ConnectionClosed(format!(
                "request {} was dropped before it settled",
                self.id
            )))
        })
    }
}

/// Keeps every timeout paused while alive.
///
/// Holds nest: countdowns resume when the last one is dropped.
pub struct TimeoutHold {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for TimeoutHold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutHold")
            .field("depth", &lock(&self.inner).hold_depth)
            .finish()
    }
}

impl Drop for TimeoutHold {
    fn drop(&mut self) {
        let mut inner = lock(&self.inner);
        inner.hold_depth = inner.hold_depth.saturating_sub(1);
        if inner.hold_depth == 0 {
            let now = Instant::now();
            for request in inner.pending.values_mut() {
                request.apply(0, now);
            }
            debug!("request timeouts resumed");
        }
    }
}

impl RequestRegistry {
    /// Create an empty registry; the first id handed out is `1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Register a request and start its countdown.
    ///
    /// `timeout = None` waits indefinitely. A request registered while a
    /// [`TimeoutHold`] is active starts paused.
    pub fn register(&self, method: &str, timeout: Option<Duration>) -> PendingResponse {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (reply, rx) = oneshot::channel();
        let wake = Arc::new(Notify::new());
        let now = Instant::now();

        {
            let mut inner = lock(&self.inner);
            let mut request = PendingRequest {
                method: method.to_owned(),
                created_at: now,
                budget: timeout.map(|remaining| Budget {
                    remaining,
                    running_since: None,
                }),
                paused: false,
                reply,
                wake: Arc::clone(&wake),
            };
            request.apply(inner.hold_depth, now);
            inner.pending.insert(id, request);
        }

        if timeout.is_some() {
            tokio::spawn(
                run_timer(Arc::clone(&self.inner), id, wake)
                    .instrument(info_span!("request_timer", id, method)),
            );
        }

        debug!(id, method, ?timeout, "request registered");
        PendingResponse { id, rx }
    }

    /// Resolve request `id` and remove it.
    ///
    /// Returns `false` (and logs) when `id` is unknown: already settled,
    /// timed out, or never issued.
    pub fn settle(&self, id: u64, result: Result<Value>) -> bool {
        let removed = lock(&self.inner).pending.remove(&id);
        let Some(request) = removed else {
            debug!(id, "response for unknown or settled request discarded");
            return false;
        };

        request.wake.notify_one();
        debug!(
            id,
            method = %request.method,
            ok = result.is_ok(),
            elapsed_ms = u64::try_from(request.created_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "request settled"
        );
        if request.reply.send(result).is_err() {
            debug!(id, "caller stopped waiting before settlement");
        }
        true
    }

    /// Suspend the countdown of request `id`. Pausing twice is a no-op.
    ///
    /// Returns `false` when `id` is not pending.
    pub fn pause_timeout(&self, id: u64) -> bool {
        self.set_paused(id, true)
    }

    /// Restart the countdown of request `id` with the time it had left.
    /// Resuming a running request is a no-op.
    ///
    /// Returns `false` when `id` is not pending.
    pub fn resume_timeout(&self, id: u64) -> bool {
        self.set_paused(id, false)
    }

    fn set_paused(&self, id: u64, paused: bool) -> bool {
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;
        let Some(request) = inner.pending.get_mut(&id) else {
            return false;
        };
        request.paused = paused;
        request.apply(inner.hold_depth, Instant::now());
        true
    }

    /// Pause every countdown until the returned guard is dropped.
    #[must_use]
    pub fn hold(&self) -> TimeoutHold {
        let mut inner = lock(&self.inner);
        inner.hold_depth += 1;
        if inner.hold_depth == 1 {
            let now = Instant::now();
            for request in inner.pending.values_mut() {
                request.apply(1, now);
            }
            debug!("request timeouts paused");
        }
        TimeoutHold {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Settle every pending request with `error`.
    pub fn fail_all(&self, error: &AppError) {
        let drained: Vec<(u64, PendingRequest)> = lock(&self.inner).pending.drain().collect();
        if !drained.is_empty() {
            warn!(count = drained.len(), %error, "failing all pending requests");
        }
        for (id, request) in drained {
            request.wake.notify_one();
            if request.reply.send(Err(error.clone())).is_err() {
                debug!(id, "caller stopped waiting before failure");
            }
        }
    }

    /// Number of requests still in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.inner).pending.len()
    }

    /// Whether `id` is still in flight.
    #[must_use]
    pub fn is_pending(&self, id: u64) -> bool {
        lock(&self.inner).pending.contains_key(&id)
    }

    /// Time left before request `id` times out.
    ///
    /// `None` when the request is unknown or has no timeout.
    #[must_use]
    pub fn remaining(&self, id: u64) -> Option<Duration> {
        let inner = lock(&self.inner);
        let budget = inner.pending.get(&id)?.budget?;
        Some(budget.remaining_at(Instant::now()))
    }

    /// Whether request `id` currently has its countdown suspended.
    #[must_use]
    pub fn is_paused(&self, id: u64) -> bool {
        lock(&self.inner)
            .pending
            .get(&id)
            .and_then(|r| r.budget)
            .is_some_and(|b| b.running_since.is_none())
    }
}

/// Lock the shared state, recovering from a poisoned mutex.
fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Countdown task for one request.
///
/// Sleeps until the current deadline, re-reading it whenever `wake` fires
/// (pause, resume, or settlement). Exits once the request is gone.
async fn run_timer(inner: Arc<Mutex<Inner>>, id: u64, wake: Arc<Notify>) {
    loop {
        let deadline = {
            let guard = lock(&inner);
            let Some(request) = guard.pending.get(&id) else {
                return;
            };
            let Some(budget) = request.budget else {
                return;
            };
            budget.deadline()
        };

        let Some(deadline) = deadline else {
            wake.notified().await;
            continue;
        };

        tokio::select! {
            () = tokio::time::sleep_until(deadline) => {}
            () = wake.notified() => continue,
        }

        let expired = {
            let mut guard = lock(&inner);
            let due = guard
                .pending
                .get(&id)
                .and_then(|r| r.budget)
                .and_then(|b| b.deadline())
                .is_some_and(|d| d <= Instant::now());
            if due {
                guard.pending.remove(&id)
            } else {
                None
            }
        };

        if let Some(request) = expired {
            let waited = request.created_at.elapsed();
            warn!(id, method = %request.method, ?waited, "request timed out");
            let _ = request.reply.send(Err(AppError::Timeout(format!(
                "request {id} ({}) timed out",
                request.method
            ))));
            return;
        }
    }
}
