//! Coalescing buffer for high-frequency streamed chunks.
//!
//! Agents emit `agent_message_chunk` notifications at whatever rate the
//! model produces tokens. Forwarding each one to a UI is wasteful, so the
//! [`StreamingBuffer`] accumulates chunks per stream key and emits a
//! [`StreamFlush`] when either:
//!
//! - the flush interval has elapsed since the last flush, or
//! - the number of unflushed chunks reaches the threshold.
//!
//! [`end`](StreamingBuffer::end) always flushes synchronously, so the final
//! text is delivered before the caller moves on. Streams are independent:
//! each key has its own counters and timer.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, trace_span, Instrument};

/// Default time between flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(300);
/// Default number of chunks that forces a flush.
pub const DEFAULT_MAX_CHUNKS: usize = 20;

/// Flush thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingConfig {
    /// Flush once this long has passed since the previous flush.
    pub flush_interval: Duration,
    /// Flush once this many chunks are pending.
    pub max_chunks: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }
}

/// One delivery from the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFlush<K> {
    /// Stream this flush belongs to.
    pub key: K,
    /// Everything received on the stream so far.
    pub content: String,
    /// Text received since the previous flush.
    pub delta: String,
    /// Number of chunks covered by this flush.
    pub chunk_count: usize,
    /// `true` for the flush emitted by [`StreamingBuffer::end`].
    pub is_final: bool,
}

/// Receiver of flushes. Called outside the buffer's lock.
pub type FlushSink<K> = Arc<dyn Fn(StreamFlush<K>) + Send + Sync>;

struct StreamState {
    content: String,
    flushed_len: usize,
    pending_chunks: usize,
    last_flush: Instant,
    timer_armed: bool,
    generation: u64,
}

impl StreamState {
    fn new(now: Instant) -> Self {
        Self {
            content: String::new(),
            flushed_len: 0,
            pending_chunks: 0,
            last_flush: now,
            timer_armed: false,
            generation: 0,
        }
    }

    fn take_flush<K>(&mut self, key: K, is_final: bool, now: Instant) -> StreamFlush<K> {
        let flush = StreamFlush {
            key,
            content: self.content.clone(),
            delta: self.content[self.flushed_len..].to_owned(),
            chunk_count: self.pending_chunks,
            is_final,
        };
        self.flushed_len = self.content.len();
        self.pending_chunks = 0;
        self.last_flush = now;
        self.timer_armed = false;
        self.generation += 1;
        flush
    }
}

struct Shared<K> {
    config: StreamingConfig,
    sink: FlushSink<K>,
    streams: Mutex<HashMap<K, StreamState>>,
}

impl<K> Shared<K> {
    fn streams(&self) -> MutexGuard<'_, HashMap<K, StreamState>> {
        self.streams
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Per-key chunk coalescer.
pub struct StreamingBuffer<K> {
    shared: Arc<Shared<K>>,
}

impl<K> Clone for StreamingBuffer<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K> std::fmt::Debug for StreamingBuffer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingBuffer")
            .field("config", &self.shared.config)
            .field("streams", &self.shared.streams().len())
            .finish()
    }
}

impl<K> StreamingBuffer<K>
where
    K: Clone + Eq + Hash + std::fmt::Debug + Send + Sync + 'static,
{
    /// Create a buffer delivering to `sink`.
    #[must_use]
    pub fn new(config: StreamingConfig, sink: FlushSink<K>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                sink,
                streams: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Thresholds in use.
    #[must_use]
    pub fn config(&self) -> StreamingConfig {
        self.shared.config
    }

    /// Add a chunk to stream `key`, flushing if a threshold is reached.
    ///
    /// When no threshold is reached a timer is armed so the chunk is
    /// delivered within one flush interval even if the stream goes quiet.
    pub fn push(&self, key: &K, chunk: &str) {
        let now = Instant::now();
        let config = self.shared.config;

        let (flush, arm) = {
            let mut streams = self.shared.streams();
            let state = streams
                .entry(key.clone())
                .or_insert_with(|| StreamState::new(now));
            state.content.push_str(chunk);
            state.pending_chunks += 1;

            let due = state.pending_chunks >= config.max_chunks
                || now.saturating_duration_since(state.last_flush) >= config.flush_interval;
            if due {
                (Some(state.take_flush(key.clone(), false, now)), None)
            } else if state.timer_armed {
                (None, None)
            } else {
                state.timer_armed = true;
                (None, Some((state.last_flush + config.flush_interval, state.generation)))
            }
        };

        if let Some(flush) = flush {
            trace!(key = ?flush.key, chunks = flush.chunk_count, "stream flush (threshold)");
            (self.shared.sink)(flush);
        } else if let Some((deadline, generation)) = arm {
            self.arm_timer(key.clone(), deadline, generation);
        }
    }

    fn arm_timer(&self, key: K, deadline: Instant, generation: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(?key, "no runtime for stream timer; chunks wait for the next threshold");
            return;
        };
        let shared = Arc::clone(&self.shared);
        let span = trace_span!("stream_timer", key = ?key);
        runtime.spawn(
            async move {
                tokio::time::sleep_until(deadline).await;
                let flush = {
                    let mut streams = shared.streams();
                    match streams.get_mut(&key) {
                        Some(state) if state.generation == generation && state.pending_chunks > 0 => {
                            Some(state.take_flush(key.clone(), false, Instant::now()))
                        }
                        _ => None,
                    }
                };
                if let Some(flush) = flush {
                    trace!(chunks = flush.chunk_count, "stream flush (interval)");
                    (shared.sink)(flush);
                }
            }
            .instrument(span),
        );
    }

    /// Close stream `key`, synchronously emitting its final flush.
    ///
    /// Returns `false` when the stream never received a chunk.
    pub fn end(&self, key: &K) -> bool {
        let flush = self
            .shared
            .streams()
            .remove(key)
            .map(|mut state| state.take_flush(key.clone(), true, Instant::now()));
        match flush {
            Some(flush) => {
                (self.shared.sink)(flush);
                true
            }
            None => false,
        }
    }

    /// Close every open stream.
    pub fn end_all(&self) {
        let keys: Vec<K> = self.shared.streams().keys().cloned().collect();
        for key in keys {
            self.end(&key);
        }
    }

    /// Drop stream `key` without flushing what is still pending.
    pub fn discard(&self, key: &K) {
        if self.shared.streams().remove(key).is_some() {
            debug!(?key, "stream discarded");
        }
    }

    /// Whether stream `key` has received chunks and not been ended.
    #[must_use]
    pub fn is_active(&self, key: &K) -> bool {
        self.shared.streams().contains_key(key)
    }
}
