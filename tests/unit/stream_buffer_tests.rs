//! Unit tests for the streaming chunk coalescer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use acp_client::orchestrator::stream_buffer::{
    StreamFlush, StreamingBuffer, StreamingConfig, DEFAULT_FLUSH_INTERVAL, DEFAULT_MAX_CHUNKS,
};

type Flushes = Arc<Mutex<Vec<StreamFlush<&'static str>>>>;

fn buffer(flush_interval: Duration, max_chunks: usize) -> (StreamingBuffer<&'static str>, Flushes) {
    let flushes: Flushes = Arc::default();
    let sink = Arc::clone(&flushes);
    let buffer = StreamingBuffer::new(
        StreamingConfig {
            flush_interval,
            max_chunks,
        },
        Arc::new(move |flush| sink.lock().unwrap().push(flush)),
    );
    (buffer, flushes)
}

#[test]
fn defaults_match_documented_thresholds() {
    let config = StreamingConfig::default();
    assert_eq!(config.flush_interval, Duration::from_millis(300));
    assert_eq!(config.max_chunks, 20);
    assert_eq!(config.flush_interval, DEFAULT_FLUSH_INTERVAL);
    assert_eq!(config.max_chunks, DEFAULT_MAX_CHUNKS);
}

/// Reaching the chunk threshold flushes immediately with the delta since
/// the previous flush.
#[tokio::test]
async fn chunk_threshold_forces_flush() {
    let (buffer, flushes) = buffer(Duration::from_secs(60), 3);

    for chunk in ["a", "b", "c", "d"] {
        buffer.push(&"msg", chunk);
    }

    let got = flushes.lock().unwrap().clone();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].content, "abc");
    assert_eq!(got[0].delta, "abc");
    assert_eq!(got[0].chunk_count, 3);
    assert!(!got[0].is_final);
}

/// A quiet stream is flushed once the interval elapses.
#[tokio::test]
async fn interval_flushes_quiet_stream() {
    let (buffer, flushes) = buffer(Duration::from_millis(30), 100);

    buffer.push(&"msg", "Hel");
    buffer.push(&"msg", "lo");
    assert!(flushes.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(120)).await;

    let got = flushes.lock().unwrap().clone();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].delta, "Hello");
    assert_eq!(got[0].chunk_count, 2);
}

/// `end` emits the final flush synchronously and concatenated deltas equal
/// the full content.
#[tokio::test]
async fn end_flushes_remaining_text() {
    let (buffer, flushes) = buffer(Duration::from_secs(60), 2);

    for chunk in ["The ", "quick ", "brown ", "fox"] {
        buffer.push(&"msg", chunk);
    }
    buffer.push(&"msg", ".");
    assert!(buffer.end(&"msg"));
    assert!(!buffer.is_active(&"msg"));

    let got = flushes.lock().unwrap().clone();
    let last = got.last().expect("final flush");
    assert!(last.is_final);
    assert_eq!(last.delta, ".");
    assert_eq!(last.content, "The quick brown fox.");

    let joined: String = got.iter().map(|f| f.delta.as_str()).collect();
    assert_eq!(joined, "The quick brown fox.");
}

#[test]
fn ending_unknown_stream_is_a_no_op() {
    let (buffer, flushes) = buffer(Duration::from_secs(60), 20);
    assert!(!buffer.end(&"missing"));
    assert!(flushes.lock().unwrap().is_empty());
}

/// Keys have independent counters.
#[tokio::test]
async fn streams_are_independent() {
    let (buffer, flushes) = buffer(Duration::from_secs(60), 2);

    buffer.push(&"reply", "a");
    buffer.push(&"thought", "x");
    buffer.push(&"reply", "b");

    let got = flushes.lock().unwrap().clone();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].key, "reply");
    assert_eq!(got[0].content, "ab");
    assert!(buffer.is_active(&"thought"));
}

/// A discarded stream never delivers its pending text, even after its timer
/// fires.
#[tokio::test]
async fn discard_drops_pending_text() {
    let (buffer, flushes) = buffer(Duration::from_millis(20), 100);

    buffer.push(&"msg", "partial");
    buffer.discard(&"msg");
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(flushes.lock().unwrap().is_empty());
    assert!(!buffer.end(&"msg"));
}

/// `end_all` closes every open stream.
#[tokio::test]
async fn end_all_closes_every_stream() {
    let (buffer, flushes) = buffer(Duration::from_secs(60), 100);

    buffer.push(&"reply", "a");
    buffer.push(&"thought", "b");
    buffer.end_all();

    let got = flushes.lock().unwrap().clone();
    assert_eq!(got.len(), 2);
    assert!(got.iter().all(|f| f.is_final));
    assert!(!buffer.is_active(&"reply"));
    assert!(!buffer.is_active(&"thought"));
}

/// Outside a runtime the buffer still works; chunks wait for a threshold or
/// `end`.
#[test]
fn works_without_a_runtime() {
    let (buffer, flushes) = buffer(Duration::from_millis(1), 100);
    buffer.push(&"msg", "hi");
    assert!(buffer.end(&"msg"));
    assert_eq!(flushes.lock().unwrap()[0].content, "hi");
}
