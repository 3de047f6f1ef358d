//! Unit tests for NDJSON framing, inbound line classification, and the
//! reader task.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder};
use tokio_util::sync::CancellationToken;

use acp_client::acp::codec::{AcpCodec, MAX_LINE_BYTES};
use acp_client::acp::message::{Message, RequestId};
use acp_client::acp::reader::{parse_inbound_line, run_reader, InboundLine};
use acp_client::acp::transport::TransportEvent;
use acp_client::AppError;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn next_event(rx: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("event within timeout")
        .expect("reader still sending")
}

// ── Codec ───────────────────────────────────────────────────────────────────

/// A complete line is returned without its newline.
#[test]
fn single_line_decodes() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from("{\"jsonrpc\":\"2.0\",\"method\":\"x\"}\n");

    let line = codec.decode(&mut buf).expect("decode succeeds");
    assert_eq!(line.as_deref(), Some("{\"jsonrpc\":\"2.0\",\"method\":\"x\"}"));
    assert!(codec.decode(&mut buf).expect("empty buffer").is_none());
}

/// Two lines in one buffer come out as two items.
#[test]
fn batched_lines_decode_separately() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from("{\"a\":1}\n{\"b\":2}\n");

    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"a\":1}"));
    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"b\":2}"));
    assert!(codec.decode(&mut buf).unwrap().is_none());
}

/// A fragment without its newline is held until the rest arrives.
#[test]
fn partial_line_waits_for_newline() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from("{\"method\":");

    assert!(codec.decode(&mut buf).unwrap().is_none());

    buf.extend_from_slice(b"\"x\"}\n");
    assert_eq!(
        codec.decode(&mut buf).unwrap().as_deref(),
        Some("{\"method\":\"x\"}")
    );
}

/// CRLF line endings are tolerated.
#[test]
fn carriage_return_is_stripped() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from("{\"a\":1}\r\n");
    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"a\":1}"));
}

/// An oversized line is dropped and the next line decodes normally.
#[test]
fn oversized_line_is_skipped() {
    let mut codec = AcpCodec::with_max_length(16);
    let mut buf = BytesMut::from("{\"padding\":\"0123456789abcdef\"}\n{\"ok\":1}\n");

    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"ok\":1}"));
    assert_eq!(codec.skipped_lines(), 1);
    assert!(buf.is_empty());
}

/// An oversized line arriving in pieces is discarded as it streams in,
/// without buffering it, and decoding resumes after its newline.
#[test]
fn oversized_line_across_reads_is_discarded() {
    let mut codec = AcpCodec::with_max_length(8);
    let mut buf = BytesMut::from("aaaaaaaaaaaa");

    assert!(codec.decode(&mut buf).unwrap().is_none());
    assert!(buf.is_empty(), "over-limit prefix is not retained");

    buf.extend_from_slice(b"bbbbbbbb");
    assert!(codec.decode(&mut buf).unwrap().is_none());

    buf.extend_from_slice(b"cc\n{\"a\":1}\n");
    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"a\":1}"));
    assert_eq!(codec.skipped_lines(), 1);
}

/// A line exactly at the limit is accepted, even with a CRLF ending.
#[test]
fn line_at_limit_is_accepted() {
    let mut codec = AcpCodec::with_max_length(8);
    let mut buf = BytesMut::from("12345678\r");

    assert!(codec.decode(&mut buf).unwrap().is_none());
    buf.extend_from_slice(b"\n");
    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("12345678"));
    assert_eq!(codec.skipped_lines(), 0);
}

/// Lines that are not UTF-8 are skipped rather than failing the stream.
#[test]
fn non_utf8_line_is_skipped() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from(&b"\xff\xfe\n{\"b\":2}\n"[..]);

    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"b\":2}"));
    assert_eq!(codec.skipped_lines(), 1);
}

/// A final unterminated line is still yielded at EOF.
#[test]
fn trailing_line_is_yielded_at_eof() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from("{\"last\":true}");

    assert!(codec.decode(&mut buf).unwrap().is_none());
    assert_eq!(
        codec.decode_eof(&mut buf).unwrap().as_deref(),
        Some("{\"last\":true}")
    );
    assert!(codec.decode_eof(&mut buf).unwrap().is_none());
}

/// The default limit is one mebibyte.
#[test]
fn default_limit_is_one_mebibyte() {
    assert_eq!(MAX_LINE_BYTES, 1024 * 1024);
}

/// Encoding appends exactly one newline.
#[test]
fn encode_appends_newline() {
    let mut codec = AcpCodec::new();
    let mut dst = BytesMut::new();
    codec
        .encode("{\"id\":1}".to_owned(), &mut dst)
        .expect("encode succeeds");
    assert_eq!(&dst[..], b"{\"id\":1}\n");
}

// ── Line classification ─────────────────────────────────────────────────────

#[test]
fn json_rpc_line_is_a_message() {
    let line = parse_inbound_line(r#"{"jsonrpc":"2.0","id":7,"method":"fs/read_text_file"}"#)
        .expect("classifies");
    let InboundLine::Message(Message::Request { id, method, .. }) = line else {
        panic!("expected a request, got {line:?}");
    };
    assert_eq!(id, RequestId::Number(7));
    assert_eq!(method, "fs/read_text_file");
}

#[test]
fn non_json_line_is_a_diagnostic() {
    let line = parse_inbound_line("  Loading model weights...  ").expect("classifies");
    assert_eq!(
        line,
        InboundLine::Diagnostic("Loading model weights...".to_owned())
    );
}

#[test]
fn blank_line_is_empty() {
    assert_eq!(parse_inbound_line("   ").unwrap(), InboundLine::Empty);
}

/// JSON that is not a JSON-RPC envelope is an error, not a diagnostic.
#[test]
fn json_without_envelope_is_an_error() {
    let err = parse_inbound_line(r#"{"hello":"world"}"#).unwrap_err();
    assert!(matches!(err, AppError::Acp(ref msg) if msg.contains("invalid envelope")));
}

// ── Reader task ─────────────────────────────────────────────────────────────

/// A message split over several writes is delivered once, intact, and
/// surrounding noise becomes diagnostics in arrival order.
#[tokio::test]
async fn reader_reassembles_split_messages_in_order() {
    let (mut agent, client) = tokio::io::duplex(1024);
    let (tx, mut rx) = mpsc::channel(16);
    let done = CancellationToken::new();
    tokio::spawn(run_reader(client, tx, done.clone(), CancellationToken::new()));

    agent.write_all(b"booting agent\n{\"jsonrpc\":\"2.0\",").await.unwrap();
    agent.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    agent
        .write_all(b"\"method\":\"session/update\",\"params\":{}}\n\n{bad json\n")
        .await
        .unwrap();
    agent.flush().await.unwrap();

    match next_event(&mut rx).await {
        TransportEvent::Diagnostic(text) => assert_eq!(text, "booting agent"),
        other => panic!("expected diagnostic, got {other:?}"),
    }
    match next_event(&mut rx).await {
        TransportEvent::Message(msg) => assert_eq!(msg.method(), Some("session/update")),
        other => panic!("expected message, got {other:?}"),
    }
    match next_event(&mut rx).await {
        TransportEvent::Diagnostic(text) => assert_eq!(text, "{bad json"),
        other => panic!("expected diagnostic, got {other:?}"),
    }

    drop(agent);
    match next_event(&mut rx).await {
        TransportEvent::Closed { reason } => assert_eq!(reason, "stream closed"),
        other => panic!("expected close, got {other:?}"),
    }
    tokio::time::timeout(RECV_TIMEOUT, done.cancelled())
        .await
        .expect("reader signals completion");
}

/// Invalid envelopes are skipped without ending the stream.
#[tokio::test]
async fn reader_skips_invalid_envelopes() {
    let (mut agent, client) = tokio::io::duplex(1024);
    let (tx, mut rx) = mpsc::channel(16);
    tokio::spawn(run_reader(
        client,
        tx,
        CancellationToken::new(),
        CancellationToken::new(),
    ));

    agent
        .write_all(b"{\"no\":\"envelope\"}\n{\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{}}\n")
        .await
        .unwrap();

    match next_event(&mut rx).await {
        TransportEvent::Message(Message::Response { id, outcome }) => {
            assert_eq!(id, RequestId::Number(3));
            assert!(outcome.is_ok());
        }
        other => panic!("expected response, got {other:?}"),
    }
}

/// An over-limit line from the agent is skipped and the stream stays
/// open for the messages that follow.
#[tokio::test]
async fn reader_skips_oversized_line() {
    let (mut agent, client) = tokio::io::duplex(64 * 1024);
    let (tx, mut rx) = mpsc::channel(16);
    tokio::spawn(run_reader(
        client,
        tx,
        CancellationToken::new(),
        CancellationToken::new(),
    ));

    let writer = tokio::spawn(async move {
        agent.write_all(&vec![b'x'; MAX_LINE_BYTES + 50_000]).await.unwrap();
        agent.write_all(b"\n").await.unwrap();
        agent
            .write_all(
                b"{\"jsonrpc\":\"2.0\",\"method\":\"session/update\",\"params\":{}}\n",
            )
            .await
            .unwrap();
        agent.flush().await.unwrap();
        agent
    });

    match next_event(&mut rx).await {
        TransportEvent::Message(msg) => assert_eq!(msg.method(), Some("session/update")),
        other => panic!("expected message after the oversized line, got {other:?}"),
    }

    let agent = writer.await.expect("writer task");
    drop(agent);
    match next_event(&mut rx).await {
        TransportEvent::Closed { reason } => assert_eq!(reason, "stream closed"),
        other => panic!("expected close, got {other:?}"),
    }
}

/// Cancelling the reader stops it without a close event.
#[tokio::test]
async fn cancelled_reader_exits_quietly() {
    let (_agent, client) = tokio::io::duplex(1024);
    let (tx, mut rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_reader(client, tx, CancellationToken::new(), cancel.clone()));

    cancel.cancel();
    tokio::time::timeout(RECV_TIMEOUT, handle)
        .await
        .expect("reader exits")
        .expect("reader task did not panic");
    assert!(rx.recv().await.is_none());
}
