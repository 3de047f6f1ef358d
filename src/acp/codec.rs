//! NDJSON framing for ACP agent streams.
//!
//! Each `\n`-terminated UTF-8 line is one JSON-RPC message. Partial lines
//! stay buffered until their newline arrives, so a message split across
//! any number of reads is yielded once, intact.
//!
//! Lines longer than the limit, and lines that are not UTF-8, are dropped
//! inside the codec with a warning and decoding carries on with the next
//! line. The decoder only ever fails on I/O errors, which keeps a single
//! bad line from ending a [`FramedRead`](tokio_util::codec::FramedRead)
//! stream.
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use acp_client::acp::codec::AcpCodec;
//!
//! let lines = FramedRead::new(child_stdout, AcpCodec::new());
//! ```

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::{AppError, Result};

/// Maximum inbound line length: 1 MiB, newline excluded.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Line codec with skip-and-resume on oversized input.
#[derive(Debug)]
pub struct AcpCodec {
    max_length: usize,
    /// Bytes of the buffer already searched for a newline.
    scanned: usize,
    /// Inside an oversized line; bytes are dropped up to the next newline.
    discarding: bool,
    /// Bytes dropped from the current oversized line so far.
    discarded: usize,
    /// Lines skipped since the codec was created.
    skipped: u64,
}

impl AcpCodec {
    /// Codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Codec with a custom line limit.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            scanned: 0,
            discarding: false,
            discarded: 0,
            skipped: 0,
        }
    }

    /// The configured line limit in bytes.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Number of lines dropped as oversized or not UTF-8.
    #[must_use]
    pub fn skipped_lines(&self) -> u64 {
        self.skipped
    }

    fn finish_discard(&mut self, tail: usize) {
        self.skipped += 1;
        warn!(
            bytes = self.discarded + tail,
            limit = self.max_length,
            "acp codec: oversized line skipped"
        );
        self.discarding = false;
        self.discarded = 0;
    }

    /// Turn raw line bytes (newline already removed) into a `String`, or
    /// `None` when the line is skipped.
    fn take_line(&mut self, raw: &[u8]) -> Option<String> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.len() > self.max_length {
            self.discarded = 0;
            self.finish_discard(raw.len());
            return None;
        }
        if let Ok(text) = std::str::from_utf8(raw) {
            Some(text.to_owned())
        } else {
            self.skipped += 1;
            warn!(bytes = raw.len(), "acp codec: non UTF-8 line skipped");
            None
        }
    }
}

impl Default for AcpCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AcpCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        loop {
            let newline = src[self.scanned..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.scanned + offset);

            match (self.discarding, newline) {
                (true, Some(end)) => {
                    src.advance(end + 1);
                    self.scanned = 0;
                    self.finish_discard(end);
                }
                (true, None) => {
                    self.discarded += src.len();
                    src.clear();
                    self.scanned = 0;
                    return Ok(None);
                }
                (false, Some(end)) => {
                    let line = src.split_to(end + 1);
                    self.scanned = 0;
                    if let Some(text) = self.take_line(&line[..end]) {
                        return Ok(Some(text));
                    }
                }
                (false, None) if src.len() > self.max_length + 1 => {
                    // One extra byte leaves room for a trailing `\r`.
                    self.discarding = true;
                    self.discarded = src.len();
                    src.clear();
                    self.scanned = 0;
                    return Ok(None);
                }
                (false, None) => {
                    self.scanned = src.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.scanned = 0;
        if self.discarding {
            let tail = src.len();
            src.clear();
            self.finish_discard(tail);
            return Ok(None);
        }
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split();
        Ok(self.take_line(&rest))
    }
}

impl Encoder<String> for AcpCodec {
    type Error = AppError;

    /// Append `item` and a single `\n`. The limit applies to decoding only.
    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
