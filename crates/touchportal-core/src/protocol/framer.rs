//! Line framing for the newline-delimited JSON stream.
//!
//! # Why a buffer is needed
//!
//! TCP is a stream protocol.  A single `read()` may return half a message,
//! several messages, or several messages followed by half of the next one.
//! Even a line ending can be cut in two: the host may write `...}\r` in one
//! segment and `\n{...` in the next.
//!
//! [`LineFramer`] keeps whatever is left after the last line ending and
//! prepends it to the next chunk, so callers can feed chunks of any size and
//! always get the same lines back as if the whole stream had arrived at once.
//!
//! # Line endings
//!
//! CRLF, CR and LF all end a line.  A CR is acted on immediately (the line
//! before it is released without waiting for a possible LF), and a LF that
//! directly follows a CR, even in the next chunk, is swallowed as part of the
//! same boundary.  Empty lines are never returned.
//!
//! Framing works on bytes, not `str`, so a multi-byte UTF-8 character that is
//! split across two reads is reassembled before the line is decoded.  CR and
//! LF never occur inside a multi-byte UTF-8 sequence, so splitting on them is
//! always safe.

use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::protocol::messages::MessageRecord;

/// Errors for a single framed line.
///
/// A `FrameError` only ever concerns one line.  The framer keeps going with
/// the next line after reporting it.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The line is not valid JSON (or not valid UTF-8).
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The line is valid JSON but not an object.
    #[error("message is not a JSON object")]
    NotAnObject,

    /// The object has no string `type` field.
    #[error("message has no string `type` field")]
    MissingType,
}

fn is_boundary(byte: &u8) -> bool {
    matches!(byte, b'\r' | b'\n')
}

// ── LineFramer ────────────────────────────────────────────────────────────────

/// Splits a chunked byte stream into complete, non-empty lines.
///
/// # Example
///
/// ```rust
/// use touchportal_core::LineFramer;
///
/// let mut framer = LineFramer::new();
/// assert_eq!(framer.feed(b"{\"a\":1}\r").count(), 1);
/// // The LF completing the CRLF above is not a second boundary.
/// let lines: Vec<Vec<u8>> = framer.feed(b"\n{\"b\":2}\n").collect();
/// assert_eq!(lines, vec![b"{\"b\":2}".to_vec()]);
/// ```
#[derive(Debug, Default)]
pub struct LineFramer {
    /// Bytes received; everything before `start` has already been released.
    pending: Vec<u8>,
    /// Offset of the first byte not yet released as part of a line.
    start: usize,
    /// How much of `pending` is known to contain no line ending.
    scanned: usize,
    /// The last boundary was a CR, so a leading LF belongs to it.
    after_cr: bool,
}

impl LineFramer {
    /// Creates an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk to the internal buffer without extracting lines.
    ///
    /// Bytes of lines already released are dropped here, once per chunk.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.start > 0 {
            self.pending.drain(..self.start);
            self.scanned = self.scanned.saturating_sub(self.start);
            self.start = 0;
        }
        self.pending.extend_from_slice(chunk);
    }

    /// Appends `chunk` and returns a lazy iterator over every line that is
    /// now complete.
    ///
    /// Lines the iterator does not get to (because it was dropped early) stay
    /// buffered and are returned by the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Lines<'_> {
        self.push(chunk);
        Lines { framer: self }
    }

    /// Removes and returns the next complete, non-empty line without its
    /// terminator, or `None` if more data is needed.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            if self.after_cr && self.start < self.pending.len() {
                if self.pending[self.start] == b'\n' {
                    self.start += 1;
                }
                self.after_cr = false;
            }

            let from = self.scanned.max(self.start);
            let end = match self.pending[from..].iter().position(is_boundary) {
                Some(offset) => from + offset,
                None => {
                    self.scanned = self.pending.len();
                    return None;
                }
            };

            let terminator = self.pending[end];
            let line = self.pending[self.start..end].to_vec();
            self.start = end + 1;
            self.scanned = self.start;
            self.after_cr = terminator == b'\r';

            if !line.is_empty() {
                trace!(len = line.len(), "framed line");
                return Some(line);
            }
        }
    }

    /// Number of buffered bytes that do not yet form a complete line.
    pub fn pending_len(&self) -> usize {
        self.pending.len() - self.start
    }
}

/// Iterator returned by [`LineFramer::feed`].
#[derive(Debug)]
pub struct Lines<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for Lines<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        self.framer.next_line()
    }
}

// ── Record decoding ───────────────────────────────────────────────────────────

/// Decodes one framed line into a [`MessageRecord`].
///
/// # Errors
///
/// Returns [`FrameError`] if the line is not a JSON object with a string
/// `type` field.
pub fn decode_record(line: &[u8]) -> Result<MessageRecord, FrameError> {
    let value: Value = serde_json::from_slice(line)?;
    MessageRecord::try_from(value)
}

/// A [`LineFramer`] that decodes each line as it is released.
#[derive(Debug, Default)]
pub struct RecordFramer {
    lines: LineFramer,
}

impl RecordFramer {
    /// Creates an empty record framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and lazily yields one decode result per complete line.
    ///
    /// A line that fails to decode yields `Err` for that line only; iteration
    /// continues with the following lines.
    pub fn feed(&mut self, chunk: &[u8]) -> Records<'_> {
        self.lines.push(chunk);
        Records {
            lines: &mut self.lines,
        }
    }

    /// Number of buffered bytes that do not yet form a complete line.
    pub fn pending_len(&self) -> usize {
        self.lines.pending_len()
    }
}

/// Iterator returned by [`RecordFramer::feed`].
#[derive(Debug)]
pub struct Records<'a> {
    lines: &'a mut LineFramer,
}

impl Iterator for Records<'_> {
    type Item = Result<MessageRecord, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.next_line().map(|line| decode_record(&line))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
