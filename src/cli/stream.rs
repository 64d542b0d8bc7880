//! Line framing and parsing for Claude Code stdout.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::cli::StreamMessage;
use crate::error::{Error, Result};

/// Initial read buffer size.
pub const INITIAL_BUFFER_BYTES: usize = 256 * 1024;

/// Longest line accepted before it is skipped as oversized.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Parse a single line of stream-json output.
///
/// # Errors
///
/// Returns `Error::Parse` carrying the line if the JSON is invalid or has no
/// `type` field.
pub fn parse_line(line: &str) -> Result<StreamMessage> {
    serde_json::from_str(line).map_err(|e| Error::parse(line, e))
}

/// Splits an async byte stream into lines with a per-line size cap.
///
/// Lines longer than the cap are consumed up to their newline and reported
/// as [`Error::LineTooLong`]; the next call continues with the following
/// line. Invalid UTF-8 is replaced rather than rejected.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: BufReader<R>,
    line: Vec<u8>,
    max_line: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wrap a reader with the default limits.
    pub fn new(reader: R) -> Self {
        Self::with_max_line(reader, MAX_LINE_BYTES)
    }

    /// Wrap a reader with a custom per-line cap.
    pub fn with_max_line(reader: R, max_line: usize) -> Self {
        Self {
            inner: BufReader::with_capacity(INITIAL_BUFFER_BYTES, reader),
            line: Vec::new(),
            max_line,
        }
    }

    /// Read the next line without its terminator.
    ///
    /// Returns `Ok(None)` at end of input. A final line without a trailing
    /// newline is still returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::LineTooLong` for an oversized line and `Error::Io` if
    /// the underlying read fails.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        self.line.clear();
        let mut discarded = 0usize;

        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                if discarded > 0 {
                    return Err(self.too_long(discarded));
                }
                if self.line.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_line()));
            }

            let newline = available.iter().position(|&b| b == b'\n');
            let (piece, used) = match newline {
                Some(i) => (&available[..i], i + 1),
                None => (available, available.len()),
            };

            if discarded > 0 || self.line.len() + piece.len() > self.max_line {
                discarded += self.line.len() + piece.len();
                self.line.clear();
            } else {
                self.line.extend_from_slice(piece);
            }
            self.inner.consume(used);

            if newline.is_some() {
                if discarded > 0 {
                    return Err(self.too_long(discarded));
                }
                return Ok(Some(self.take_line()));
            }
        }
    }

    /// Read the next non-blank line and parse it.
    ///
    /// # Errors
    ///
    /// Returns the line framing errors of [`next_line`](Self::next_line) and
    /// `Error::Parse` for malformed lines. All of them leave the reader
    /// positioned at the next line.
    pub async fn next_message(&mut self) -> Result<Option<StreamMessage>> {
        loop {
            match self.next_line().await? {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => {}
                Some(line) => return parse_line(&line).map(Some),
            }
        }
    }

    fn take_line(&mut self) -> String {
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        line
    }

    fn too_long(&self, len: usize) -> Error {
        tracing::warn!(line_len = len, limit = self.max_line, "Skipping oversized line");
        Error::LineTooLong {
            len,
            limit: self.max_line,
        }
    }
}

/// Read messages from any async reader as a stream.
///
/// Parse and oversized-line errors are yielded in place and the stream keeps
/// going; an I/O error is yielded once and ends the stream.
pub fn read_messages<R>(reader: R) -> impl futures_core::Stream<Item = Result<StreamMessage>>
where
    R: AsyncRead + Unpin,
{
    futures_util::stream::unfold(Some(LineReader::new(reader)), |state| async move {
        let mut reader = state?;
        match reader.next_message().await {
            Ok(Some(msg)) => Some((Ok(msg), Some(reader))),
            Ok(None) => None,
            Err(e @ Error::Io(_)) => Some((Err(e), None)),
            Err(e) => Some((Err(e), Some(reader))),
        }
    })
}
