//! Newline-delimited JSON codec for envelopes.
//!
//! Each envelope occupies exactly one line. A line that fails to decode is
//! discarded through its terminating newline and the reader resumes on the
//! next line, so one bad message never wedges the stream.

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::envelope::Envelope;

pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed envelope: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
        /// Salvaged from the raw object when it was valid JSON.
        correlation_id: Option<String>,
    },

    #[error("line exceeds {max} bytes")]
    LineTooLong { max: usize },

    #[error("input error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}

impl CodecError {
    /// Correlation id to answer with, when one could be recovered.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            CodecError::Malformed { correlation_id, .. } => correlation_id.as_deref(),
            _ => None,
        }
    }
}

/// Reads envelopes from a line-oriented byte stream.
pub struct EnvelopeReader<R> {
    reader: R,
    line: Vec<u8>,
    max_line_bytes: usize,
}

impl<R: AsyncBufRead + Unpin> EnvelopeReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_line_bytes(reader, DEFAULT_MAX_LINE_BYTES)
    }

    pub fn with_max_line_bytes(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader,
            line: Vec::new(),
            max_line_bytes,
        }
    }

    /// Next envelope, `Ok(None)` at end of input. Blank lines are skipped.
    ///
    /// After `Err(Malformed | LineTooLong)` the offending line has been fully
    /// consumed and the reader can be polled again. `Err(Io)` is terminal.
    pub async fn next_envelope(&mut self) -> Result<Option<Envelope>, CodecError> {
        loop {
            if !self.read_line().await? {
                return Ok(None);
            }
            let trimmed = self.line.trim_ascii();
            if trimmed.is_empty() {
                continue;
            }
            return decode_slice(trimmed).map(Some);
        }
    }

    /// Fill `self.line` with the next line (newline stripped). Returns false
    /// at end of input.
    async fn read_line(&mut self) -> Result<bool, CodecError> {
        self.line.clear();
        let mut overflowed = false;
        let mut saw_bytes = false;

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            saw_bytes = true;

            let (chunk_len, consumed, done) = match available.iter().position(|b| *b == b'\n') {
                Some(pos) => (pos, pos + 1, true),
                None => (available.len(), available.len(), false),
            };

            if !overflowed {
                if self.line.len() + chunk_len > self.max_line_bytes {
                    overflowed = true;
                    self.line.clear();
                } else {
                    self.line.extend_from_slice(&available[..chunk_len]);
                }
            }

            self.reader.consume(consumed);
            if done {
                break;
            }
        }

        if overflowed {
            return Err(CodecError::LineTooLong {
                max: self.max_line_bytes,
            });
        }
        Ok(saw_bytes)
    }
}

/// Decode a single JSON line into an envelope.
pub fn decode_line(line: &str) -> Result<Envelope, CodecError> {
    decode_slice(line.as_bytes())
}

/// Decode raw line bytes. Invalid UTF-8 is malformed, never replaced.
pub fn decode_slice(line: &[u8]) -> Result<Envelope, CodecError> {
    let value: Value = serde_json::from_slice(line).map_err(|source| CodecError::Malformed {
        source,
        correlation_id: None,
    })?;
    let correlation_id = value
        .get("correlationId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    serde_json::from_value(value).map_err(|source| CodecError::Malformed {
        source,
        correlation_id,
    })
}

/// Serialize an envelope as one newline-terminated line.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    let mut bytes = serde_json::to_vec(envelope).map_err(CodecError::Encode)?;
    bytes.push(b'\n');
    Ok(bytes)
}
