// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Newline-delimited line codec shared by the stdio and socket transports.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

/// Default upper bound for a single line (1 MiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line exceeds {limit} bytes")]
    MessageTooLarge { limit: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// Reads newline-terminated lines with a size bound.
///
/// An oversized line is drained up to its newline and reported as
/// [`ProtocolError::MessageTooLarge`]; the reader stays usable afterwards.
pub struct LineReader<R> {
    inner: BufReader<R>,
    max_bytes: usize,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_limit(reader, DEFAULT_MAX_LINE_BYTES)
    }

    pub fn with_limit(reader: R, max_bytes: usize) -> Self {
        Self { inner: BufReader::new(reader), max_bytes, buf: Vec::new() }
    }

    /// Next line without its terminator, or `None` at end of stream.
    pub async fn next_line(&mut self) -> Result<Option<String>, ProtocolError> {
        self.buf.clear();
        let limit = self.max_bytes as u64 + 1;
        let read = (&mut self.inner).take(limit).read_until(b'\n', &mut self.buf).await?;
        if read == 0 {
            return Ok(None);
        }

        let terminated = self.buf.last() == Some(&b'\n');
        if terminated {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        if self.buf.len() > self.max_bytes {
            if !terminated {
                discard_line(&mut self.inner).await?;
            }
            return Err(ProtocolError::MessageTooLarge { limit: self.max_bytes });
        }

        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<()> {
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
            reader.consume(pos + 1);
            return Ok(());
        }
        let len = buf.len();
        reader.consume(len);
    }
}

/// Write one line and flush. A trailing newline is appended.
pub async fn write_line<W: AsyncWrite + Unpin>(
    writer: &mut W,
    line: &str,
) -> Result<(), ProtocolError> {
    let mut bytes = Vec::with_capacity(line.len() + 1);
    bytes.extend_from_slice(line.trim_end_matches('\n').as_bytes());
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and decode the next JSON line, or `None` at end of stream.
pub async fn read_json_line<R, T>(reader: &mut LineReader<R>) -> Result<Option<T>, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match reader.next_line().await? {
        Some(line) => Ok(Some(serde_json::from_str(&line)?)),
        None => Ok(None),
    }
}

/// Encode a value as one JSON line and flush.
pub async fn write_json_line<W, T>(writer: &mut W, value: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    write_line(writer, &serde_json::to_string(value)?).await
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
