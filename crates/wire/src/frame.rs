// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prefix-tagged IPC frames carried over child process stdio.
//!
//! Wire format: one line per frame, `@@HV-IPC@@ ` followed by a JSON
//! envelope `{source, target, type, payload}`. Lines without the prefix are
//! ordinary process output.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{write_line, LineReader, ProtocolError};
use crate::message::ShutdownData;

/// Marks a stdout line as an IPC frame.
pub const FRAME_PREFIX: &str = "@@HV-IPC@@";

/// Envelope types understood by the supervisor itself.
pub mod kinds {
    pub const READY: &str = "ready";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const SHUTDOWN: &str = "shutdown";
}

/// A managed child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessName {
    Crawler,
    Backend,
}

hv_core::simple_display! {
    ProcessName {
        Crawler => "crawler",
        Backend => "backend",
    }
}

impl ProcessName {
    pub const ALL: [ProcessName; 2] = [ProcessName::Crawler, ProcessName::Backend];
}

/// Sender of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Peer {
    Supervisor,
    Crawler,
    Backend,
}

impl Peer {
    pub fn process(self) -> Option<ProcessName> {
        match self {
            Peer::Supervisor => None,
            Peer::Crawler => Some(ProcessName::Crawler),
            Peer::Backend => Some(ProcessName::Backend),
        }
    }
}

impl From<ProcessName> for Peer {
    fn from(name: ProcessName) -> Self {
        match name {
            ProcessName::Crawler => Peer::Crawler,
            ProcessName::Backend => Peer::Backend,
        }
    }
}

/// Recipient of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Supervisor,
    Broadcast,
    Crawler,
    Backend,
}

impl From<ProcessName> for Target {
    fn from(name: ProcessName) -> Self {
        match name {
            ProcessName::Crawler => Target::Crawler,
            ProcessName::Backend => Target::Backend,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub source: Peer,
    pub target: Target,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    pub fn new(source: Peer, target: Target, kind: impl Into<String>, payload: Value) -> Self {
        Self { source, target, kind: kind.into(), payload }
    }

    /// Broadcast from the supervisor asking every child to stop.
    pub fn shutdown(grace: Duration) -> Self {
        let data = ShutdownData { timeout_seconds: grace.as_secs(), reason: None };
        Self::new(
            Peer::Supervisor,
            Target::Broadcast,
            kinds::SHUTDOWN,
            serde_json::to_value(data).unwrap_or(Value::Null),
        )
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// Serialize an envelope as a prefixed line (without the newline).
pub fn encode_frame(envelope: &Envelope) -> Result<String, ProtocolError> {
    Ok(format!("{} {}", FRAME_PREFIX, serde_json::to_string(envelope)?))
}

/// Parse one stdout line. `Ok(None)` means the line is not a frame.
pub fn parse_line(line: &str) -> Result<Option<Envelope>, ProtocolError> {
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let Some(body) = line.strip_prefix(FRAME_PREFIX) else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_str(body.trim_start())?))
}

/// One line read from a child process.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Frame(Envelope),
    /// Unprefixed output.
    Log(String),
    /// Prefixed but unparseable.
    Malformed { raw: String, error: String },
}

/// Reads frames and log lines from a process stream.
pub struct FrameReader<R> {
    lines: LineReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: LineReader::new(reader) }
    }

    /// Next line, or `None` at end of stream.
    ///
    /// Only I/O failures and oversized lines are returned as errors;
    /// a malformed frame is reported in-band so the read loop keeps going.
    pub async fn next(&mut self) -> Result<Option<Line>, ProtocolError> {
        let Some(raw) = self.lines.next_line().await? else {
            return Ok(None);
        };
        Ok(Some(match parse_line(&raw) {
            Ok(Some(envelope)) => Line::Frame(envelope),
            Ok(None) => Line::Log(raw),
            Err(e) => Line::Malformed { raw, error: e.to_string() },
        }))
    }
}

/// Write one frame line and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    envelope: &Envelope,
) -> Result<(), ProtocolError> {
    write_line(writer, &encode_frame(envelope)?).await
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
