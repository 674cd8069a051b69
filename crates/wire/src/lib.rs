// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocols for harvest processes.
//!
//! Two channels share one newline-delimited codec: prefix-tagged envelopes on
//! child stdio (supervisor routing) and typed JSON messages on the
//! backend/crawler socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod codec;
mod frame;
mod message;
mod validate;

pub use codec::{
    read_json_line, write_json_line, write_line, LineReader, ProtocolError, DEFAULT_MAX_LINE_BYTES,
};
pub use frame::{
    encode_frame, kinds, parse_line, write_frame, Envelope, FrameReader, Line, Peer, ProcessName,
    Target, FRAME_PREFIX,
};
pub use message::{
    HeartbeatData, JobAssignmentData, JobCompletedData, JobFailedData, JobProgressData,
    JobRequestData, JobStartedData, JobsDiscoveredData, Message, MessageBody, MessageError,
    MessageKind, ShutdownData, SystemStatus, TokenRefreshRequestData, TokenRefreshResponseData,
    WireMessage,
};
pub use validate::{
    ValidationCategory, ValidationError, ValidationStats, Validator, ValidatorConfig,
};
