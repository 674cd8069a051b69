// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket messages exchanged between the backend and the crawler.
//!
//! On the wire every message is `{type, timestamp, jobId?, data}`. In memory
//! the `type`/`data` pair is a [`MessageBody`] variant with its own payload
//! shape; [`WireMessage`] is the raw form the validator inspects.

use chrono::{DateTime, SecondsFormat, Utc};
use hv_core::{
    AccountId, Clock, DiscoveredArea, EntityProgress, JobCommand, JobId, ProgressUpdate,
    ResumeState,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Raw message shape, before typed decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    #[serde(rename = "jobId", default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),

    #[error("invalid {kind} payload: {source}")]
    Body {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A decoded socket message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireMessage", into = "WireMessage")]
pub struct Message {
    pub timestamp: DateTime<Utc>,
    pub job_id: Option<JobId>,
    pub body: MessageBody,
}

impl Message {
    pub fn new(timestamp: DateTime<Utc>, body: MessageBody) -> Self {
        Self { timestamp, job_id: None, body }
    }

    /// Stamp a message with the clock's current time.
    pub fn now(clock: &impl Clock, body: MessageBody) -> Self {
        Self::new(clock.utc(), body)
    }

    pub fn for_job(mut self, job_id: impl Into<JobId>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl TryFrom<WireMessage> for Message {
    type Error = MessageError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let timestamp = DateTime::parse_from_rfc3339(&wire.timestamp)
            .map_err(|_| MessageError::Timestamp(wire.timestamp.clone()))?
            .with_timezone(&Utc);
        let data = match wire.data {
            Value::Null => Value::Object(Default::default()),
            data => data,
        };
        let tagged = serde_json::json!({ "type": wire.kind, "data": data });
        let body = serde_json::from_value(tagged)
            .map_err(|source| MessageError::Body { kind: wire.kind.clone(), source })?;
        Ok(Message { timestamp, job_id: wire.job_id.map(JobId::from), body })
    }
}

impl From<Message> for WireMessage {
    fn from(message: Message) -> Self {
        let kind = message.body.kind().as_str().to_string();
        let data = match serde_json::to_value(&message.body) {
            Ok(Value::Object(mut map)) => map.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        };
        WireMessage {
            kind,
            timestamp: message.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            job_id: message.job_id.map(|id| id.to_string()),
            data,
        }
    }
}

/// Message payloads keyed by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MessageBody {
    Heartbeat(HeartbeatData),
    JobStarted(JobStartedData),
    JobProgress(JobProgressData),
    JobCompleted(JobCompletedData),
    JobFailed(JobFailedData),
    JobsDiscovered(JobsDiscoveredData),
    TokenRefreshRequest(TokenRefreshRequestData),
    JobRequest(JobRequestData),
    JobAssignment(JobAssignmentData),
    TokenRefreshResponse(TokenRefreshResponseData),
    Shutdown(ShutdownData),
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageBody::Heartbeat(_) => MessageKind::Heartbeat,
            MessageBody::JobStarted(_) => MessageKind::JobStarted,
            MessageBody::JobProgress(_) => MessageKind::JobProgress,
            MessageBody::JobCompleted(_) => MessageKind::JobCompleted,
            MessageBody::JobFailed(_) => MessageKind::JobFailed,
            MessageBody::JobsDiscovered(_) => MessageKind::JobsDiscovered,
            MessageBody::TokenRefreshRequest(_) => MessageKind::TokenRefreshRequest,
            MessageBody::JobRequest(_) => MessageKind::JobRequest,
            MessageBody::JobAssignment(_) => MessageKind::JobAssignment,
            MessageBody::TokenRefreshResponse(_) => MessageKind::TokenRefreshResponse,
            MessageBody::Shutdown(_) => MessageKind::Shutdown,
        }
    }
}

/// Tag-only view of [`MessageBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    Heartbeat,
    JobStarted,
    JobProgress,
    JobCompleted,
    JobFailed,
    JobsDiscovered,
    TokenRefreshRequest,
    JobRequest,
    JobAssignment,
    TokenRefreshResponse,
    Shutdown,
}

impl MessageKind {
    pub const ALL: [MessageKind; 11] = [
        MessageKind::Heartbeat,
        MessageKind::JobStarted,
        MessageKind::JobProgress,
        MessageKind::JobCompleted,
        MessageKind::JobFailed,
        MessageKind::JobsDiscovered,
        MessageKind::TokenRefreshRequest,
        MessageKind::JobRequest,
        MessageKind::JobAssignment,
        MessageKind::TokenRefreshResponse,
        MessageKind::Shutdown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Heartbeat => "heartbeat",
            MessageKind::JobStarted => "job_started",
            MessageKind::JobProgress => "job_progress",
            MessageKind::JobCompleted => "job_completed",
            MessageKind::JobFailed => "job_failed",
            MessageKind::JobsDiscovered => "jobs_discovered",
            MessageKind::TokenRefreshRequest => "token_refresh_request",
            MessageKind::JobRequest => "job_request",
            MessageKind::JobAssignment => "job_assignment",
            MessageKind::TokenRefreshResponse => "token_refresh_response",
            MessageKind::Shutdown => "shutdown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Message types that must name the job they report on.
    pub fn is_job_scoped(self) -> bool {
        matches!(
            self,
            MessageKind::JobStarted
                | MessageKind::JobProgress
                | MessageKind::JobCompleted
                | MessageKind::JobFailed
                | MessageKind::JobsDiscovered
        )
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Idle,
    Discovering,
    Processing,
    Error,
}

impl SystemStatus {
    pub const NAMES: [&'static str; 4] = ["idle", "discovering", "processing", "error"];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatData {
    pub system_status: SystemStatus,
    pub active_jobs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStartedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<JobCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressData {
    pub processed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<String, EntityProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_state: Option<ResumeState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobProgressData {
    pub fn update(&self) -> ProgressUpdate {
        ProgressUpdate {
            processed: Some(self.processed),
            total: self.total,
            entities: self.entities.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCompletedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<String, EntityProgress>,
}

impl JobCompletedData {
    /// Final counts, if the crawler reported any.
    pub fn final_progress(&self) -> Option<ProgressUpdate> {
        if self.processed.is_none() && self.total.is_none() && self.entities.is_empty() {
            return None;
        }
        Some(ProgressUpdate {
            processed: self.processed,
            total: self.total,
            entities: self.entities.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailedData {
    pub error: String,
    #[serde(default)]
    pub recoverable: bool,
    #[serde(default)]
    pub credential_expired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_state: Option<ResumeState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsDiscoveredData {
    /// Defaults to the account of the discovery job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    pub areas: Vec<DiscoveredArea>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRefreshRequestData {
    pub request_id: String,
    pub account_id: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRefreshResponseData {
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TokenRefreshResponseData {
    pub fn refreshed(request_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self { request_id: request_id.into(), success: true, token: Some(token.into()), error: None }
    }

    pub fn failed(request_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            token: None,
            error: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequestData {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAssignmentData {
    pub job_id: String,
    pub token: String,
    pub gitlab_url: String,
    pub command: JobCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_state: Option<ResumeState>,
    /// Set when answering a `job_request`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutdownData {
    pub timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
