// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound message validation for the backend/crawler socket.
//!
//! Checks run cheapest first: size, JSON structure, timestamp freshness,
//! per-type business rules on the raw `data`, then typed decoding. The first
//! failing check decides the rejection category.

use chrono::{DateTime, Utc};
use hv_core::Clock;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::codec::DEFAULT_MAX_LINE_BYTES;
use crate::message::{Message, MessageKind, SystemStatus, WireMessage};

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub max_message_bytes: usize,
    pub max_age: Duration,
    pub max_future_skew: Duration,
    pub min_job_id_len: usize,
    pub min_token_len: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: DEFAULT_MAX_LINE_BYTES,
            max_age: Duration::from_secs(24 * 60 * 60),
            max_future_skew: Duration::from_secs(5 * 60),
            min_job_id_len: 8,
            min_token_len: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValidationCategory {
    Size,
    Structure,
    Timestamp,
    Schema,
    BusinessRule,
}

hv_core::simple_display! {
    ValidationCategory {
        Size => "size",
        Structure => "structure",
        Timestamp => "timestamp",
        Schema => "schema",
        BusinessRule => "business_rule",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid timestamp '{0}'")]
    BadTimestamp(String),

    #[error("timestamp is {age_secs}s old")]
    Stale { age_secs: i64 },

    #[error("timestamp is {ahead_secs}s in the future")]
    FromFuture { ahead_secs: i64 },

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("{kind}: {reason}")]
    Schema { kind: MessageKind, reason: String },

    #[error("{kind}: {rule}")]
    Rule { kind: MessageKind, rule: String },
}

impl ValidationError {
    pub fn category(&self) -> ValidationCategory {
        match self {
            ValidationError::TooLarge { .. } => ValidationCategory::Size,
            ValidationError::Malformed(_) | ValidationError::MissingField(_) => {
                ValidationCategory::Structure
            }
            ValidationError::BadTimestamp(_)
            | ValidationError::Stale { .. }
            | ValidationError::FromFuture { .. } => ValidationCategory::Timestamp,
            ValidationError::UnknownType(_) | ValidationError::Schema { .. } => {
                ValidationCategory::Schema
            }
            ValidationError::Rule { .. } => ValidationCategory::BusinessRule,
        }
    }

    /// Message type the rejection applies to, when it got that far.
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            ValidationError::Schema { kind, .. } | ValidationError::Rule { kind, .. } => {
                Some(*kind)
            }
            _ => None,
        }
    }
}

/// Counters accumulated across validations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub total: u64,
    pub valid: u64,
    pub invalid: BTreeMap<ValidationCategory, u64>,
}

impl ValidationStats {
    pub fn invalid_total(&self) -> u64 {
        self.invalid.values().sum()
    }

    pub fn invalid_for(&self, category: ValidationCategory) -> u64 {
        self.invalid.get(&category).copied().unwrap_or(0)
    }
}

/// Validates raw socket lines into typed [`Message`]s.
///
/// Holds no state besides counters; it never retries or mutates jobs.
pub struct Validator<C: Clock> {
    config: ValidatorConfig,
    clock: C,
    stats: Mutex<ValidationStats>,
}

impl<C: Clock> Validator<C> {
    pub fn new(clock: C) -> Self {
        Self::with_config(clock, ValidatorConfig::default())
    }

    pub fn with_config(clock: C, config: ValidatorConfig) -> Self {
        Self { config, clock, stats: Mutex::new(ValidationStats::default()) }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn stats(&self) -> ValidationStats {
        self.stats.lock().clone()
    }

    /// Validate one serialized message.
    pub fn validate_line(&self, line: &str) -> Result<Message, ValidationError> {
        let result = self.check_line(line);
        self.record(&result);
        result
    }

    /// Validate an already-parsed JSON value.
    pub fn validate_value(&self, value: &Value) -> Result<Message, ValidationError> {
        let size = value.to_string().len();
        let result = self.check_size(size).and_then(|()| self.check_value(value));
        self.record(&result);
        result
    }

    fn record(&self, result: &Result<Message, ValidationError>) {
        let mut stats = self.stats.lock();
        stats.total += 1;
        match result {
            Ok(_) => stats.valid += 1,
            Err(e) => *stats.invalid.entry(e.category()).or_insert(0) += 1,
        }
    }

    fn check_size(&self, size: usize) -> Result<(), ValidationError> {
        if size > self.config.max_message_bytes {
            return Err(ValidationError::TooLarge { size, limit: self.config.max_message_bytes });
        }
        Ok(())
    }

    fn check_line(&self, line: &str) -> Result<Message, ValidationError> {
        self.check_size(line.len())?;
        let value: Value =
            serde_json::from_str(line).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        self.check_value(&value)
    }

    fn check_value(&self, value: &Value) -> Result<Message, ValidationError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ValidationError::Malformed("expected a JSON object".to_string()))?;
        let type_name = required_str(obj, "type")?;
        let timestamp = required_str(obj, "timestamp")?;
        self.check_timestamp(timestamp)?;

        let kind = MessageKind::parse(type_name)
            .ok_or_else(|| ValidationError::UnknownType(type_name.to_string()))?;
        let data = obj.get("data").unwrap_or(&Value::Null);
        let job_id = obj.get("jobId").and_then(Value::as_str);
        self.check_rules(kind, job_id, data)
            .map_err(|rule| ValidationError::Rule { kind, rule })?;

        let wire: WireMessage = serde_json::from_value(value.clone())
            .map_err(|e| ValidationError::Schema { kind, reason: e.to_string() })?;
        Message::try_from(wire).map_err(|e| ValidationError::Schema { kind, reason: e.to_string() })
    }

    fn check_timestamp(&self, raw: &str) -> Result<(), ValidationError> {
        let at = DateTime::parse_from_rfc3339(raw)
            .map_err(|_| ValidationError::BadTimestamp(raw.to_string()))?
            .with_timezone(&Utc);
        let now = self.clock.utc();
        let age = now.signed_duration_since(at);
        if age.num_milliseconds() > self.config.max_age.as_millis() as i64 {
            return Err(ValidationError::Stale { age_secs: age.num_seconds() });
        }
        let ahead = -age.num_milliseconds();
        if ahead > self.config.max_future_skew.as_millis() as i64 {
            return Err(ValidationError::FromFuture { ahead_secs: ahead / 1000 });
        }
        Ok(())
    }

    fn check_rules(
        &self,
        kind: MessageKind,
        job_id: Option<&str>,
        data: &Value,
    ) -> Result<(), String> {
        if kind.is_job_scoped() {
            let len = job_id.map(str::len).unwrap_or(0);
            if len < self.config.min_job_id_len {
                return Err(format!(
                    "jobId must be at least {} characters",
                    self.config.min_job_id_len
                ));
            }
        }

        match kind {
            MessageKind::Heartbeat => {
                if let Some(status) = data.get("systemStatus").and_then(Value::as_str) {
                    if !SystemStatus::NAMES.contains(&status) {
                        return Err(format!("unknown systemStatus '{status}'"));
                    }
                }
                non_negative(data, "activeJobs")?;
            }
            MessageKind::JobProgress => {
                let processed = non_negative(data, "processed")?;
                let total = non_negative(data, "total")?;
                if let (Some(processed), Some(total)) = (processed, total) {
                    if processed > total {
                        return Err(format!("processed ({processed}) exceeds total ({total})"));
                    }
                }
            }
            MessageKind::JobAssignment => {
                if data.get("job_id").and_then(Value::as_str).unwrap_or("").is_empty() {
                    return Err("job_id must not be empty".to_string());
                }
                let token_len = data.get("token").and_then(Value::as_str).map(str::len);
                if token_len.unwrap_or(0) < self.config.min_token_len {
                    return Err(format!(
                        "token must be at least {} characters",
                        self.config.min_token_len
                    ));
                }
                let raw_url = data.get("gitlab_url").and_then(Value::as_str).unwrap_or("");
                match Url::parse(raw_url) {
                    Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                    _ => return Err(format!("gitlab_url '{raw_url}' is not an http(s) URL")),
                }
            }
            MessageKind::Shutdown => {
                non_negative(data, "timeout_seconds")?;
            }
            MessageKind::TokenRefreshRequest | MessageKind::TokenRefreshResponse => {
                if data.get("request_id").and_then(Value::as_str).unwrap_or("").is_empty() {
                    return Err("request_id must not be empty".to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            Err(ValidationError::MissingField(field))
        }
        Some(_) => Err(ValidationError::Malformed(format!("'{field}' must be a string"))),
    }
}

/// A numeric field that, when present, must not be negative.
fn non_negative(data: &Value, field: &str) -> Result<Option<f64>, String> {
    match data.get(field).and_then(Value::as_f64) {
        Some(n) if n < 0.0 => Err(format!("{field} must be >= 0, got {n}")),
        other => Ok(other),
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
