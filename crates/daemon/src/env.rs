// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the harvest binaries.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigError;

/// Resolve state directory: HV_STATE_DIR > XDG_STATE_HOME/harvest > ~/.local/state/harvest
pub fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = var("HV_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("harvest"));
    }
    let home = dirs::home_dir().ok_or(ConfigError::NoStateDir)?;
    Ok(home.join(".local/state/harvest"))
}

/// Supervisor config file override.
pub fn config_path() -> Option<PathBuf> {
    var("HV_CONFIG").map(PathBuf::from)
}

/// Shutdown grace period override (`HV_GRACE_MS`).
pub fn grace_period() -> Option<Duration> {
    var("HV_GRACE_MS").and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

/// Crawler socket path (`HV_SOCKET`), defaulting into the state directory.
pub fn socket_path(state_dir: &std::path::Path) -> PathBuf {
    var("HV_SOCKET").map(PathBuf::from).unwrap_or_else(|| state_dir.join("crawler.sock"))
}

/// Base url of the task and token HTTP endpoints.
pub fn api_url() -> Option<String> {
    var("HV_API_URL")
}

pub fn api_token() -> Option<String> {
    var("HV_API_TOKEN")
}

/// GitLab instance handed to the crawler with each assignment.
pub fn gitlab_url() -> Option<String> {
    var("HV_GITLAB_URL")
}

pub fn gitlab_token() -> Option<String> {
    var("HV_GITLAB_TOKEN")
}

/// Accounts seeded with an authorization job, comma separated.
pub fn accounts() -> Vec<String> {
    var("HV_ACCOUNTS")
        .map(|s| {
            s.split(',').map(str::trim).filter(|a| !a.is_empty()).map(String::from).collect()
        })
        .unwrap_or_default()
}

/// Log filter directive (default `info`).
pub fn log_filter() -> String {
    var("HV_LOG").unwrap_or_else(|| "info".to_string())
}

/// Mirror logs to stderr when `HV_LOG_STDERR=1`.
pub fn log_stderr() -> bool {
    matches!(var("HV_LOG_STDERR").as_deref(), Some("1") | Some("true"))
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
