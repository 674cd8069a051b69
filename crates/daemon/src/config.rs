// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration: optional TOML file plus environment overrides.
//!
//! ```toml
//! grace_ms = 10000
//!
//! [restart]
//! base_ms = 1000
//! max_ms = 30000
//! max_restarts = 20
//!
//! [crawler]
//! command = "hv-crawler"
//! args = ["--socket", "/run/harvest/crawler.sock"]
//!
//! [backend]
//! command = "hv-backend"
//! env = { HV_LOG = "debug" }
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use hv_wire::ProcessName;

use crate::env;
use crate::supervisor::RestartPolicy;

/// Default grace period between the shutdown broadcast and SIGKILL.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot determine state directory (HOME not set)")]
    NoStateDir,

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0}: empty command")]
    EmptyCommand(ProcessName),
}

/// How to launch one managed process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl ProcessSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), args: Vec::new(), env: BTreeMap::new(), cwd: None }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn default_for(name: ProcessName) -> Self {
        match name {
            ProcessName::Crawler => Self::new("hv-crawler"),
            ProcessName::Backend => Self::new("hv-backend"),
        }
    }
}

/// On-disk shape; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub grace_ms: Option<u64>,
    pub restart: RestartPolicy,
    pub crawler: Option<ProcessSpec>,
    pub backend: Option<ProcessSpec>,
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
    pub lock_path: PathBuf,
    pub socket_path: PathBuf,
    pub grace: Duration,
    pub restart: RestartPolicy,
    pub processes: BTreeMap<ProcessName, ProcessSpec>,
}

impl SupervisorConfig {
    /// Resolve from the environment, reading `HV_CONFIG` or
    /// `<state_dir>/harvest.toml` when present.
    pub fn load(config_override: Option<PathBuf>) -> Result<Self, ConfigError> {
        let state_dir = env::state_dir()?;
        let path = config_override
            .or_else(env::config_path)
            .unwrap_or_else(|| state_dir.join("harvest.toml"));
        let file = if path.exists() { FileConfig::read(&path)? } else { FileConfig::default() };
        let socket_path = env::socket_path(&state_dir);
        Self::from_parts(state_dir, socket_path, file, env::grace_period())
    }

    pub fn from_parts(
        state_dir: PathBuf,
        socket_path: PathBuf,
        file: FileConfig,
        grace_override: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        let grace = grace_override
            .or(file.grace_ms.map(Duration::from_millis))
            .unwrap_or(DEFAULT_GRACE);

        let mut processes = BTreeMap::new();
        for (name, spec) in
            [(ProcessName::Crawler, file.crawler), (ProcessName::Backend, file.backend)]
        {
            let spec = spec.unwrap_or_else(|| ProcessSpec::default_for(name));
            if spec.command.trim().is_empty() {
                return Err(ConfigError::EmptyCommand(name));
            }
            processes.insert(name, spec);
        }

        Ok(Self {
            log_dir: state_dir.join("logs"),
            lock_path: state_dir.join("hvd.pid"),
            socket_path,
            grace,
            restart: file.restart,
            processes,
            state_dir,
        })
    }

    /// Environment every child inherits on top of its own `env` table.
    pub fn child_env(&self) -> Vec<(String, String)> {
        vec![
            ("HV_STATE_DIR".to_string(), self.state_dir.display().to_string()),
            ("HV_SOCKET".to_string(), self.socket_path.display().to_string()),
        ]
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
