// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart policy for managed processes.

use serde::Deserialize;
use std::process::ExitStatus;
use std::time::Duration;

/// `backoff = min(base * 2^(restarts-1), max)`, up to `max_restarts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestartPolicy {
    #[serde(rename = "base_ms", with = "millis")]
    pub base: Duration,
    #[serde(rename = "max_ms", with = "millis")]
    pub max: Duration,
    pub max_restarts: u32,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self { base: Duration::from_millis(1000), max: Duration::from_millis(30_000), max_restarts: 20 }
    }
}

impl RestartPolicy {
    pub fn backoff(&self, restarts: u32) -> Duration {
        if restarts == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(restarts - 1).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exit code 0, no signal.
    Clean,
    Code(i32),
    Signal(i32),
    /// The process could not be started at all.
    SpawnFailed,
}

impl ExitOutcome {
    pub fn from_status(status: ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        match (status.code(), status.signal()) {
            (Some(0), _) => ExitOutcome::Clean,
            (Some(code), _) => ExitOutcome::Code(code),
            (None, Some(signal)) => ExitOutcome::Signal(signal),
            (None, None) => ExitOutcome::Code(-1),
        }
    }
}

hv_core::simple_display! {
    ExitOutcome {
        Clean => "clean exit",
        Code(..) => "non-zero exit",
        Signal(..) => "killed by signal",
        SpawnFailed => "spawn failed",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Clean exit: counter reset, process stays down.
    Stay,
    Restart { attempt: u32, delay: Duration },
    /// Past the ceiling; the process stays down for good.
    GiveUp { restarts: u32 },
}

/// Restart counter for one process.
#[derive(Debug, Clone, Default)]
pub struct RestartTracker {
    restarts: u32,
}

impl RestartTracker {
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn on_exit(&mut self, outcome: ExitOutcome, policy: &RestartPolicy) -> RestartDecision {
        if outcome == ExitOutcome::Clean {
            self.restarts = 0;
            return RestartDecision::Stay;
        }
        self.restarts = self.restarts.saturating_add(1);
        if self.restarts > policy.max_restarts {
            RestartDecision::GiveUp { restarts: self.restarts - 1 }
        } else {
            RestartDecision::Restart { attempt: self.restarts, delay: policy.backoff(self.restarts) }
        }
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
