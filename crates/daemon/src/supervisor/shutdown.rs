// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graceful then forced shutdown.
//!
//! `Running --signal--> ShuttingDown --signal | grace elapsed--> ForceKilled`.
//! A second signal exits non-zero; an expired grace period still exits 0.

use std::time::{Duration, Instant};

/// Exit code after a second signal.
pub const FORCED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    ShuttingDown { deadline: Instant },
    ForceKilled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownAction {
    None,
    /// Send `shutdown` to every live child and wait for them.
    Broadcast { grace: Duration },
    /// Kill every child and exit with this code.
    KillAll { exit_code: i32 },
}

#[derive(Debug, Clone)]
pub struct ShutdownState {
    phase: ShutdownPhase,
    grace: Duration,
}

impl ShutdownState {
    pub fn new(grace: Duration) -> Self {
        Self { phase: ShutdownPhase::Running, grace }
    }

    pub fn phase(&self) -> ShutdownPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == ShutdownPhase::Running
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            ShutdownPhase::ShuttingDown { deadline } => Some(deadline),
            _ => None,
        }
    }

    pub fn on_signal(&mut self, now: Instant) -> ShutdownAction {
        match self.phase {
            ShutdownPhase::Running => {
                self.phase = ShutdownPhase::ShuttingDown { deadline: now + self.grace };
                ShutdownAction::Broadcast { grace: self.grace }
            }
            ShutdownPhase::ShuttingDown { .. } => {
                self.phase = ShutdownPhase::ForceKilled;
                ShutdownAction::KillAll { exit_code: FORCED_EXIT_CODE }
            }
            ShutdownPhase::ForceKilled => ShutdownAction::None,
        }
    }

    /// Grace period check; kills survivors once the deadline has passed.
    pub fn on_tick(&mut self, now: Instant) -> ShutdownAction {
        match self.phase {
            ShutdownPhase::ShuttingDown { deadline } if now >= deadline => {
                self.phase = ShutdownPhase::ForceKilled;
                ShutdownAction::KillAll { exit_code: 0 }
            }
            _ => ShutdownAction::None,
        }
    }

    /// Internal failure: skip the grace period.
    pub fn on_error(&mut self) -> ShutdownAction {
        if self.phase == ShutdownPhase::ForceKilled {
            return ShutdownAction::None;
        }
        self.phase = ShutdownPhase::ForceKilled;
        ShutdownAction::KillAll { exit_code: 1 }
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
