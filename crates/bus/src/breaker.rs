// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker and reconnect backoff for the crawler socket.

use hv_core::Clock;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive connect failures that open the circuit.
    pub failure_threshold: u32,
    /// Time the circuit stays open before a trial attempt.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, cooldown: Duration::from_secs(30) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open { since: Instant },
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    failures: u32,
}

pub struct CircuitBreaker<C: Clock> {
    config: BreakerConfig,
    clock: C,
    inner: Mutex<Inner>,
}

impl<C: Clock> CircuitBreaker<C> {
    pub fn new(config: BreakerConfig, clock: C) -> Self {
        Self { config, clock, inner: Mutex::new(Inner { state: BreakerState::Closed, failures: 0 }) }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.inner.lock().state, BreakerState::Open { .. })
    }

    /// Whether an attempt may go ahead. An open circuit whose cooldown has
    /// elapsed moves to half-open and lets one attempt through.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open { since } => {
                if self.clock.now().saturating_duration_since(since) >= self.config.cooldown {
                    inner.state = BreakerState::HalfOpen;
                    tracing::info!("circuit half-open, trying crawler connection");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Time left before an open circuit allows a trial.
    pub fn remaining_cooldown(&self) -> Duration {
        match self.inner.lock().state {
            BreakerState::Open { since } => {
                let elapsed = self.clock.now().saturating_duration_since(since);
                self.config.cooldown.saturating_sub(elapsed)
            }
            _ => Duration::ZERO,
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != BreakerState::Closed {
            tracing::info!("circuit closed");
        }
        inner.state = BreakerState::Closed;
        inner.failures = 0;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failures += 1;
        let trip = match inner.state {
            BreakerState::HalfOpen => true,
            BreakerState::Closed => inner.failures >= self.config.failure_threshold,
            BreakerState::Open { .. } => false,
        };
        if trip {
            inner.state = BreakerState::Open { since: self.clock.now() };
            tracing::warn!(failures = inner.failures, "circuit open");
        }
    }
}

/// Capped exponential backoff between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { base: Duration::from_millis(500), max: Duration::from_secs(30) }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt number `attempt` (1-based); zero for the first try.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
