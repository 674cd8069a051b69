// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat-based connection health.

use hv_core::ConnectionId;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthConfig {
    /// A connection is healthy only if a heartbeat arrived within this window.
    pub heartbeat_window: Duration,
    pub check_interval: Duration,
    /// Consecutive missed checks before the connection is declared dead.
    pub max_missed: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            heartbeat_window: Duration::from_secs(120),
            check_interval: Duration::from_secs(30),
            max_missed: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    Crawler,
    Backend,
    Admin,
}

hv_core::simple_display! {
    ConnectionRole {
        Crawler => "crawler",
        Backend => "backend",
        Admin => "admin",
    }
}

/// Outcome of one periodic health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Missed(u32),
    Dead,
}

/// Runtime record of one socket peer.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub role: ConnectionRole,
    pub connected_at: Instant,
    pub last_heartbeat: Option<Instant>,
    pub active_jobs: u64,
    pub missed: u32,
}

impl Connection {
    pub fn new(role: ConnectionRole, now: Instant) -> Self {
        Self {
            id: ConnectionId::new(),
            role,
            connected_at: now,
            last_heartbeat: None,
            active_jobs: 0,
            missed: 0,
        }
    }

    pub fn record_heartbeat(&mut self, now: Instant, active_jobs: u64) {
        self.last_heartbeat = Some(now);
        self.active_jobs = active_jobs;
        self.missed = 0;
    }

    pub fn is_healthy(&self, now: Instant, config: &HealthConfig) -> bool {
        match self.last_heartbeat {
            Some(at) => now.saturating_duration_since(at) <= config.heartbeat_window,
            None => false,
        }
    }

    /// Run one periodic check. A check with no heartbeat during the last
    /// interval counts as missed. The connection is dead once `max_missed`
    /// checks in a row were missed and it is no longer healthy, so `Dead`
    /// never coexists with [`is_healthy`](Self::is_healthy).
    pub fn check(&mut self, now: Instant, config: &HealthConfig) -> Health {
        let reference = self.last_heartbeat.unwrap_or(self.connected_at);
        if now.saturating_duration_since(reference) < config.check_interval {
            self.missed = 0;
            return Health::Healthy;
        }
        self.missed = self.missed.saturating_add(1);
        if self.missed >= config.max_missed && !self.is_healthy(now, config) {
            Health::Dead
        } else {
            Health::Missed(self.missed)
        }
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
