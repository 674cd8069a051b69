// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job status state machine.
//!
//! ```text
//! queued ──► running ──► finished
//!   │  ▲       │  │
//!   │  │       │  └────► failed ──► (requeue) queued
//!   ▼  │       ▼
//!  paused ◄────┘
//!
//! running ──► credential_expired ──► waiting_credential_renewal
//!    ▲                                         │
//!    └──────────── credential_renewed ◄────────┘
//! ```

use serde::{Deserialize, Serialize};

/// Status of a crawl job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Finished,
    Failed,
    Paused,
    CredentialExpired,
    WaitingCredentialRenewal,
    CredentialRenewed,
}

crate::simple_display! {
    JobStatus {
        Queued => "queued",
        Running => "running",
        Finished => "finished",
        Failed => "failed",
        Paused => "paused",
        CredentialExpired => "credential_expired",
        WaitingCredentialRenewal => "waiting_credential_renewal",
        CredentialRenewed => "credential_renewed",
    }
}

impl JobStatus {
    pub const ALL: [JobStatus; 8] = [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Finished,
        JobStatus::Failed,
        JobStatus::Paused,
        JobStatus::CredentialExpired,
        JobStatus::WaitingCredentialRenewal,
        JobStatus::CredentialRenewed,
    ];

    /// Finished and failed jobs take no further updates from the crawler.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }

    /// Statuses that occupy a crawler slot.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Running | JobStatus::CredentialRenewed)
    }

    /// Statuses the crawler may be handed.
    pub fn is_assignable(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::CredentialRenewed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Self-transitions are not listed; callers treat them as no-ops.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Running)
                | (Queued, Paused)
                | (Queued, Failed)
                | (Running, Finished)
                | (Running, Failed)
                | (Running, Paused)
                | (Running, CredentialExpired)
                | (CredentialExpired, WaitingCredentialRenewal)
                | (CredentialExpired, Failed)
                | (WaitingCredentialRenewal, CredentialRenewed)
                | (WaitingCredentialRenewal, Failed)
                | (CredentialRenewed, Running)
                | (CredentialRenewed, Queued)
                | (Paused, Queued)
                | (Failed, Queued)
        )
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
