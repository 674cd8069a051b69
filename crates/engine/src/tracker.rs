// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-account discovery progress.

use chrono::{DateTime, Utc};
use hv_core::{AccountId, JobId};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryState {
    /// The authorization job is queued or running.
    Discovering { job_id: JobId, since: DateTime<Utc> },
    Complete { job_id: JobId, at: DateTime<Utc> },
}

/// Tracks whether each account's area discovery has finished.
#[derive(Debug, Default)]
pub struct DiscoveryTracker {
    accounts: Mutex<HashMap<AccountId, DiscoveryState>>,
}

impl DiscoveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that discovery started. A completed account is not reset.
    pub fn begin(&self, account: &AccountId, job_id: &JobId, at: DateTime<Utc>) {
        let mut accounts = self.accounts.lock();
        if matches!(accounts.get(account), Some(DiscoveryState::Complete { .. })) {
            return;
        }
        accounts.insert(
            account.clone(),
            DiscoveryState::Discovering { job_id: job_id.clone(), since: at },
        );
    }

    /// Mark complete. Returns false if it was already complete.
    pub fn complete(&self, account: &AccountId, job_id: &JobId, at: DateTime<Utc>) -> bool {
        let mut accounts = self.accounts.lock();
        let previous = accounts
            .insert(account.clone(), DiscoveryState::Complete { job_id: job_id.clone(), at });
        !matches!(previous, Some(DiscoveryState::Complete { .. }))
    }

    pub fn is_complete(&self, account: &AccountId) -> bool {
        matches!(self.state(account), Some(DiscoveryState::Complete { .. }))
    }

    pub fn state(&self, account: &AccountId) -> Option<DiscoveryState> {
        self.accounts.lock().get(account).cloned()
    }

    /// Accounts still discovering.
    pub fn pending(&self) -> Vec<AccountId> {
        let mut pending: Vec<_> = self
            .accounts
            .lock()
            .iter()
            .filter(|(_, s)| matches!(s, DiscoveryState::Discovering { .. }))
            .map(|(a, _)| a.clone())
            .collect();
        pending.sort();
        pending
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
