// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`JobStore`] with the same uniqueness rules as the relational store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hv_core::{
    AccountId, Area, AreaAuthorization, Clock, DiscoveredArea, Job, JobId, JobKey, NewJob,
    SystemClock,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

use crate::snapshot::Snapshot;
use crate::store::{is_claimable, Insert, JobPatch, JobStore, StoreError};

/// Persisted rows plus derived uniqueness indexes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    pub jobs: BTreeMap<JobId, Job>,
    pub areas: BTreeMap<String, Area>,
    #[serde(default)]
    pub authorizations: BTreeSet<AreaAuthorization>,
    #[serde(skip)]
    job_keys: HashMap<JobKey, JobId>,
    #[serde(skip)]
    external_ids: HashMap<u64, String>,
}

impl StoreState {
    /// Recompute the uniqueness indexes from the rows.
    pub fn rebuild_indexes(&mut self) {
        self.job_keys = self.jobs.values().map(|job| (job.key(), job.id.clone())).collect();
        self.external_ids =
            self.areas.values().map(|a| (a.external_id, a.full_path.clone())).collect();
    }

    fn insert_job(&mut self, job: NewJob, id: JobId, now: DateTime<Utc>) -> Insert<Job> {
        let key = job.key();
        if let Some(existing) = self.job_keys.get(&key).and_then(|id| self.jobs.get(id)) {
            return Insert::Existing(existing.clone());
        }
        let job = job.into_job(id.clone(), now);
        self.job_keys.insert(key, id.clone());
        self.jobs.insert(id, job.clone());
        Insert::Created(job)
    }

    fn insert_area(&mut self, area: DiscoveredArea, now: DateTime<Utc>) -> Insert<Area> {
        let existing = self
            .external_ids
            .get(&area.external_id)
            .and_then(|path| self.areas.get(path))
            .or_else(|| self.areas.get(&area.full_path));
        if let Some(existing) = existing {
            return Insert::Existing(existing.clone());
        }
        let area = area.into_area(now);
        self.external_ids.insert(area.external_id, area.full_path.clone());
        self.areas.insert(area.full_path.clone(), area.clone());
        Insert::Created(area)
    }
}

pub struct MemoryStore<C: Clock = SystemClock> {
    state: Mutex<StoreState>,
    clock: C,
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self::from_state(StoreState::default(), clock)
    }

    pub fn from_state(mut state: StoreState, clock: C) -> Self {
        state.rebuild_indexes();
        Self { state: Mutex::new(state), clock }
    }

    /// Open from a snapshot file, starting empty when none exists.
    pub fn open(path: &Path, clock: C) -> Result<Self, StoreError> {
        let state = match Snapshot::load(path)? {
            Some(snapshot) => {
                tracing::info!(
                    jobs = snapshot.state.jobs.len(),
                    areas = snapshot.state.areas.len(),
                    "loaded snapshot"
                );
                snapshot.state
            }
            None => StoreState::default(),
        };
        Ok(Self::from_state(state, clock))
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = Snapshot::new(self.state.lock().clone(), self.clock.utc());
        snapshot.save(path)?;
        tracing::debug!(path = %path.display(), "snapshot saved");
        Ok(())
    }

    pub fn job_count(&self) -> usize {
        self.state.lock().jobs.len()
    }

    pub fn area_count(&self) -> usize {
        self.state.lock().areas.len()
    }

    pub fn authorization_count(&self) -> usize {
        self.state.lock().authorizations.len()
    }

    pub fn all_jobs(&self) -> Vec<Job> {
        self.state.lock().jobs.values().cloned().collect()
    }
}

#[async_trait]
impl<C: Clock> JobStore for MemoryStore<C> {
    async fn create_job(&self, job: NewJob) -> Result<Insert<Job>, StoreError> {
        let now = self.clock.utc();
        Ok(self.state.lock().insert_job(job, JobId::new(), now))
    }

    async fn find_job(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.state.lock().jobs.get(id).cloned())
    }

    async fn update_job(&self, id: &JobId, patch: JobPatch) -> Result<Job, StoreError> {
        let mut state = self.state.lock();
        let job = state.jobs.get_mut(id).ok_or_else(|| StoreError::JobNotFound(id.clone()))?;
        if let Some(expected) = patch.expected {
            if job.status != expected {
                return Err(StoreError::StatusChanged {
                    id: id.clone(),
                    expected,
                    actual: job.status,
                });
            }
        }
        patch.apply_to(job);
        Ok(job.clone())
    }

    async fn upsert_area(&self, area: DiscoveredArea) -> Result<Insert<Area>, StoreError> {
        let now = self.clock.utc();
        Ok(self.state.lock().insert_area(area, now))
    }

    async fn create_area_authorization(
        &self,
        auth: AreaAuthorization,
    ) -> Result<Insert<AreaAuthorization>, StoreError> {
        let mut state = self.state.lock();
        if state.authorizations.insert(auth.clone()) {
            Ok(Insert::Created(auth))
        } else {
            Ok(Insert::Existing(auth))
        }
    }

    async fn jobs_for_account(&self, account: &AccountId) -> Result<Vec<Job>, StoreError> {
        let state = self.state.lock();
        Ok(state.jobs.values().filter(|j| &j.account_id == account).cloned().collect())
    }

    async fn areas_for_account(&self, account: &AccountId) -> Result<Vec<Area>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .authorizations
            .iter()
            .filter(|a| &a.account_id == account)
            .filter_map(|a| state.areas.get(&a.area_path).cloned())
            .collect())
    }

    async fn accounts_for_area(&self, area_path: &str) -> Result<Vec<AccountId>, StoreError> {
        let state = self.state.lock();
        Ok(state
            .authorizations
            .iter()
            .filter(|a| a.area_path == area_path)
            .map(|a| a.account_id.clone())
            .collect())
    }

    async fn claim_next(
        &self,
        account: Option<&AccountId>,
        lease: Duration,
    ) -> Result<Option<Job>, StoreError> {
        let now = self.clock.utc();
        let mut state = self.state.lock();
        let next = state
            .jobs
            .values()
            .filter(|j| is_claimable(j, now, lease))
            .filter(|j| match account {
                Some(a) => &j.account_id == a,
                None => true,
            })
            .min_by_key(|j| (!j.priority, j.command.priority_rank(), j.created_at, j.id.clone()))
            .map(|j| j.id.clone());
        let Some(id) = next else {
            return Ok(None);
        };
        let job = state.jobs.get_mut(&id).ok_or_else(|| StoreError::JobNotFound(id.clone()))?;
        job.assigned_at = Some(now);
        Ok(Some(job.clone()))
    }

    async fn claim_job(&self, id: &JobId, lease: Duration) -> Result<Option<Job>, StoreError> {
        let now = self.clock.utc();
        let mut state = self.state.lock();
        let job = state.jobs.get_mut(id).ok_or_else(|| StoreError::JobNotFound(id.clone()))?;
        if !is_claimable(job, now, lease) {
            return Ok(None);
        }
        job.assigned_at = Some(now);
        Ok(Some(job.clone()))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
