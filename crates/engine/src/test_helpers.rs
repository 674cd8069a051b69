// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine crate.

use async_trait::async_trait;
use hv_core::{
    AccountId, Area, AreaAuthorization, DiscoveredArea, FakeClock, Job, JobId, NewJob,
};
use hv_storage::{Insert, JobPatch, JobStore, MemoryStore, StoreError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// A [`MemoryStore`] that fails selected writes.
pub(crate) struct FlakyStore {
    pub inner: MemoryStore<FakeClock>,
    failing_paths: Mutex<HashSet<String>>,
    failing_area_ids: Mutex<HashSet<u64>>,
}

impl FlakyStore {
    pub fn new(clock: FakeClock) -> Self {
        Self {
            inner: MemoryStore::with_clock(clock),
            failing_paths: Mutex::new(HashSet::new()),
            failing_area_ids: Mutex::new(HashSet::new()),
        }
    }

    /// Job creation under `path` fails.
    pub fn fail_jobs_at(&self, path: &str) {
        self.failing_paths.lock().insert(path.to_string());
    }

    /// Area upsert with this external id fails.
    pub fn fail_area(&self, external_id: u64) {
        self.failing_area_ids.lock().insert(external_id);
    }
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn create_job(&self, job: NewJob) -> Result<Insert<Job>, StoreError> {
        if let Some(path) = &job.full_path {
            if self.failing_paths.lock().contains(path) {
                return Err(StoreError::Unavailable(format!("injected failure for {path}")));
            }
        }
        self.inner.create_job(job).await
    }

    async fn find_job(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        self.inner.find_job(id).await
    }

    async fn update_job(&self, id: &JobId, patch: JobPatch) -> Result<Job, StoreError> {
        self.inner.update_job(id, patch).await
    }

    async fn upsert_area(&self, area: DiscoveredArea) -> Result<Insert<Area>, StoreError> {
        if self.failing_area_ids.lock().contains(&area.external_id) {
            return Err(StoreError::Unavailable("injected area failure".to_string()));
        }
        self.inner.upsert_area(area).await
    }

    async fn create_area_authorization(
        &self,
        auth: AreaAuthorization,
    ) -> Result<Insert<AreaAuthorization>, StoreError> {
        self.inner.create_area_authorization(auth).await
    }

    async fn jobs_for_account(&self, account: &AccountId) -> Result<Vec<Job>, StoreError> {
        self.inner.jobs_for_account(account).await
    }

    async fn areas_for_account(&self, account: &AccountId) -> Result<Vec<Area>, StoreError> {
        self.inner.areas_for_account(account).await
    }

    async fn accounts_for_area(&self, area_path: &str) -> Result<Vec<AccountId>, StoreError> {
        self.inner.accounts_for_area(area_path).await
    }

    async fn claim_next(
        &self,
        account: Option<&AccountId>,
        lease: Duration,
    ) -> Result<Option<Job>, StoreError> {
        self.inner.claim_next(account, lease).await
    }

    async fn claim_job(&self, id: &JobId, lease: Duration) -> Result<Option<Job>, StoreError> {
        self.inner.claim_job(id, lease).await
    }
}

pub(crate) fn memory_store(clock: &FakeClock) -> Arc<MemoryStore<FakeClock>> {
    Arc::new(MemoryStore::with_clock(clock.clone()))
}
