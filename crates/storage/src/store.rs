// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistence seam used by the engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hv_core::{
    AccountId, Area, AreaAuthorization, DiscoveredArea, Job, JobId, JobStatus, NewJob, Progress,
    ResumeState,
};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("job {id} is {actual}, expected {expected}")]
    StatusChanged { id: JobId, expected: JobStatus, actual: JobStatus },

    #[error("snapshot error: {0}")]
    Snapshot(#[from] crate::snapshot::SnapshotError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of an insert that tolerates conflicts.
///
/// A uniqueness conflict is not an error: the existing row is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Insert<T> {
    Created(T),
    Existing(T),
}

impl<T> Insert<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, Insert::Created(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Insert::Created(v) | Insert::Existing(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Insert::Created(v) | Insert::Existing(v) => v,
        }
    }
}

/// Update for a nullable column.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Field<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T> Field<T> {
    pub fn apply(self, slot: &mut Option<T>) {
        match self {
            Field::Keep => {}
            Field::Set(v) => *slot = Some(v),
            Field::Clear => *slot = None,
        }
    }
}

/// Column changes for [`JobStore::update_job`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    /// Reject the update unless the stored status still matches.
    pub expected: Option<JobStatus>,
    pub status: Option<JobStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Field<DateTime<Utc>>,
    pub progress: Field<Progress>,
    pub resume_state: Field<ResumeState>,
    pub error: Field<String>,
    pub priority: Option<bool>,
    pub assigned_at: Field<DateTime<Utc>>,
}

impl JobPatch {
    /// Transition from `from` to `to`.
    pub fn transition(from: JobStatus, to: JobStatus) -> Self {
        Self { expected: Some(from), status: Some(to), ..Default::default() }
    }

    /// Apply to a row in place. Does not check `expected`.
    pub fn apply_to(self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(at) = self.started_at {
            job.started_at = Some(at);
        }
        if let Some(priority) = self.priority {
            job.priority = priority;
        }
        self.finished_at.apply(&mut job.finished_at);
        self.progress.apply(&mut job.progress);
        self.resume_state.apply(&mut job.resume_state);
        self.error.apply(&mut job.error);
        self.assigned_at.apply(&mut job.assigned_at);
    }
}

/// Job and area persistence.
///
/// Uniqueness of [`hv_core::JobKey`], area `full_path` and area
/// `external_id` is enforced here; callers rely on it instead of locking.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job: NewJob) -> Result<Insert<Job>, StoreError>;

    async fn find_job(&self, id: &JobId) -> Result<Option<Job>, StoreError>;

    async fn update_job(&self, id: &JobId, patch: JobPatch) -> Result<Job, StoreError>;

    /// Insert-or-ignore keyed by external id. Identity fields are never overwritten.
    async fn upsert_area(&self, area: DiscoveredArea) -> Result<Insert<Area>, StoreError>;

    async fn create_area_authorization(
        &self,
        auth: AreaAuthorization,
    ) -> Result<Insert<AreaAuthorization>, StoreError>;

    async fn jobs_for_account(&self, account: &AccountId) -> Result<Vec<Job>, StoreError>;

    async fn areas_for_account(&self, account: &AccountId) -> Result<Vec<Area>, StoreError>;

    async fn accounts_for_area(&self, area_path: &str) -> Result<Vec<AccountId>, StoreError>;

    /// Claim the next assignable job: priority-flagged first, then by command
    /// rank, then oldest. The claim is stamped on the row and hides it from
    /// other claims until `lease` has passed.
    async fn claim_next(
        &self,
        account: Option<&AccountId>,
        lease: Duration,
    ) -> Result<Option<Job>, StoreError>;

    /// Claim one job by id. `None` when it is not assignable or someone else
    /// holds a live claim.
    async fn claim_job(&self, id: &JobId, lease: Duration) -> Result<Option<Job>, StoreError>;
}

/// Whether `job` can be claimed at `now`.
pub fn is_claimable(job: &Job, now: DateTime<Utc>, lease: Duration) -> bool {
    if !job.status.is_assignable() {
        return false;
    }
    match job.assigned_at {
        None => true,
        Some(at) => (now - at).to_std().is_ok_and(|held| held >= lease),
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
