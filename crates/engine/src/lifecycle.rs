// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job status transitions driven by crawler reports.
//!
//! Every mutation goes through [`JobLifecycle`]. Each write carries the
//! status it was computed from, so a concurrent change surfaces as a store
//! error instead of being overwritten.

use hv_core::{
    AccountId, Clock, Job, JobId, JobStatus, NewJob, Progress, ProgressError, ProgressUpdate,
    ResumeState,
};
use hv_storage::{Field, Insert, JobPatch, JobStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

use crate::discovery::{DiscoveryHandler, DiscoveryReport};
use crate::tracker::DiscoveryTracker;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job {id}: cannot move from {from} to {to}")]
    InvalidTransition { id: JobId, from: JobStatus, to: JobStatus },

    #[error("job {id} is {status}, not accepting progress")]
    NotActive { id: JobId, status: JobStatus },

    #[error("job {id}: {source}")]
    Progress {
        id: JobId,
        #[source]
        source: ProgressError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A `job_failed` report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Failure {
    pub error: String,
    pub recoverable: bool,
    pub credential_expired: bool,
    pub resume_state: Option<ResumeState>,
}

impl Failure {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), ..Default::default() }
    }

    pub fn recoverable(mut self, resume_state: Option<ResumeState>) -> Self {
        self.recoverable = true;
        self.resume_state = resume_state;
        self
    }
}

/// Result of [`JobLifecycle::on_completed`].
#[derive(Debug)]
pub struct Completion {
    pub job: Job,
    /// Jobs spawned because an authorization job finished.
    pub spawned: Option<DiscoveryReport>,
}

pub struct JobLifecycle<C: Clock> {
    store: Arc<dyn JobStore>,
    discovery: Arc<DiscoveryHandler>,
    tracker: Arc<DiscoveryTracker>,
    clock: C,
}

impl<C: Clock> JobLifecycle<C> {
    pub fn new(
        store: Arc<dyn JobStore>,
        discovery: Arc<DiscoveryHandler>,
        tracker: Arc<DiscoveryTracker>,
        clock: C,
    ) -> Self {
        Self { store, discovery, tracker, clock }
    }

    pub fn tracker(&self) -> &DiscoveryTracker {
        &self.tracker
    }

    /// Seed an account with its authorization job.
    pub async fn create_authorization(
        &self,
        account: &AccountId,
    ) -> Result<Insert<Job>, LifecycleError> {
        let insert = self.store.create_job(NewJob::authorization(account.clone())).await?;
        let job = insert.get();
        if !job.is_terminal() {
            self.tracker.begin(account, &job.id, self.clock.utc());
        }
        if insert.is_created() {
            tracing::info!(job_id = %job.id, account = %account, "authorization job created");
        }
        Ok(insert)
    }

    pub async fn on_started(&self, id: &JobId) -> Result<Job, LifecycleError> {
        let job = self.require(id).await?;
        if job.status == JobStatus::Running {
            return Ok(job);
        }
        self.check(&job, JobStatus::Running)?;

        let mut patch = JobPatch::transition(job.status, JobStatus::Running);
        if job.started_at.is_none() {
            patch.started_at = Some(self.clock.utc());
        }
        if job.progress.is_none() {
            patch.progress = Field::Set(Progress::default());
        }
        let job = self.store.update_job(id, patch).await?;
        if job.command.is_discovery() {
            self.tracker.begin(&job.account_id, &job.id, self.clock.utc());
        }
        tracing::info!(
            job_id = %id,
            command = %job.command,
            target = job.target(),
            "job started"
        );
        Ok(job)
    }

    /// Merge a partial progress report. A `processed > total` result is
    /// rejected and leaves the row untouched.
    pub async fn on_progress(
        &self,
        id: &JobId,
        update: &ProgressUpdate,
        resume_state: Option<ResumeState>,
    ) -> Result<Job, LifecycleError> {
        let job = self.require(id).await?;
        if !job.status.is_active() {
            return Err(LifecycleError::NotActive { id: id.clone(), status: job.status });
        }

        let progress = job
            .progress
            .clone()
            .unwrap_or_default()
            .merged(update)
            .map_err(|source| LifecycleError::Progress { id: id.clone(), source })?;

        let mut patch = JobPatch { expected: Some(job.status), ..Default::default() };
        patch.progress = Field::Set(progress);
        if let Some(newer) = resume_state {
            patch.resume_state = Field::Set(merge_resume(job.resume_state.clone(), newer));
        }
        let job = self.store.update_job(id, patch).await?;
        tracing::debug!(
            job_id = %id,
            processed = job.progress.as_ref().map(|p| p.processed),
            total = job.progress.as_ref().and_then(|p| p.total),
            "progress"
        );
        Ok(job)
    }

    /// Finish a job. The row is persisted before any dependent jobs are
    /// spawned, so spawning can be re-derived from a finished row.
    pub async fn on_completed(
        &self,
        id: &JobId,
        final_progress: Option<&ProgressUpdate>,
    ) -> Result<Completion, LifecycleError> {
        let job = self.require(id).await?;
        self.check(&job, JobStatus::Finished)?;

        let mut patch = JobPatch::transition(job.status, JobStatus::Finished);
        patch.finished_at = Field::Set(self.clock.utc());
        patch.resume_state = Field::Clear;
        patch.error = Field::Clear;
        if let Some(update) = final_progress {
            let progress = job
                .progress
                .clone()
                .unwrap_or_default()
                .merged(update)
                .map_err(|source| LifecycleError::Progress { id: id.clone(), source })?;
            patch.progress = Field::Set(progress);
        }
        let job = self.store.update_job(id, patch).await?;
        tracing::info!(
            job_id = %id,
            command = %job.command,
            target = job.target(),
            "job finished"
        );

        let spawned = if job.command.is_discovery() {
            self.tracker.complete(&job.account_id, &job.id, self.clock.utc());
            Some(self.discovery.spawn_for_account(&job.account_id, Some(&job.id)).await)
        } else {
            None
        };
        Ok(Completion { job, spawned })
    }

    pub async fn on_failed(&self, id: &JobId, failure: Failure) -> Result<Job, LifecycleError> {
        let job = self.require(id).await?;
        let to = if failure.credential_expired {
            JobStatus::CredentialExpired
        } else {
            JobStatus::Failed
        };
        self.check(&job, to)?;

        let mut patch = JobPatch::transition(job.status, to);
        patch.error = Field::Set(failure.error.clone());
        let keep_resume = failure.recoverable || failure.credential_expired;
        patch.resume_state = match failure.resume_state {
            Some(newer) if keep_resume => {
                Field::Set(merge_resume(job.resume_state.clone(), newer))
            }
            _ if failure.credential_expired => Field::Keep,
            _ => Field::Clear,
        };
        if to == JobStatus::Failed {
            patch.finished_at = Field::Set(self.clock.utc());
        }

        let job = self.store.update_job(id, patch).await?;
        tracing::warn!(
            job_id = %id,
            status = %job.status,
            recoverable = failure.recoverable,
            error = %failure.error,
            "job failed"
        );
        Ok(job)
    }

    pub async fn pause(&self, id: &JobId) -> Result<Job, LifecycleError> {
        self.transition(id, JobStatus::Paused).await
    }

    /// Resumable retry: a failed or paused row goes back to `queued` with its
    /// resume state intact.
    pub async fn requeue(&self, id: &JobId) -> Result<Job, LifecycleError> {
        let job = self.require(id).await?;
        self.check(&job, JobStatus::Queued)?;
        let mut patch = JobPatch::transition(job.status, JobStatus::Queued);
        patch.finished_at = Field::Clear;
        patch.error = Field::Clear;
        patch.assigned_at = Field::Clear;
        let job = self.store.update_job(id, patch).await?;
        tracing::info!(job_id = %id, resumable = job.resume_state.is_some(), "job requeued");
        Ok(job)
    }

    pub async fn await_credential_renewal(&self, id: &JobId) -> Result<Job, LifecycleError> {
        self.transition(id, JobStatus::WaitingCredentialRenewal).await
    }

    /// Park every `credential_expired` job of `account` until a new
    /// credential arrives.
    pub async fn await_account_renewal(
        &self,
        account: &AccountId,
    ) -> Result<Vec<Job>, LifecycleError> {
        let waiting = self
            .move_account_jobs(
                account,
                JobStatus::CredentialExpired,
                JobStatus::WaitingCredentialRenewal,
            )
            .await?;
        tracing::info!(account = %account, jobs = waiting.len(), "waiting for credential renewal");
        Ok(waiting)
    }

    /// Release every job of `account` waiting on a new credential.
    pub async fn on_credential_renewed(
        &self,
        account: &AccountId,
    ) -> Result<Vec<Job>, LifecycleError> {
        let renewed = self
            .move_account_jobs(
                account,
                JobStatus::WaitingCredentialRenewal,
                JobStatus::CredentialRenewed,
            )
            .await?;
        tracing::info!(account = %account, jobs = renewed.len(), "credential renewed");
        Ok(renewed)
    }

    /// Move the account's jobs in `from` to `to`, dropping stale claims.
    /// Jobs that changed concurrently are skipped.
    async fn move_account_jobs(
        &self,
        account: &AccountId,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Vec<Job>, LifecycleError> {
        let jobs = self.store.jobs_for_account(account).await?;
        let mut moved = Vec::new();
        for job in jobs.into_iter().filter(|j| j.status == from) {
            let mut patch = JobPatch::transition(from, to);
            patch.assigned_at = Field::Clear;
            match self.store.update_job(&job.id, patch).await {
                Ok(job) => moved.push(job),
                Err(e) => tracing::warn!(job_id = %job.id, status = %to, error = %e, "job skipped"),
            }
        }
        Ok(moved)
    }

    async fn transition(&self, id: &JobId, to: JobStatus) -> Result<Job, LifecycleError> {
        let job = self.require(id).await?;
        self.check(&job, to)?;
        let job = self.store.update_job(id, JobPatch::transition(job.status, to)).await?;
        tracing::info!(job_id = %id, status = %to, "job status changed");
        Ok(job)
    }

    async fn require(&self, id: &JobId) -> Result<Job, LifecycleError> {
        self.store.find_job(id).await?.ok_or_else(|| LifecycleError::NotFound(id.clone()))
    }

    fn check(&self, job: &Job, to: JobStatus) -> Result<(), LifecycleError> {
        if job.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition { id: job.id.clone(), from: job.status, to })
        }
    }
}

/// Last write wins per entity; entities absent from `newer` are kept.
fn merge_resume(stored: Option<ResumeState>, newer: ResumeState) -> ResumeState {
    let mut merged = stored.unwrap_or_default();
    merged.merge(newer);
    merged
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
