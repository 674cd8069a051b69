// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routes validated crawler messages to the lifecycle manager, the discovery
//! handler and the heartbeat record, and produces the replies to send back.

use chrono::{DateTime, Utc};
use hv_core::{AccountId, Clock, Job, JobId};
use hv_storage::{Field, JobPatch, JobStore, StoreError};
use hv_wire::{HeartbeatData, JobAssignmentData, Message, MessageBody, MessageKind, SystemStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::credential::{CredentialError, CredentialProvider};
use crate::discovery::DiscoveryHandler;
use crate::lifecycle::{Failure, JobLifecycle, LifecycleError};

/// How long an assigned job stays hidden from other assignments while the
/// crawler has not reported it started.
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0} message without jobId")]
    MissingJobId(MessageKind),

    #[error("job not found: {0}")]
    UnknownJob(JobId),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Last heartbeat reported by the crawler.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlerStatus {
    pub system_status: SystemStatus,
    pub active_jobs: u64,
    pub uptime_seconds: Option<u64>,
    pub seen_at: DateTime<Utc>,
}

pub struct Dispatcher<C: Clock> {
    lifecycle: Arc<JobLifecycle<C>>,
    discovery: Arc<DiscoveryHandler>,
    store: Arc<dyn JobStore>,
    credentials: Arc<dyn CredentialProvider>,
    crawler: Mutex<Option<CrawlerStatus>>,
    claim_lease: Duration,
    clock: C,
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(
        lifecycle: Arc<JobLifecycle<C>>,
        discovery: Arc<DiscoveryHandler>,
        store: Arc<dyn JobStore>,
        credentials: Arc<dyn CredentialProvider>,
        clock: C,
    ) -> Self {
        Self {
            lifecycle,
            discovery,
            store,
            credentials,
            crawler: Mutex::new(None),
            claim_lease: DEFAULT_CLAIM_LEASE,
            clock,
        }
    }

    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    pub fn crawler_status(&self) -> Option<CrawlerStatus> {
        self.crawler.lock().clone()
    }

    /// Handle one inbound message. Returns the messages to send back.
    pub async fn dispatch(&self, message: Message) -> Result<Vec<Message>, DispatchError> {
        let kind = message.kind();
        let job_id = message.job_id.clone();
        let require_id = || job_id.clone().ok_or(DispatchError::MissingJobId(kind));

        match message.body {
            MessageBody::Heartbeat(data) => {
                self.record_heartbeat(data, message.timestamp);
                Ok(Vec::new())
            }
            MessageBody::JobStarted(_) => {
                self.lifecycle.on_started(&require_id()?).await?;
                Ok(Vec::new())
            }
            MessageBody::JobProgress(data) => {
                let id = require_id()?;
                self.lifecycle.on_progress(&id, &data.update(), data.resume_state).await?;
                Ok(Vec::new())
            }
            MessageBody::JobCompleted(data) => {
                let id = require_id()?;
                let update = data.final_progress();
                let completion = self.lifecycle.on_completed(&id, update.as_ref()).await?;
                match completion.spawned {
                    Some(report) => Ok(self.assign_all(&report.prioritized).await),
                    None => Ok(Vec::new()),
                }
            }
            MessageBody::JobFailed(data) => {
                let failure = Failure {
                    error: data.error,
                    recoverable: data.recoverable,
                    credential_expired: data.credential_expired,
                    resume_state: data.resume_state,
                };
                self.lifecycle.on_failed(&require_id()?, failure).await?;
                Ok(Vec::new())
            }
            MessageBody::JobsDiscovered(data) => {
                let parent = require_id()?;
                let account = match data.account_id {
                    Some(account) => account,
                    None => self.job(&parent).await?.account_id,
                };
                let report = self.discovery.handle(&account, Some(&parent), data.areas).await;
                Ok(self.assign_all(&report.prioritized).await)
            }
            MessageBody::JobRequest(data) => {
                let account = data.account_id.as_ref();
                let Some(job) = self.store.claim_next(account, self.claim_lease).await? else {
                    tracing::debug!(request_id = %data.request_id, "no queued job for request");
                    return Ok(Vec::new());
                };
                match self.assignment(&job, Some(data.request_id)).await {
                    Ok(reply) => Ok(vec![reply]),
                    Err(e) => {
                        self.release(&job).await;
                        Err(e)
                    }
                }
            }
            MessageBody::TokenRefreshRequest(data) => {
                // Bridged by the bus client before dispatch.
                tracing::debug!(request_id = %data.request_id, "token refresh request ignored");
                Ok(Vec::new())
            }
            MessageBody::JobAssignment(_)
            | MessageBody::TokenRefreshResponse(_)
            | MessageBody::Shutdown(_) => {
                tracing::warn!(kind = %kind, "unexpected outbound message type received");
                Ok(Vec::new())
            }
        }
    }

    /// Build the `job_assignment` for a claimed job.
    pub async fn assignment(
        &self,
        job: &Job,
        request_id: Option<String>,
    ) -> Result<Message, DispatchError> {
        let credential = self.credentials.credential(&job.account_id).await?;
        let data = JobAssignmentData {
            job_id: job.id.to_string(),
            token: credential.token,
            gitlab_url: credential.gitlab_url,
            command: job.command,
            full_path: job.full_path.clone(),
            branch: job.branch.clone(),
            resume_state: job.resume_state.clone(),
            request_id,
        };
        Ok(Message::now(&self.clock, MessageBody::JobAssignment(data)).for_job(job.id.clone()))
    }

    /// Start an account's crawl with its authorization job.
    pub async fn seed_account(
        &self,
        account: &AccountId,
    ) -> Result<Option<Message>, DispatchError> {
        let insert = self.lifecycle.create_authorization(account).await?;
        if !insert.is_created() {
            return Ok(None);
        }
        let Some(job) = self.store.claim_job(&insert.get().id, self.claim_lease).await? else {
            return Ok(None);
        };
        match self.assignment(&job, None).await {
            Ok(message) => Ok(Some(message)),
            Err(e) => {
                self.release(&job).await;
                Err(e)
            }
        }
    }

    /// The crawler asked for a new credential for `account`. Its expired
    /// jobs wait for the renewal.
    pub async fn credential_refresh_requested(
        &self,
        account: &AccountId,
    ) -> Result<Vec<Job>, DispatchError> {
        Ok(self.lifecycle.await_account_renewal(account).await?)
    }

    /// A new credential for `account` arrived. Its waiting jobs are renewed
    /// and handed back to the crawler with the new token.
    pub async fn credential_refreshed(
        &self,
        account: &AccountId,
        token: &str,
    ) -> Result<Vec<Message>, DispatchError> {
        self.credentials.record_renewal(account, token);
        let renewed = self.lifecycle.on_credential_renewed(account).await?;
        Ok(self.assign_all(&renewed).await)
    }

    /// Claim and assign each job; jobs claimed elsewhere are skipped.
    async fn assign_all(&self, jobs: &[Job]) -> Vec<Message> {
        let mut replies = Vec::with_capacity(jobs.len());
        for job in jobs {
            let claimed = match self.store.claim_job(&job.id, self.claim_lease).await {
                Ok(Some(claimed)) => claimed,
                Ok(None) => {
                    tracing::debug!(job_id = %job.id, "job already claimed");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(job_id = %job.id, error = %e, "cannot claim job");
                    continue;
                }
            };
            match self.assignment(&claimed, None).await {
                Ok(message) => replies.push(message),
                Err(e) => {
                    tracing::warn!(job_id = %job.id, error = %e, "cannot assign job");
                    self.release(&claimed).await;
                }
            }
        }
        replies
    }

    /// Drop a claim whose assignment never went out.
    async fn release(&self, job: &Job) {
        let patch = JobPatch {
            expected: Some(job.status),
            assigned_at: Field::Clear,
            ..Default::default()
        };
        if let Err(e) = self.store.update_job(&job.id, patch).await {
            tracing::warn!(job_id = %job.id, error = %e, "cannot release claim");
        }
    }

    async fn job(&self, id: &JobId) -> Result<Job, DispatchError> {
        self.store.find_job(id).await?.ok_or_else(|| DispatchError::UnknownJob(id.clone()))
    }

    fn record_heartbeat(&self, data: HeartbeatData, at: DateTime<Utc>) {
        tracing::debug!(
            status = ?data.system_status,
            active_jobs = data.active_jobs,
            "crawler heartbeat"
        );
        *self.crawler.lock() = Some(CrawlerStatus {
            system_status: data.system_status,
            active_jobs: data.active_jobs,
            uptime_seconds: data.uptime_seconds,
            seen_at: at,
        });
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
