// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turns discovered areas into area rows, authorizations and queued jobs.
//!
//! Every write relies on the store's uniqueness keys, so replaying a batch
//! (or two writers racing on the same batch) creates nothing new.

use hv_core::{
    AccountId, Area, AreaAuthorization, AreaType, DiscoveredArea, Job, JobCommand, JobId, NewJob,
};
use hv_storage::{Insert, JobPatch, JobStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

/// Default number of new jobs flagged for immediate pickup per batch.
pub const DEFAULT_PRIORITY_TOP_N: usize = 3;

/// Follow-up commands per area type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTable {
    group: Vec<JobCommand>,
    project: Vec<JobCommand>,
}

impl CommandTable {
    pub fn new(group: Vec<JobCommand>, project: Vec<JobCommand>) -> Self {
        Self { group, project }
    }

    pub fn commands_for(&self, area_type: AreaType) -> &[JobCommand] {
        match area_type {
            AreaType::Group => &self.group,
            AreaType::Project => &self.project,
        }
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        use JobCommand::*;
        Self {
            group: vec![GroupProjects, GroupSubgroups, GroupMembers, GroupLabels, GroupMilestones],
            project: vec![
                ProjectIssues,
                ProjectMergeRequests,
                ProjectCommits,
                ProjectBranches,
                ProjectPipelines,
                ProjectMembers,
                ProjectLabels,
                ProjectMilestones,
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub commands: CommandTable,
    /// How many newly created jobs get the `priority` flag. Zero disables it.
    pub priority_top_n: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { commands: CommandTable::default(), priority_top_n: DEFAULT_PRIORITY_TOP_N }
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("area {path}: {source}")]
    Area {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("{command} for {path}: {source}")]
    Job {
        path: String,
        command: JobCommand,
        #[source]
        source: StoreError,
    },

    #[error("listing areas for {account}: {source}")]
    Lookup {
        account: AccountId,
        #[source]
        source: StoreError,
    },
}

/// What one discovery batch did.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub areas_created: usize,
    pub authorizations_created: usize,
    pub jobs_created: Vec<Job>,
    /// Jobs that already existed.
    pub already_scheduled: usize,
    /// Newly created jobs flagged for immediate pickup.
    pub prioritized: Vec<Job>,
    pub failures: Vec<DiscoveryError>,
}

impl DiscoveryReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct DiscoveryHandler {
    store: Arc<dyn JobStore>,
    config: DiscoveryConfig,
}

impl DiscoveryHandler {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self::with_config(store, DiscoveryConfig::default())
    }

    pub fn with_config(store: Arc<dyn JobStore>, config: DiscoveryConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Process a `jobs_discovered` batch reported by `parent` for `account`.
    pub async fn handle(
        &self,
        account: &AccountId,
        parent: Option<&JobId>,
        areas: Vec<DiscoveredArea>,
    ) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        let mut stored = Vec::with_capacity(areas.len());

        for area in areas {
            let path = area.full_path.clone();
            match self.store.upsert_area(area).await {
                Ok(insert) => {
                    if insert.is_created() {
                        report.areas_created += 1;
                    }
                    stored.push(insert.into_inner());
                }
                Err(source) => {
                    tracing::warn!(
                        account = %account,
                        path = %path,
                        error = %source,
                        "area upsert failed"
                    );
                    report.failures.push(DiscoveryError::Area { path, source });
                }
            }
        }

        for area in &stored {
            let auth = AreaAuthorization {
                account_id: account.clone(),
                area_path: area.full_path.clone(),
            };
            match self.store.create_area_authorization(auth).await {
                Ok(insert) if insert.is_created() => report.authorizations_created += 1,
                Ok(_) => {}
                Err(source) => {
                    tracing::warn!(
                        account = %account,
                        path = %area.full_path,
                        error = %source,
                        "authorization failed"
                    );
                    report
                        .failures
                        .push(DiscoveryError::Area { path: area.full_path.clone(), source });
                }
            }
        }

        self.schedule(account, parent, &stored, &mut report).await;
        self.prioritize(&mut report).await;

        tracing::info!(
            account = %account,
            areas = stored.len(),
            areas_created = report.areas_created,
            jobs_created = report.jobs_created.len(),
            already_scheduled = report.already_scheduled,
            failures = report.failures.len(),
            "discovery batch processed"
        );
        report
    }

    /// Re-derive jobs for every area authorized to `account`.
    pub async fn spawn_for_account(
        &self,
        account: &AccountId,
        parent: Option<&JobId>,
    ) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        let areas = match self.store.areas_for_account(account).await {
            Ok(areas) => areas,
            Err(source) => {
                tracing::error!(account = %account, error = %source, "cannot list areas");
                report.failures.push(DiscoveryError::Lookup { account: account.clone(), source });
                return report;
            }
        };
        self.schedule(account, parent, &areas, &mut report).await;
        self.prioritize(&mut report).await;
        tracing::info!(
            account = %account,
            areas = areas.len(),
            jobs_created = report.jobs_created.len(),
            already_scheduled = report.already_scheduled,
            "spawned jobs for account"
        );
        report
    }

    async fn schedule(
        &self,
        fallback_account: &AccountId,
        parent: Option<&JobId>,
        areas: &[Area],
        report: &mut DiscoveryReport,
    ) {
        for area in areas {
            let accounts = match self.store.accounts_for_area(&area.full_path).await {
                Ok(accounts) if !accounts.is_empty() => accounts,
                Ok(_) => vec![fallback_account.clone()],
                Err(source) => {
                    tracing::warn!(
                        path = %area.full_path,
                        error = %source,
                        "cannot list area accounts"
                    );
                    report.failures.push(DiscoveryError::Area {
                        path: area.full_path.clone(),
                        source,
                    });
                    continue;
                }
            };

            for &command in self.config.commands.commands_for(area.area_type) {
                for account in &accounts {
                    let mut job = NewJob::new(command, account.clone()).full_path(&area.full_path);
                    if let Some(parent) = parent {
                        job = job.spawned_from(parent.clone());
                    }
                    match self.store.create_job(job).await {
                        Ok(Insert::Created(job)) => {
                            tracing::debug!(
                                job_id = %job.id,
                                command = %command,
                                path = %area.full_path,
                                "job scheduled"
                            );
                            report.jobs_created.push(job);
                        }
                        Ok(Insert::Existing(_)) => report.already_scheduled += 1,
                        Err(source) => {
                            tracing::warn!(
                                command = %command,
                                path = %area.full_path,
                                error = %source,
                                "job creation failed"
                            );
                            report.failures.push(DiscoveryError::Job {
                                path: area.full_path.clone(),
                                command,
                                source,
                            });
                        }
                    }
                }
            }
        }
    }

    async fn prioritize(&self, report: &mut DiscoveryReport) {
        let mut ranked: Vec<&Job> = report.jobs_created.iter().collect();
        ranked.sort_by_key(|job| (job.command.priority_rank(), job.created_at));
        let picks: Vec<JobId> =
            ranked.into_iter().take(self.config.priority_top_n).map(|j| j.id.clone()).collect();

        for id in picks {
            let patch = JobPatch { priority: Some(true), ..Default::default() };
            match self.store.update_job(&id, patch).await {
                Ok(job) => {
                    if let Some(slot) = report.jobs_created.iter_mut().find(|j| j.id == id) {
                        slot.priority = true;
                    }
                    report.prioritized.push(job);
                }
                // The job stays queued, just without the hint.
                Err(e) => tracing::warn!(job_id = %id, error = %e, "priority flag not set"),
            }
        }
    }
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
