// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crawl jobs and their uniqueness key.

use crate::account::AccountId;
use crate::progress::{Progress, ResumeState};
use crate::status::JobStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a crawl job.
    pub struct JobId("job-");
}

/// Which slice of an external service a command crawls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandScope {
    Account,
    Group,
    Project,
}

/// Kind of crawl work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCommand {
    /// Discover every area an account can see.
    Authorization,
    GroupProjects,
    GroupSubgroups,
    GroupMembers,
    GroupLabels,
    GroupMilestones,
    ProjectIssues,
    ProjectMergeRequests,
    ProjectCommits,
    ProjectBranches,
    ProjectPipelines,
    ProjectMembers,
    ProjectLabels,
    ProjectMilestones,
}

crate::simple_display! {
    JobCommand {
        Authorization => "authorization",
        GroupProjects => "group_projects",
        GroupSubgroups => "group_subgroups",
        GroupMembers => "group_members",
        GroupLabels => "group_labels",
        GroupMilestones => "group_milestones",
        ProjectIssues => "project_issues",
        ProjectMergeRequests => "project_merge_requests",
        ProjectCommits => "project_commits",
        ProjectBranches => "project_branches",
        ProjectPipelines => "project_pipelines",
        ProjectMembers => "project_members",
        ProjectLabels => "project_labels",
        ProjectMilestones => "project_milestones",
    }
}

impl JobCommand {
    pub fn is_discovery(self) -> bool {
        matches!(self, JobCommand::Authorization)
    }

    pub fn scope(self) -> CommandScope {
        use JobCommand::*;
        match self {
            Authorization => CommandScope::Account,
            GroupProjects | GroupSubgroups | GroupMembers | GroupLabels | GroupMilestones => {
                CommandScope::Group
            }
            ProjectIssues | ProjectMergeRequests | ProjectCommits | ProjectBranches
            | ProjectPipelines | ProjectMembers | ProjectLabels | ProjectMilestones => {
                CommandScope::Project
            }
        }
    }

    /// Static dispatch ranking; lower runs first.
    ///
    /// Structure-expanding commands come first so discovery fans out early,
    /// then the high-volume project entities.
    pub fn priority_rank(self) -> u8 {
        use JobCommand::*;
        match self {
            Authorization => 0,
            GroupProjects => 1,
            GroupSubgroups => 2,
            ProjectIssues => 3,
            ProjectMergeRequests => 4,
            GroupMembers => 5,
            ProjectMembers => 6,
            ProjectCommits => 7,
            ProjectPipelines => 8,
            ProjectBranches => 9,
            GroupLabels => 10,
            ProjectLabels => 11,
            GroupMilestones => 12,
            ProjectMilestones => 13,
        }
    }
}

/// Uniqueness key enforced by the job store.
///
/// Resource jobs are unique per `(full_path, branch, command)`. The discovery
/// command without a path or branch is unique per account instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKey {
    Resource { full_path: Option<String>, branch: Option<String>, command: JobCommand },
    Account { command: JobCommand, account_id: AccountId },
}

impl JobKey {
    pub fn for_job(
        command: JobCommand,
        account_id: &AccountId,
        full_path: Option<&str>,
        branch: Option<&str>,
    ) -> Self {
        if command.is_discovery() && full_path.is_none() && branch.is_none() {
            JobKey::Account { command, account_id: account_id.clone() }
        } else {
            JobKey::Resource {
                full_path: full_path.map(str::to_string),
                branch: branch.map(str::to_string),
                command,
            }
        }
    }
}

/// Request to create a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub command: JobCommand,
    pub account_id: AccountId,
    pub full_path: Option<String>,
    pub branch: Option<String>,
    pub spawned_from: Option<JobId>,
    pub resume_state: Option<ResumeState>,
    pub priority: bool,
}

impl NewJob {
    pub fn new(command: JobCommand, account_id: impl Into<AccountId>) -> Self {
        Self {
            command,
            account_id: account_id.into(),
            full_path: None,
            branch: None,
            spawned_from: None,
            resume_state: None,
            priority: false,
        }
    }

    /// The discovery job that seeds an account.
    pub fn authorization(account_id: impl Into<AccountId>) -> Self {
        Self::new(JobCommand::Authorization, account_id)
    }

    crate::setters! {
        set { priority: bool }
        option {
            full_path: String,
            branch: String,
            spawned_from: JobId,
            resume_state: ResumeState,
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey::for_job(
            self.command,
            &self.account_id,
            self.full_path.as_deref(),
            self.branch.as_deref(),
        )
    }

    /// Materialize the row the store will hold.
    pub fn into_job(self, id: JobId, created_at: DateTime<Utc>) -> Job {
        Job {
            id,
            command: self.command,
            status: JobStatus::Queued,
            full_path: self.full_path,
            branch: self.branch,
            account_id: self.account_id,
            spawned_from: self.spawned_from,
            resume_state: self.resume_state,
            progress: None,
            error: None,
            priority: self.priority,
            created_at,
            started_at: None,
            finished_at: None,
            assigned_at: None,
        }
    }
}

/// A stored crawl job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub command: JobCommand,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub account_id: AccountId,
    /// Parent discovery job. Back-reference only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawned_from: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_state: Option<ResumeState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub priority: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// When the job was last handed to the crawler. Blocks reassignment
    /// until the claim lease runs out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn key(&self) -> JobKey {
        JobKey::for_job(
            self.command,
            &self.account_id,
            self.full_path.as_deref(),
            self.branch.as_deref(),
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Human-readable target for logs: the resource path or the account.
    pub fn target(&self) -> &str {
        self.full_path.as_deref().unwrap_or(self.account_id.as_str())
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            id: JobId = "job-test0000000000000001",
            account_id: AccountId = "acc-1",
        }
        set {
            command: JobCommand = JobCommand::ProjectIssues,
            status: JobStatus = JobStatus::Queued,
            priority: bool = false,
        }
        option {
            full_path: String = None,
            branch: String = None,
            spawned_from: JobId = None,
            resume_state: ResumeState = None,
            progress: Progress = None,
            error: String = None,
            started_at: DateTime<Utc> = None,
            finished_at: DateTime<Utc> = None,
            assigned_at: DateTime<Utc> = None,
        }
        computed {
            created_at: DateTime<Utc> = DateTime::<Utc>::default(),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
