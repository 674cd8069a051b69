// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{AreaType, DiscoveredArea, JobCommand, NewJob};

// ── Proptest strategies ─────────────────────────────────────────────────

pub mod strategies {
    use crate::{JobCommand, JobStatus};
    use proptest::prelude::*;

    pub fn arb_job_status() -> impl Strategy<Value = JobStatus> {
        proptest::sample::select(JobStatus::ALL.to_vec())
    }

    pub fn arb_job_command() -> impl Strategy<Value = JobCommand> {
        prop_oneof![
            Just(JobCommand::Authorization),
            Just(JobCommand::GroupProjects),
            Just(JobCommand::GroupMembers),
            Just(JobCommand::GroupLabels),
            Just(JobCommand::ProjectIssues),
            Just(JobCommand::ProjectCommits),
            Just(JobCommand::ProjectMergeRequests),
        ]
    }
}

// ── Factory functions ───────────────────────────────────────────────────

pub fn group(id: u64, path: &str) -> DiscoveredArea {
    DiscoveredArea::new(AreaType::Group, id, path.rsplit('/').next().unwrap_or(path), path)
}

pub fn project(id: u64, path: &str) -> DiscoveredArea {
    DiscoveredArea::new(AreaType::Project, id, path.rsplit('/').next().unwrap_or(path), path)
}

pub fn project_job(command: JobCommand, account: &str, path: &str) -> NewJob {
    NewJob::new(command, account).full_path(path)
}
