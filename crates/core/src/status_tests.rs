// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::strategies::arb_job_status;
use proptest::prelude::*;

#[yare::parameterized(
    queued_to_running      = { JobStatus::Queued, JobStatus::Running },
    queued_to_paused       = { JobStatus::Queued, JobStatus::Paused },
    running_to_finished    = { JobStatus::Running, JobStatus::Finished },
    running_to_failed      = { JobStatus::Running, JobStatus::Failed },
    running_to_paused      = { JobStatus::Running, JobStatus::Paused },
    running_to_expired     = { JobStatus::Running, JobStatus::CredentialExpired },
    expired_to_waiting     = { JobStatus::CredentialExpired, JobStatus::WaitingCredentialRenewal },
    waiting_to_renewed     = { JobStatus::WaitingCredentialRenewal, JobStatus::CredentialRenewed },
    renewed_to_running     = { JobStatus::CredentialRenewed, JobStatus::Running },
    failed_requeue         = { JobStatus::Failed, JobStatus::Queued },
    paused_requeue         = { JobStatus::Paused, JobStatus::Queued },
)]
fn allowed_transition(from: JobStatus, to: JobStatus) {
    assert!(from.can_transition_to(to), "{from} -> {to} should be allowed");
}

#[yare::parameterized(
    finished_to_running    = { JobStatus::Finished, JobStatus::Running },
    finished_to_queued     = { JobStatus::Finished, JobStatus::Queued },
    failed_to_running      = { JobStatus::Failed, JobStatus::Running },
    paused_to_running      = { JobStatus::Paused, JobStatus::Running },
    queued_to_finished     = { JobStatus::Queued, JobStatus::Finished },
    expired_to_paused      = { JobStatus::CredentialExpired, JobStatus::Paused },
    waiting_to_paused      = { JobStatus::WaitingCredentialRenewal, JobStatus::Paused },
    renewed_to_paused      = { JobStatus::CredentialRenewed, JobStatus::Paused },
    queued_to_expired      = { JobStatus::Queued, JobStatus::CredentialExpired },
)]
fn rejected_transition(from: JobStatus, to: JobStatus) {
    assert!(!from.can_transition_to(to), "{from} -> {to} should be rejected");
}

#[test]
fn status_serializes_snake_case() {
    let json = serde_json::to_string(&JobStatus::WaitingCredentialRenewal).unwrap();
    assert_eq!(json, "\"waiting_credential_renewal\"");
    assert_eq!(JobStatus::WaitingCredentialRenewal.to_string(), "waiting_credential_renewal");
}

proptest! {
    #[test]
    fn paused_only_reachable_from_queued_or_running(from in arb_job_status()) {
        if from.can_transition_to(JobStatus::Paused) {
            prop_assert!(matches!(from, JobStatus::Queued | JobStatus::Running));
        }
    }

    #[test]
    fn terminal_states_only_leave_through_requeue(from in arb_job_status(), to in arb_job_status()) {
        if from.is_terminal() && from.can_transition_to(to) {
            prop_assert_eq!(from, JobStatus::Failed);
            prop_assert_eq!(to, JobStatus::Queued);
        }
    }
}

#[test]
fn only_queued_and_renewed_jobs_are_assignable() {
    let assignable: Vec<_> = JobStatus::ALL.into_iter().filter(|s| s.is_assignable()).collect();
    assert_eq!(assignable, vec![JobStatus::Queued, JobStatus::CredentialRenewed]);
}
