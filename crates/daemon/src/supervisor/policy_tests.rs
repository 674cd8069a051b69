// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use std::os::unix::process::ExitStatusExt;
use yare::parameterized;

#[test]
fn backoff_sequence_doubles_then_caps() {
    let policy = RestartPolicy::default();
    let delays: Vec<u64> = (0..8).map(|n| policy.backoff(n).as_millis() as u64).collect();
    assert_eq!(delays, vec![0, 1000, 2000, 4000, 8000, 16000, 30000, 30000]);
}

#[test]
fn consecutive_crashes_wait_longer_each_time() {
    let policy = RestartPolicy::default();
    let mut tracker = RestartTracker::default();
    let delays: Vec<Duration> = (0..3)
        .map(|_| match tracker.on_exit(ExitOutcome::Code(1), &policy) {
            RestartDecision::Restart { delay, .. } => delay,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(
        delays,
        vec![Duration::from_millis(1000), Duration::from_millis(2000), Duration::from_millis(4000)]
    );
}

#[test]
fn clean_exit_resets_counter_and_stays_down() {
    let policy = RestartPolicy::default();
    let mut tracker = RestartTracker::default();
    tracker.on_exit(ExitOutcome::Signal(9), &policy);
    tracker.on_exit(ExitOutcome::Code(2), &policy);
    assert_eq!(tracker.restarts(), 2);

    assert_eq!(tracker.on_exit(ExitOutcome::Clean, &policy), RestartDecision::Stay);
    assert_eq!(tracker.restarts(), 0);
    assert_eq!(
        tracker.on_exit(ExitOutcome::Code(1), &policy),
        RestartDecision::Restart { attempt: 1, delay: Duration::from_millis(1000) }
    );
}

#[test]
fn gives_up_past_the_ceiling() {
    let policy = RestartPolicy::default();
    let mut tracker = RestartTracker::default();
    for attempt in 1..=20 {
        assert!(matches!(
            tracker.on_exit(ExitOutcome::SpawnFailed, &policy),
            RestartDecision::Restart { attempt: a, .. } if a == attempt
        ));
    }
    assert_eq!(
        tracker.on_exit(ExitOutcome::SpawnFailed, &policy),
        RestartDecision::GiveUp { restarts: 20 }
    );
}

#[parameterized(
    clean = { 0, ExitOutcome::Clean },
    failure = { 3 << 8, ExitOutcome::Code(3) },
    killed = { 9, ExitOutcome::Signal(9) },
)]
fn outcome_from_wait_status(raw: i32, expected: ExitOutcome) {
    assert_eq!(ExitOutcome::from_status(ExitStatus::from_raw(raw)), expected);
}

#[test]
fn policy_reads_from_toml() {
    let policy: RestartPolicy = toml::from_str("base_ms = 10\nmax_ms = 40\nmax_restarts = 3").unwrap();
    assert_eq!(policy.base, Duration::from_millis(10));
    assert_eq!(policy.max, Duration::from_millis(40));
    assert_eq!(policy.max_restarts, 3);

    let partial: RestartPolicy = toml::from_str("max_restarts = 5").unwrap();
    assert_eq!(partial.base, Duration::from_millis(1000));
}

proptest! {
    #[test]
    fn backoff_never_exceeds_max(restarts in 0u32..1000) {
        let policy = RestartPolicy::default();
        prop_assert!(policy.backoff(restarts) <= policy.max);
        if restarts > 0 {
            prop_assert!(policy.backoff(restarts) >= policy.base);
        }
    }
}
