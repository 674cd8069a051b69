// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn from_crawler(target: Target, kind: &str) -> Envelope {
    Envelope::new(Peer::Crawler, target, kind, json!({"n": 1}))
}

#[test]
fn ready_is_handled_locally() {
    assert_eq!(
        route(ProcessName::Backend, Envelope::new(Peer::Backend, Target::Supervisor, "ready", json!(null))),
        vec![Route::Ready(ProcessName::Backend)]
    );
}

#[test]
fn ping_is_answered_with_pong_to_sender() {
    let routes = route(ProcessName::Crawler, from_crawler(Target::Supervisor, "ping"));
    let [Route::Forward { to, envelope }] = routes.as_slice() else {
        panic!("expected one forward, got {routes:?}");
    };
    assert_eq!(*to, ProcessName::Crawler);
    assert_eq!(envelope.kind, "pong");
    assert_eq!(envelope.source, Peer::Supervisor);
    assert_eq!(envelope.target, Target::Crawler);
    assert_eq!(envelope.payload, json!({"n": 1}));
}

#[test]
fn other_supervisor_types_are_unhandled() {
    assert_eq!(
        route(ProcessName::Crawler, from_crawler(Target::Supervisor, "metrics")),
        vec![Route::Unhandled { from: ProcessName::Crawler, kind: "metrics".into() }]
    );
}

#[test]
fn broadcast_skips_the_sender() {
    let envelope = from_crawler(Target::Broadcast, "status");
    assert_eq!(
        route(ProcessName::Crawler, envelope.clone()),
        vec![Route::Forward { to: ProcessName::Backend, envelope }]
    );
}

#[parameterized(
    to_backend = { Target::Backend, ProcessName::Backend },
    to_crawler = { Target::Crawler, ProcessName::Crawler },
)]
fn direct_targets_are_forwarded(target: Target, expected: ProcessName) {
    let envelope = from_crawler(target, "job_update");
    assert_eq!(
        route(ProcessName::Crawler, envelope.clone()),
        vec![Route::Forward { to: expected, envelope }]
    );
}
