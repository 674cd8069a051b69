// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hv_core::{Clock, FakeClock};

fn crawler(clock: &FakeClock) -> Connection {
    Connection::new(ConnectionRole::Crawler, clock.now())
}

#[test]
fn new_connection_is_not_healthy_until_heartbeat() {
    let clock = FakeClock::new();
    let config = HealthConfig::default();
    let mut conn = crawler(&clock);
    assert!(!conn.is_healthy(clock.now(), &config));

    conn.record_heartbeat(clock.now(), 2);
    assert!(conn.is_healthy(clock.now(), &config));
    assert_eq!(conn.active_jobs, 2);
}

#[test]
fn heartbeat_window_is_120_seconds() {
    let clock = FakeClock::new();
    let config = HealthConfig::default();
    let mut conn = crawler(&clock);
    conn.record_heartbeat(clock.now(), 0);

    clock.advance(Duration::from_secs(120));
    assert!(conn.is_healthy(clock.now(), &config));
    clock.advance(Duration::from_secs(1));
    assert!(!conn.is_healthy(clock.now(), &config));
}

#[test]
fn missed_checks_turn_dead_once_the_window_has_passed() {
    let clock = FakeClock::new();
    let config = HealthConfig::default();
    let mut conn = crawler(&clock);
    conn.record_heartbeat(clock.now(), 0);

    for expected in 1..=4 {
        clock.advance(Duration::from_secs(30));
        assert_eq!(conn.check(clock.now(), &config), Health::Missed(expected));
        assert!(conn.is_healthy(clock.now(), &config));
    }
    clock.advance(Duration::from_secs(30));
    assert_eq!(conn.check(clock.now(), &config), Health::Dead);
    assert!(!conn.is_healthy(clock.now(), &config));
}

#[test]
fn never_dead_while_healthy() {
    let clock = FakeClock::new();
    let config = HealthConfig::default();
    let mut conn = crawler(&clock);
    conn.record_heartbeat(clock.now(), 0);

    for _ in 0..20 {
        clock.advance(Duration::from_secs(15));
        if conn.check(clock.now(), &config) == Health::Dead {
            assert!(!conn.is_healthy(clock.now(), &config));
        }
    }
}

#[test]
fn three_misses_without_any_heartbeat_mark_dead() {
    let clock = FakeClock::new();
    let config = HealthConfig::default();
    let mut conn = crawler(&clock);

    clock.advance(Duration::from_secs(30));
    assert_eq!(conn.check(clock.now(), &config), Health::Missed(1));
    clock.advance(Duration::from_secs(30));
    assert_eq!(conn.check(clock.now(), &config), Health::Missed(2));
    clock.advance(Duration::from_secs(30));
    assert_eq!(conn.check(clock.now(), &config), Health::Dead);
}

#[test]
fn heartbeat_resets_missed_count() {
    let clock = FakeClock::new();
    let config = HealthConfig::default();
    let mut conn = crawler(&clock);

    clock.advance(Duration::from_secs(30));
    assert_eq!(conn.check(clock.now(), &config), Health::Missed(1));
    clock.advance(Duration::from_secs(30));
    assert_eq!(conn.check(clock.now(), &config), Health::Missed(2));

    conn.record_heartbeat(clock.now(), 1);
    assert_eq!(conn.missed, 0);
    clock.advance(Duration::from_secs(10));
    assert_eq!(conn.check(clock.now(), &config), Health::Healthy);
}

#[test]
fn role_display() {
    assert_eq!(ConnectionRole::Crawler.to_string(), "crawler");
    assert_eq!(ConnectionRole::Admin.to_string(), "admin");
}
