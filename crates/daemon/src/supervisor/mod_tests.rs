// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::{FileConfig, ProcessSpec};

/// Exits cleanly once a shutdown frame (or EOF) arrives on stdin.
const QUIET: &str = r#"while read -r line; do case "$line" in *shutdown*) exit 0;; esac; done"#;
/// Ignores stdin entirely.
const STUBBORN: &str = "exec sleep 30";

fn sh(script: &str) -> ProcessSpec {
    ProcessSpec::new("sh").arg("-c").arg(script)
}

fn sh_out(script: &str, out: &Path) -> ProcessSpec {
    let mut spec = sh(script);
    spec.env.insert("OUT".to_string(), out.display().to_string());
    spec
}

fn config(dir: &Path, crawler: ProcessSpec, backend: ProcessSpec, grace: Duration) -> SupervisorConfig {
    let restart = RestartPolicy {
        base: Duration::from_millis(10),
        max: Duration::from_millis(40),
        max_restarts: 3,
    };
    config_with(dir, crawler, backend, grace, restart)
}

fn config_with(
    dir: &Path,
    crawler: ProcessSpec,
    backend: ProcessSpec,
    grace: Duration,
    restart: RestartPolicy,
) -> SupervisorConfig {
    let file = FileConfig {
        restart,
        crawler: Some(crawler),
        backend: Some(backend),
        ..Default::default()
    };
    SupervisorConfig::from_parts(dir.to_path_buf(), dir.join("crawler.sock"), file, Some(grace))
        .unwrap()
}

async fn wait_for(
    handle: &SupervisorHandle,
    done: impl Fn(&[ProcessStatus]) -> bool,
) -> Vec<ProcessStatus> {
    for _ in 0..400 {
        if let Some(statuses) = handle.status().await {
            if done(&statuses) {
                return statuses;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("supervisor never reached the expected state");
}

async fn wait_for_file(path: &Path) -> String {
    for _ in 0..400 {
        if let Ok(text) = std::fs::read_to_string(path) {
            if text.ends_with('\n') {
                return text;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("{} was never written", path.display());
}

fn state_of(statuses: &[ProcessStatus], name: ProcessName) -> ProcessState {
    statuses.iter().find(|s| s.name == name).map(|s| s.state).unwrap()
}

#[tokio::test]
async fn ready_frames_mark_processes_ready() {
    let dir = tempfile::tempdir().unwrap();
    let ready = |from: &str| {
        format!(
            r#"echo '@@HV-IPC@@ {{"source":"{from}","target":"supervisor","type":"ready"}}'; {QUIET}"#
        )
    };
    let supervisor = Supervisor::new(config(
        dir.path(),
        sh(&ready("crawler")),
        sh(&ready("backend")),
        Duration::from_secs(5),
    ));
    let handle = supervisor.handle();
    let task = tokio::spawn(supervisor.serve());

    let statuses =
        wait_for(&handle, |s| s.iter().all(|p| p.state == ProcessState::Ready)).await;
    assert!(statuses.iter().all(|p| p.pid.is_some() && p.restarts == 0));

    handle.signal().await;
    assert_eq!(task.await.unwrap().unwrap(), 0);
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("reply");
    let crawler = format!(
        r#"echo '@@HV-IPC@@ {{"source":"crawler","target":"supervisor","type":"ping","payload":{{"n":7}}}}'; read -r reply; printf '%s\n' "$reply" > "$OUT"; {QUIET}"#
    );
    let supervisor = Supervisor::new(config(
        dir.path(),
        sh_out(&crawler, &out),
        sh(QUIET),
        Duration::from_secs(5),
    ));
    let handle = supervisor.handle();
    let task = tokio::spawn(supervisor.serve());

    let reply = wait_for_file(&out).await;
    let envelope = hv_wire::parse_line(&reply).unwrap().unwrap();
    assert_eq!(envelope.kind, "pong");
    assert_eq!(envelope.source, hv_wire::Peer::Supervisor);
    assert_eq!(envelope.payload, serde_json::json!({ "n": 7 }));

    handle.signal().await;
    assert_eq!(task.await.unwrap().unwrap(), 0);
}

#[tokio::test]
async fn broadcast_reaches_the_other_process() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("seen");
    let crawler = format!(
        r#"echo '@@HV-IPC@@ {{"source":"crawler","target":"broadcast","type":"hello","payload":"hi"}}'; {QUIET}"#
    );
    let backend = format!(r#"read -r line; printf '%s\n' "$line" > "$OUT"; {QUIET}"#);
    let supervisor = Supervisor::new(config(
        dir.path(),
        sh(&crawler),
        sh_out(&backend, &out),
        Duration::from_secs(5),
    ));
    let handle = supervisor.handle();
    let task = tokio::spawn(supervisor.serve());

    let seen = wait_for_file(&out).await;
    let envelope = hv_wire::parse_line(&seen).unwrap().unwrap();
    assert_eq!(envelope.kind, "hello");
    assert_eq!(envelope.source, hv_wire::Peer::Crawler);

    handle.signal().await;
    assert_eq!(task.await.unwrap().unwrap(), 0);
}

#[tokio::test]
async fn crashing_process_is_restarted_until_the_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("runs");
    let supervisor = Supervisor::new(config(
        dir.path(),
        sh_out(r#"echo run >> "$OUT"; exit 3"#, &out),
        sh(QUIET),
        Duration::from_secs(5),
    ));
    let handle = supervisor.handle();
    let task = tokio::spawn(supervisor.serve());

    let statuses =
        wait_for(&handle, |s| state_of(s, ProcessName::Crawler) == ProcessState::Failed).await;
    assert_eq!(state_of(&statuses, ProcessName::Backend), ProcessState::Starting);
    let runs = std::fs::read_to_string(&out).unwrap();
    assert_eq!(runs.lines().count(), 4);

    handle.signal().await;
    assert_eq!(task.await.unwrap().unwrap(), 0);
}

#[tokio::test]
async fn restart_delays_double_between_crashes() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("spawns");
    let restart = RestartPolicy {
        base: Duration::from_millis(100),
        max: Duration::from_secs(5),
        max_restarts: 3,
    };
    let supervisor = Supervisor::new(config_with(
        dir.path(),
        sh_out(r#"date +%s%N >> "$OUT"; exit 1"#, &out),
        sh(QUIET),
        Duration::from_secs(5),
        restart,
    ));
    let handle = supervisor.handle();
    let task = tokio::spawn(supervisor.serve());

    wait_for(&handle, |s| state_of(s, ProcessName::Crawler) == ProcessState::Failed).await;
    let spawns: Vec<u128> = std::fs::read_to_string(&out)
        .unwrap()
        .lines()
        .map(|line| line.trim().parse().unwrap())
        .collect();
    assert_eq!(spawns.len(), 4);

    let gaps: Vec<u128> = spawns.windows(2).map(|w| (w[1] - w[0]) / 1_000_000).collect();
    for (gap, expected) in gaps.iter().zip([100u128, 200, 400]) {
        assert!(
            *gap >= expected && *gap < expected + 250,
            "gaps {gaps:?}ms, expected about 100, 200, 400"
        );
    }

    handle.signal().await;
    assert_eq!(task.await.unwrap().unwrap(), 0);
}

#[tokio::test]
async fn clean_exit_is_not_restarted() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::new(config(
        dir.path(),
        sh("exit 0"),
        sh(QUIET),
        Duration::from_secs(5),
    ));
    let handle = supervisor.handle();
    let task = tokio::spawn(supervisor.serve());

    let statuses =
        wait_for(&handle, |s| state_of(s, ProcessName::Crawler) == ProcessState::Stopped).await;
    let crawler = statuses.iter().find(|s| s.name == ProcessName::Crawler).unwrap();
    assert_eq!(crawler.restarts, 0);
    assert_eq!(crawler.pid, None);

    handle.signal().await;
    assert_eq!(task.await.unwrap().unwrap(), 0);
}

#[tokio::test]
async fn spawn_failure_counts_as_a_crash() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::new(config(
        dir.path(),
        ProcessSpec::new(dir.path().join("missing-binary").display().to_string()),
        sh(QUIET),
        Duration::from_secs(5),
    ));
    let handle = supervisor.handle();
    let task = tokio::spawn(supervisor.serve());

    let statuses =
        wait_for(&handle, |s| state_of(s, ProcessName::Crawler) == ProcessState::Failed).await;
    assert_eq!(state_of(&statuses, ProcessName::Backend), ProcessState::Starting);

    handle.signal().await;
    assert_eq!(task.await.unwrap().unwrap(), 0);
}

#[tokio::test]
async fn grace_expiry_kills_stubborn_processes() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::new(config(
        dir.path(),
        sh(STUBBORN),
        sh(QUIET),
        Duration::from_millis(200),
    ));
    let handle = supervisor.handle();
    let task = tokio::spawn(supervisor.serve());
    wait_for(&handle, |s| s.iter().all(|p| p.pid.is_some())).await;

    let started = Instant::now();
    handle.signal().await;
    let code = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    assert_eq!(code, 0);
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn second_signal_forces_exit_130() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::new(config(
        dir.path(),
        sh(STUBBORN),
        sh(STUBBORN),
        Duration::from_secs(30),
    ));
    let handle = supervisor.handle();
    let task = tokio::spawn(supervisor.serve());
    wait_for(&handle, |s| s.iter().all(|p| p.pid.is_some())).await;

    handle.signal().await;
    handle.signal().await;
    let code = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    assert_eq!(code, FORCED_EXIT_CODE);
}

#[test]
fn lock_is_exclusive_and_records_pid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run").join("hvd.pid");

    let held = acquire_lock(&path).unwrap();
    let pid = std::fs::read_to_string(&path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());

    assert!(matches!(acquire_lock(&path), Err(SupervisorError::LockFailed { .. })));
    drop(held);
    assert!(acquire_lock(&path).is_ok());
}
