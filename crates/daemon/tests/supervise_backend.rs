// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs the real `hv-backend` binary under the supervisor.

#![allow(clippy::unwrap_used, clippy::panic)]

use hv_daemon::supervisor::{ProcessState, ProcessStatus};
use hv_daemon::{FileConfig, ProcessSpec, Supervisor, SupervisorConfig, SupervisorHandle};
use hv_wire::ProcessName;
use std::time::Duration;

const QUIET: &str = r#"while read -r line; do case "$line" in *shutdown*) exit 0;; esac; done"#;

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

#[tokio::test]
async fn backend_reports_ready_and_snapshots_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let file = FileConfig {
        crawler: Some(ProcessSpec::new("sh").arg("-c").arg(QUIET)),
        backend: Some(ProcessSpec::new(env!("CARGO_BIN_EXE_hv-backend"))),
        ..Default::default()
    };
    let config = SupervisorConfig::from_parts(
        dir.path().to_path_buf(),
        dir.path().join("crawler.sock"),
        file,
        Some(Duration::from_secs(5)),
    )
    .unwrap();

    let supervisor = Supervisor::new(config);
    let handle = supervisor.handle();
    let task = tokio::spawn(supervisor.serve());

    wait_for(&handle, |statuses| {
        statuses.iter().any(|s| s.name == ProcessName::Backend && s.state == ProcessState::Ready)
    })
    .await;

    handle.signal().await;
    let code = tokio::time::timeout(Duration::from_secs(10), task).await.unwrap().unwrap().unwrap();
    assert_eq!(code, 0);
    assert!(dir.path().join("jobs.snapshot").exists());
}
