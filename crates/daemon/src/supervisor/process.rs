// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process spawning and per-child I/O tasks.

use hv_wire::{FrameReader, Line, ProcessName, ProtocolError};
use std::process::Stdio;
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};

use super::policy::{ExitOutcome, RestartTracker};
use super::SupervisorEvent;
use crate::config::ProcessSpec;

/// Events produced by a child's reader and waiter tasks.
#[derive(Debug)]
pub enum ProcessEvent {
    Line { name: ProcessName, generation: u64, line: Line },
    Exited { name: ProcessName, generation: u64, outcome: ExitOutcome },
}

/// A live child.
pub struct Running {
    pub pid: Option<u32>,
    pub stdin: ChildStdin,
    kill: Option<oneshot::Sender<()>>,
}

impl Running {
    /// Ask the waiter task to SIGKILL the child.
    pub fn kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Starting,
    Ready,
    Restarting,
    Stopped,
    Failed,
}

hv_core::simple_display! {
    ProcessState {
        Starting => "starting",
        Ready => "ready",
        Restarting => "restarting",
        Stopped => "stopped",
        Failed => "failed",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStatus {
    pub name: ProcessName,
    pub state: ProcessState,
    pub pid: Option<u32>,
    pub restarts: u32,
}

/// Supervisor-side record of one managed process.
pub struct ProcessSlot {
    pub name: ProcessName,
    pub spec: ProcessSpec,
    pub tracker: RestartTracker,
    /// Bumped on every spawn so events from an earlier child are ignored.
    pub generation: u64,
    pub running: Option<Running>,
    pub ready: bool,
    pub restart_pending: bool,
    pub failed: bool,
}

impl ProcessSlot {
    pub fn new(name: ProcessName, spec: ProcessSpec) -> Self {
        Self {
            name,
            spec,
            tracker: RestartTracker::default(),
            generation: 0,
            running: None,
            ready: false,
            restart_pending: false,
            failed: false,
        }
    }

    pub fn is_live(&self) -> bool {
        self.running.is_some()
    }

    pub fn status(&self) -> ProcessStatus {
        let state = match (&self.running, self.ready) {
            (Some(_), true) => ProcessState::Ready,
            (Some(_), false) => ProcessState::Starting,
            (None, _) if self.failed => ProcessState::Failed,
            (None, _) if self.restart_pending => ProcessState::Restarting,
            (None, _) => ProcessState::Stopped,
        };
        ProcessStatus {
            name: self.name,
            state,
            pid: self.running.as_ref().and_then(|r| r.pid),
            restarts: self.tracker.restarts(),
        }
    }
}

/// Spawn a child with piped stdin/stdout and inherited stderr, plus the
/// tasks that read its stdout and wait for its exit.
pub fn spawn(
    name: ProcessName,
    spec: &ProcessSpec,
    env: &[(String, String)],
    generation: u64,
    events: mpsc::Sender<SupervisorEvent>,
) -> std::io::Result<Running> {
    let mut command = Command::new(&spec.command);
    command
        .args(&spec.args)
        .envs(env.iter().map(|(k, v)| (k, v)))
        .envs(&spec.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }

    let mut child = command.spawn()?;
    let pid = child.id();
    let stdin = child.stdin.take().ok_or_else(|| std::io::Error::other("child stdin not piped"))?;
    let stdout =
        child.stdout.take().ok_or_else(|| std::io::Error::other("child stdout not piped"))?;

    let lines = events.clone();
    tokio::spawn(async move {
        let mut reader = FrameReader::new(stdout);
        loop {
            match reader.next().await {
                Ok(Some(line)) => {
                    let event = ProcessEvent::Line { name, generation, line };
                    if lines.send(SupervisorEvent::Process(event)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(ProtocolError::MessageTooLarge { limit }) => {
                    tracing::warn!(process = %name, limit, "dropping oversized line");
                }
                Err(e) => {
                    tracing::warn!(process = %name, error = %e, "stdout read failed");
                    break;
                }
            }
        }
    });

    let (kill_tx, kill_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = kill_rx => {
                if let Err(e) = child.start_kill() {
                    tracing::warn!(process = %name, error = %e, "kill failed");
                }
                child.wait().await
            }
        };
        let outcome = match status {
            Ok(status) => ExitOutcome::from_status(status),
            Err(e) => {
                tracing::warn!(process = %name, error = %e, "wait failed");
                ExitOutcome::Code(-1)
            }
        };
        let event = ProcessEvent::Exited { name, generation, outcome };
        let _ = events.send(SupervisorEvent::Process(event)).await;
    });

    Ok(Running { pid, stdin, kill: Some(kill_tx) })
}
