// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process supervisor.
//!
//! A single event loop owns every [`ProcessSlot`]. Child output, child exits,
//! restart timers, signals and status queries all arrive on one mpsc
//! channel, so slot state is never shared.

mod policy;
mod process;
mod router;
mod shutdown;

pub use policy::{ExitOutcome, RestartDecision, RestartPolicy, RestartTracker};
pub use process::{ProcessEvent, ProcessSlot, ProcessState, ProcessStatus};
pub use router::{route, Route};
pub use shutdown::{ShutdownAction, ShutdownPhase, ShutdownState, FORCED_EXIT_CODE};

use fs2::FileExt;
use hv_wire::{write_frame, Envelope, Line, ProcessName};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, oneshot};

use crate::config::SupervisorConfig;

/// How long a forced shutdown waits for killed children to be reaped.
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("another supervisor holds {path}")]
    LockFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("event channel closed")]
    ChannelClosed,
}

#[derive(Debug)]
pub enum SupervisorEvent {
    Process(ProcessEvent),
    RestartDue { name: ProcessName, generation: u64 },
    Signal,
    Status(oneshot::Sender<Vec<ProcessStatus>>),
}

/// Cloneable entry point into a running supervisor.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<SupervisorEvent>,
}

impl SupervisorHandle {
    /// Deliver the equivalent of SIGINT/SIGTERM.
    pub async fn signal(&self) {
        let _ = self.tx.send(SupervisorEvent::Signal).await;
    }

    pub async fn status(&self) -> Option<Vec<ProcessStatus>> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(SupervisorEvent::Status(tx)).await.ok()?;
        rx.await.ok()
    }
}

pub struct Supervisor {
    config: SupervisorConfig,
    slots: BTreeMap<ProcessName, ProcessSlot>,
    shutdown: ShutdownState,
    tx: mpsc::Sender<SupervisorEvent>,
    rx: mpsc::Receiver<SupervisorEvent>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let (tx, rx) = mpsc::channel(256);
        let slots = config
            .processes
            .iter()
            .map(|(name, spec)| (*name, ProcessSlot::new(*name, spec.clone())))
            .collect();
        Self { shutdown: ShutdownState::new(config.grace), config, slots, tx, rx }
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle { tx: self.tx.clone() }
    }

    /// Run with SIGINT/SIGTERM wired in. Returns the process exit code.
    pub async fn run(self) -> Result<i32, SupervisorError> {
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let handle = self.handle();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = interrupt.recv() => tracing::info!("SIGINT received"),
                    _ = terminate.recv() => tracing::info!("SIGTERM received"),
                }
                handle.signal().await;
            }
        });
        self.serve().await
    }

    /// Event loop without OS signal handlers; signals come through
    /// [`SupervisorHandle::signal`].
    pub async fn serve(mut self) -> Result<i32, SupervisorError> {
        match self.event_loop().await {
            Ok(code) => Ok(code),
            Err(e) => {
                tracing::error!(error = %e, "supervisor failed, forcing shutdown");
                if let ShutdownAction::KillAll { .. } = self.shutdown.on_error() {
                    self.kill_all().await;
                }
                Err(e)
            }
        }
    }

    async fn event_loop(&mut self) -> Result<i32, SupervisorError> {
        for name in ProcessName::ALL {
            self.start_process(name);
        }

        loop {
            let deadline = self.shutdown.deadline();
            let event = tokio::select! {
                event = self.rx.recv() => event.ok_or(SupervisorError::ChannelClosed)?,
                _ = until(deadline) => {
                    let action = self.shutdown.on_tick(Instant::now());
                    if let ShutdownAction::KillAll { exit_code } = action {
                        let grace_ms = self.config.grace.as_millis() as u64;
                        tracing::warn!(grace_ms, "grace period elapsed");
                        self.kill_all().await;
                        return Ok(exit_code);
                    }
                    continue;
                }
            };
            if let Some(code) = self.handle_event(event).await {
                return Ok(code);
            }
        }
    }

    async fn handle_event(&mut self, event: SupervisorEvent) -> Option<i32> {
        match event {
            SupervisorEvent::Process(ProcessEvent::Line { name, generation, line }) => {
                if self.is_current(name, generation) {
                    self.on_line(name, line).await;
                }
                None
            }
            SupervisorEvent::Process(ProcessEvent::Exited { name, generation, outcome }) => {
                if !self.is_current(name, generation) {
                    return None;
                }
                self.on_exit(name, outcome)
            }
            SupervisorEvent::RestartDue { name, generation } => {
                let due = self.shutdown.is_running() && self.is_current(name, generation);
                if let Some(slot) = self.slots.get_mut(&name) {
                    slot.restart_pending = false;
                }
                if due {
                    self.start_process(name);
                }
                None
            }
            SupervisorEvent::Signal => self.on_signal().await,
            SupervisorEvent::Status(reply) => {
                let _ = reply.send(self.slots.values().map(ProcessSlot::status).collect());
                None
            }
        }
    }

    /// Spawn `name`. A spawn failure goes through the restart policy like
    /// any other crash. Returns the pid of the live child.
    pub fn start_process(&mut self, name: ProcessName) -> Option<u32> {
        let env = self.config.child_env();
        let tx = self.tx.clone();
        let slot = self.slots.get_mut(&name)?;
        slot.generation += 1;
        match process::spawn(name, &slot.spec, &env, slot.generation, tx) {
            Ok(running) => {
                let pid = running.pid;
                slot.running = Some(running);
                slot.ready = false;
                tracing::info!(
                    process = %name,
                    pid = ?pid,
                    command = %slot.spec.command,
                    "process started"
                );
                pid
            }
            Err(e) => {
                tracing::error!(
                    process = %name,
                    command = %slot.spec.command,
                    error = %e,
                    "spawn failed"
                );
                self.apply_policy(name, ExitOutcome::SpawnFailed);
                None
            }
        }
    }

    fn is_current(&self, name: ProcessName, generation: u64) -> bool {
        self.slots.get(&name).is_some_and(|slot| slot.generation == generation)
    }

    async fn on_line(&mut self, name: ProcessName, line: Line) {
        match line {
            Line::Frame(envelope) => {
                for r in route(name, envelope) {
                    match r {
                        Route::Forward { to, envelope } => self.forward(to, &envelope).await,
                        Route::Ready(from) => {
                            if let Some(slot) = self.slots.get_mut(&from) {
                                slot.ready = true;
                            }
                            tracing::info!(process = %from, "process ready");
                        }
                        Route::Unhandled { from, kind } => {
                            tracing::info!(
                                process = %from,
                                kind = %kind,
                                "unhandled supervisor message"
                            );
                        }
                    }
                }
            }
            Line::Log(text) => tracing::debug!(process = %name, "{text}"),
            Line::Malformed { raw, error } => {
                tracing::warn!(
                    process = %name,
                    error = %error,
                    line = %raw,
                    "malformed frame dropped"
                );
            }
        }
    }

    async fn forward(&mut self, to: ProcessName, envelope: &Envelope) {
        let Some(running) = self.slots.get_mut(&to).and_then(|slot| slot.running.as_mut()) else {
            tracing::warn!(process = %to, kind = %envelope.kind, "process down, frame dropped");
            return;
        };
        if let Err(e) = write_frame(&mut running.stdin, envelope).await {
            tracing::warn!(process = %to, kind = %envelope.kind, error = %e, "frame write failed");
        }
    }

    fn on_exit(&mut self, name: ProcessName, outcome: ExitOutcome) -> Option<i32> {
        if let Some(slot) = self.slots.get_mut(&name) {
            slot.running = None;
            slot.ready = false;
        }

        if !self.shutdown.is_running() {
            tracing::info!(process = %name, %outcome, "process stopped");
            return self.all_down().then_some(0);
        }
        self.apply_policy(name, outcome);
        None
    }

    fn apply_policy(&mut self, name: ProcessName, outcome: ExitOutcome) {
        let policy = self.config.restart;
        let Some(slot) = self.slots.get_mut(&name) else { return };
        match slot.tracker.on_exit(outcome, &policy) {
            RestartDecision::Stay => {
                tracing::info!(process = %name, "process exited cleanly, not restarting");
            }
            RestartDecision::Restart { attempt, delay } => {
                tracing::warn!(
                    process = %name,
                    ?outcome,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "process exited, restarting"
                );
                slot.restart_pending = true;
                let generation = slot.generation;
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(SupervisorEvent::RestartDue { name, generation }).await;
                });
            }
            RestartDecision::GiveUp { restarts } => {
                slot.failed = true;
                tracing::error!(process = %name, restarts, "process permanently failed");
            }
        }
    }

    async fn on_signal(&mut self) -> Option<i32> {
        match self.shutdown.on_signal(Instant::now()) {
            ShutdownAction::Broadcast { grace } => {
                tracing::info!(grace_ms = grace.as_millis() as u64, "shutting down");
                let envelope = Envelope::shutdown(grace);
                let live: Vec<ProcessName> =
                    self.slots.values().filter(|s| s.is_live()).map(|s| s.name).collect();
                for name in live {
                    self.forward(name, &envelope).await;
                }
                self.all_down().then_some(0)
            }
            ShutdownAction::KillAll { exit_code } => {
                tracing::warn!("second signal, killing all processes");
                self.kill_all().await;
                Some(exit_code)
            }
            ShutdownAction::None => None,
        }
    }

    fn all_down(&self) -> bool {
        self.slots.values().all(|slot| !slot.is_live())
    }

    /// SIGKILL every live child and wait briefly for them to be reaped.
    async fn kill_all(&mut self) {
        for slot in self.slots.values_mut() {
            if let Some(running) = slot.running.as_mut() {
                tracing::warn!(process = %slot.name, pid = ?running.pid, "killing process");
                running.kill();
            }
        }

        let reap = async {
            while !self.all_down() {
                match self.rx.recv().await {
                    Some(SupervisorEvent::Process(ProcessEvent::Exited {
                        name, generation, ..
                    })) => {
                        if self.is_current(name, generation) {
                            if let Some(slot) = self.slots.get_mut(&name) {
                                slot.running = None;
                            }
                        }
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        };
        if tokio::time::timeout(REAP_TIMEOUT, reap).await.is_err() {
            tracing::warn!("timed out waiting for killed processes");
        }
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

/// Take the single-instance lock and record our pid in it.
pub fn acquire_lock(path: &Path) -> Result<File, SupervisorError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file =
        std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
    file.try_lock_exclusive().map_err(|source| SupervisorError::LockFailed {
        path: path.display().to_string(),
        source,
    })?;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
