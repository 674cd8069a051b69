// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `hv-backend` process: crawler bus, dispatcher and job store.
//!
//! Stdout carries supervisor frames only. The process reports `ready` once
//! the store is loaded, then runs until a `shutdown` frame, SIGTERM, or EOF
//! on stdin.

mod listener;

pub use listener::DispatchListener;

use hv_bus::{BusConfig, HttpError, HttpJobSource, HttpTokenRefresher, MessageBusClient};
use hv_core::{AccountId, SystemClock};
use hv_engine::{
    CredentialProvider, DiscoveryConfig, DiscoveryHandler, DiscoveryTracker, Dispatcher,
    JobLifecycle, StaticCredentials,
};
use hv_storage::{JobStore, MemoryStore, StoreError};
use hv_wire::{
    kinds, write_frame, Envelope, FrameReader, Line, Peer, ProtocolError, ShutdownData, Target,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::config::ConfigError;
use crate::env;

const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(60);
const BUS_STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub socket_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub snapshot_interval: Duration,
    pub accounts: Vec<AccountId>,
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub gitlab_url: String,
    pub gitlab_token: Option<String>,
    pub discovery: DiscoveryConfig,
}

impl BackendConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let state_dir = env::state_dir()?;
        Ok(Self {
            socket_path: env::socket_path(&state_dir),
            snapshot_path: state_dir.join("jobs.snapshot"),
            snapshot_interval: SNAPSHOT_INTERVAL,
            accounts: env::accounts().into_iter().map(AccountId::from_string).collect(),
            api_url: env::api_url(),
            api_token: env::api_token(),
            gitlab_url: env::gitlab_url().unwrap_or_else(|| DEFAULT_GITLAB_URL.to_string()),
            gitlab_token: env::gitlab_token(),
            discovery: DiscoveryConfig::default(),
        })
    }
}

pub struct Backend {
    config: BackendConfig,
    store: Arc<MemoryStore>,
    bus: Arc<MessageBusClient>,
}

impl Backend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let clock = SystemClock;
        let store = Arc::new(MemoryStore::open(&config.snapshot_path, clock.clone())?);
        let jobs: Arc<dyn JobStore> = store.clone();

        let discovery =
            Arc::new(DiscoveryHandler::with_config(jobs.clone(), config.discovery.clone()));
        let lifecycle = Arc::new(JobLifecycle::new(
            jobs.clone(),
            discovery.clone(),
            Arc::new(DiscoveryTracker::new()),
            clock.clone(),
        ));
        let credentials: Arc<dyn CredentialProvider> = match &config.gitlab_token {
            Some(token) => {
                Arc::new(StaticCredentials::new(token.clone(), config.gitlab_url.clone()))
            }
            None => {
                tracing::warn!("HV_GITLAB_TOKEN not set, jobs cannot be assigned");
                Arc::new(StaticCredentials::none())
            }
        };
        let dispatcher = Arc::new(Dispatcher::new(lifecycle, discovery, jobs, credentials, clock.clone()));

        let listener = Arc::new(DispatchListener::new(dispatcher, config.accounts.clone()));
        let mut bus = MessageBusClient::new(BusConfig::new(&config.socket_path), listener, clock);
        if let Some(url) = &config.api_url {
            bus = bus
                .with_refresher(Arc::new(HttpTokenRefresher::new(url, config.api_token.clone())?))
                .with_job_source(Arc::new(HttpJobSource::new(url, config.api_token.clone())?));
        }

        Ok(Self { config, store, bus: Arc::new(bus) })
    }

    /// Serve until told to stop, then write a final snapshot.
    pub async fn run<R, W>(self, stdin: R, mut stdout: W) -> Result<(), BackendError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        let ready =
            Envelope::new(Peer::Backend, Target::Supervisor, kinds::READY, Default::default());
        write_frame(&mut stdout, &ready).await?;
        tracing::info!(
            socket = %self.config.socket_path.display(),
            jobs = self.store.job_count(),
            "backend ready"
        );

        let bus = self.bus.clone();
        let bus_task = tokio::spawn(async move { bus.run().await });

        let (line_tx, mut lines) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut reader = FrameReader::new(stdin);
            loop {
                match reader.next().await {
                    Ok(Some(line)) => {
                        if line_tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        });

        let mut terminate = signal(SignalKind::terminate())?;
        let mut snapshots = tokio::time::interval(self.config.snapshot_interval);
        snapshots.tick().await;

        let reason = loop {
            tokio::select! {
                line = lines.recv() => match line {
                    None => break "stdin closed",
                    Some(Line::Frame(envelope)) if envelope.is(kinds::SHUTDOWN) => {
                        let data: Option<ShutdownData> =
                            serde_json::from_value(envelope.payload).ok();
                        tracing::info!(
                            timeout_seconds = ?data.map(|d| d.timeout_seconds),
                            "shutdown requested"
                        );
                        break "shutdown frame";
                    }
                    Some(Line::Frame(envelope)) => self.on_frame(envelope, &mut stdout).await,
                    Some(Line::Log(text)) => tracing::debug!(line = %text, "unframed stdin line"),
                    Some(Line::Malformed { raw, error }) => {
                        tracing::warn!(error = %error, line = %raw, "malformed frame on stdin");
                    }
                },
                _ = terminate.recv() => break "SIGTERM",
                _ = snapshots.tick() => self.snapshot(),
            }
        };

        tracing::info!(reason, "backend stopping");
        self.bus.shutdown();
        if tokio::time::timeout(BUS_STOP_TIMEOUT, bus_task).await.is_err() {
            tracing::warn!("bus did not stop in time");
        }
        self.store.save_snapshot(&self.config.snapshot_path)?;
        Ok(())
    }

    async fn on_frame<W: AsyncWrite + Unpin>(&self, envelope: Envelope, stdout: &mut W) {
        if !envelope.is(kinds::PING) {
            tracing::debug!(kind = %envelope.kind, source = ?envelope.source, "unhandled frame");
            return;
        }
        let target = envelope.source.process().map(Target::from).unwrap_or(Target::Supervisor);
        let pong = Envelope::new(Peer::Backend, target, kinds::PONG, envelope.payload);
        if let Err(e) = write_frame(stdout, &pong).await {
            tracing::warn!(error = %e, "pong write failed");
        }
    }

    fn snapshot(&self) {
        if let Err(e) = self.store.save_snapshot(&self.config.snapshot_path) {
            tracing::warn!(error = %e, "periodic snapshot failed");
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
