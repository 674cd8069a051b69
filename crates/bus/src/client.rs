// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend side of the crawler socket.
//!
//! [`MessageBusClient::run`] keeps one connection alive: it reconnects with
//! capped backoff behind a circuit breaker, validates every inbound line,
//! hands messages to the [`BusListener`] strictly in arrival order and writes
//! the listener's replies back. Outbound traffic from other tasks goes
//! through a bounded queue drained by the same loop.

use crate::breaker::{BreakerConfig, BreakerState, CircuitBreaker, ReconnectPolicy};
use crate::health::{Connection, ConnectionRole, Health, HealthConfig};
use crate::http::{HttpError, JobSource, TokenRefresher};
use crate::listener::BusListener;
use hv_core::{AccountId, Clock, RequestId, SystemClock};
use hv_wire::{
    write_json_line, JobAssignmentData, JobRequestData, LineReader, Message, MessageBody,
    MessageKind, ProtocolError, ShutdownData, TokenRefreshRequestData, TokenRefreshResponseData,
    ValidationStats, Validator, ValidatorConfig,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("not connected to crawler")]
    NotConnected,

    #[error("outbound queue closed")]
    Closed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("job source: {0}")]
    Http(#[from] HttpError),
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub socket_path: PathBuf,
    pub reconnect: ReconnectPolicy,
    pub breaker: BreakerConfig,
    pub health: HealthConfig,
    pub validator: ValidatorConfig,
    pub outbound_capacity: usize,
}

impl BusConfig {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            reconnect: ReconnectPolicy::default(),
            breaker: BreakerConfig::default(),
            health: HealthConfig::default(),
            validator: ValidatorConfig::default(),
            outbound_capacity: 256,
        }
    }
}

struct Link {
    connection: Connection,
    outbound: mpsc::Sender<Message>,
}

type Pending = HashMap<String, oneshot::Sender<JobAssignmentData>>;

pub struct MessageBusClient<C: Clock = SystemClock> {
    config: BusConfig,
    clock: C,
    listener: Arc<dyn BusListener>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    job_source: Option<Arc<dyn JobSource>>,
    validator: Validator<C>,
    breaker: CircuitBreaker<C>,
    link: Mutex<Option<Link>>,
    pending: Mutex<Pending>,
    cancel: CancellationToken,
}

impl<C: Clock> MessageBusClient<C> {
    pub fn new(config: BusConfig, listener: Arc<dyn BusListener>, clock: C) -> Self {
        Self {
            validator: Validator::with_config(clock.clone(), config.validator.clone()),
            breaker: CircuitBreaker::new(config.breaker, clock.clone()),
            config,
            clock,
            listener,
            refresher: None,
            job_source: None,
            link: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn with_job_source(mut self, source: Arc<dyn JobSource>) -> Self {
        self.job_source = Some(source);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.link.lock().is_some()
    }

    /// Snapshot of the live connection record.
    pub fn connection(&self) -> Option<Connection> {
        self.link.lock().as_ref().map(|link| link.connection.clone())
    }

    pub fn is_healthy(&self) -> bool {
        let now = self.clock.now();
        self.link
            .lock()
            .as_ref()
            .is_some_and(|link| link.connection.is_healthy(now, &self.config.health))
    }

    pub fn stats(&self) -> ValidationStats {
        self.validator.stats()
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    /// Stop [`run`](Self::run) and drop the connection.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Queue a message for the crawler.
    pub async fn send(&self, message: Message) -> Result<(), BusError> {
        let outbound = self.outbound().ok_or(BusError::NotConnected)?;
        outbound.send(message).await.map_err(|_| BusError::Closed)
    }

    pub async fn send_shutdown(
        &self,
        timeout: Duration,
        reason: Option<String>,
    ) -> Result<(), BusError> {
        let data = ShutdownData { timeout_seconds: timeout.as_secs(), reason };
        self.send(Message::now(&self.clock, MessageBody::Shutdown(data))).await
    }

    /// Ask for the next job. Resolves to `None` when no assignment arrives
    /// within `timeout`. Without a usable socket the [`JobSource`] is asked
    /// instead.
    pub async fn request_job(
        &self,
        account: Option<&AccountId>,
        timeout: Duration,
    ) -> Result<Option<JobAssignmentData>, BusError> {
        let outbound = match self.outbound() {
            Some(tx) if !self.breaker.is_open() => tx,
            _ => return self.fallback(account).await,
        };

        let request_id = RequestId::new().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().insert(request_id.clone(), reply_tx);

        let data = JobRequestData { request_id: request_id.clone(), account_id: account.cloned() };
        let message = Message::now(&self.clock, MessageBody::JobRequest(data));
        if outbound.send(message).await.is_err() {
            self.pending.lock().remove(&request_id);
            return self.fallback(account).await;
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(assignment)) => Ok(Some(assignment)),
            Ok(Err(_)) => {
                tracing::debug!(request_id, "connection dropped before job assignment");
                Ok(None)
            }
            Err(_) => {
                self.pending.lock().remove(&request_id);
                tracing::debug!(
                    request_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "job request timed out"
                );
                Ok(None)
            }
        }
    }

    /// Connect, serve, reconnect; returns after [`shutdown`](Self::shutdown).
    pub async fn run(&self) {
        let mut attempt = 0u32;
        while !self.cancel.is_cancelled() {
            if !self.breaker.allow() {
                let wait = self.breaker.remaining_cooldown();
                if self.pause(wait).await {
                    break;
                }
                continue;
            }

            match UnixStream::connect(&self.config.socket_path).await {
                Ok(stream) => {
                    self.breaker.record_success();
                    attempt = 1;
                    self.serve(stream).await;
                }
                Err(e) => {
                    self.breaker.record_failure();
                    attempt = attempt.saturating_add(1);
                    tracing::warn!(
                        path = %self.config.socket_path.display(),
                        attempt,
                        error = %e,
                        "crawler connect failed"
                    );
                }
            }

            let delay = self.config.reconnect.delay(attempt);
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
            if self.pause(delay).await {
                break;
            }
        }
        tracing::info!("message bus stopped");
    }

    /// Sleep unless cancelled first. Returns true when cancelled.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(delay) => false,
        }
    }

    async fn serve(&self, stream: UnixStream) {
        let (read, mut write) = stream.into_split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel(self.config.outbound_capacity);
        let connection = Connection::new(ConnectionRole::Crawler, self.clock.now());
        let id = connection.id.clone();
        *self.link.lock() = Some(Link { connection, outbound: outbound_tx });
        tracing::info!(connection = %id, path = %self.config.socket_path.display(), "crawler connected");
        self.listener.on_connected(&id).await;

        // Lines are read on their own task so a partial line survives the
        // select below.
        let (line_tx, mut line_rx) = mpsc::channel(64);
        let max_bytes = self.config.validator.max_message_bytes;
        let reader = tokio::spawn(async move {
            let mut lines = LineReader::with_limit(read, max_bytes);
            loop {
                let next = lines.next_line().await;
                let done = !matches!(next, Ok(Some(_)) | Err(ProtocolError::MessageTooLarge { .. }));
                if line_tx.send(next).await.is_err() || done {
                    break;
                }
            }
        });

        let mut ticker = tokio::time::interval(self.config.health.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        let mut last_health = Health::Healthy;

        let reason = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break "shutdown".to_string(),
                next = line_rx.recv() => match next {
                    Some(Ok(Some(line))) => {
                        let replies = self.handle_line(&line).await;
                        if let Err(e) = write_all(&mut write, &replies).await {
                            break e.to_string();
                        }
                    }
                    Some(Err(ProtocolError::MessageTooLarge { limit })) => {
                        tracing::warn!(limit, "dropping oversized line");
                    }
                    Some(Err(e)) => break e.to_string(),
                    Some(Ok(None)) | None => break "closed by crawler".to_string(),
                },
                Some(message) = outbound_rx.recv() => {
                    if let Err(e) = write_json_line(&mut write, &message).await {
                        break e.to_string();
                    }
                }
                _ = ticker.tick() => {
                    let Some(health) = self.check_health() else { continue };
                    if health != last_health {
                        last_health = health;
                        self.listener.on_status_update(&id, health).await;
                    }
                    if health == Health::Dead {
                        break "heartbeat lost".to_string();
                    }
                }
            }
        };

        reader.abort();
        *self.link.lock() = None;
        self.pending.lock().clear();
        tracing::warn!(connection = %id, reason, "crawler disconnected");
        self.listener.on_disconnected(&id, &reason).await;
    }

    fn outbound(&self) -> Option<mpsc::Sender<Message>> {
        self.link.lock().as_ref().map(|link| link.outbound.clone())
    }

    fn check_health(&self) -> Option<Health> {
        let now = self.clock.now();
        let mut link = self.link.lock();
        let link = link.as_mut()?;
        let health = link.connection.check(now, &self.config.health);
        if let Health::Missed(missed) = health {
            tracing::warn!(connection = %link.connection.id, missed, "crawler heartbeat missed");
        }
        Some(health)
    }

    async fn handle_line(&self, line: &str) -> Vec<Message> {
        match self.validator.validate_line(line) {
            Ok(message) => self.handle(message).await,
            Err(err) if err.kind() == Some(MessageKind::TokenRefreshRequest) => {
                tracing::error!(error = %err, "token refresh request rejected, no response sent");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(category = %err.category(), error = %err, "dropping invalid message");
                Vec::new()
            }
        }
    }

    async fn handle(&self, message: Message) -> Vec<Message> {
        match message.body {
            MessageBody::Heartbeat(ref data) => {
                let now = self.clock.now();
                if let Some(link) = self.link.lock().as_mut() {
                    link.connection.record_heartbeat(now, data.active_jobs);
                }
                self.listener.on_heartbeat(message).await
            }
            MessageBody::JobStarted(_)
            | MessageBody::JobProgress(_)
            | MessageBody::JobCompleted(_)
            | MessageBody::JobsDiscovered(_)
            | MessageBody::JobRequest(_) => self.listener.on_job_update(message).await,
            MessageBody::JobFailed(_) => self.listener.on_job_failure(message).await,
            MessageBody::TokenRefreshRequest(data) => self.bridge_refresh(data).await,
            MessageBody::JobAssignment(data) => {
                self.resolve_assignment(data);
                Vec::new()
            }
            MessageBody::TokenRefreshResponse(_) | MessageBody::Shutdown(_) => {
                tracing::warn!(kind = %message.kind(), "unexpected message from crawler");
                Vec::new()
            }
        }
    }

    async fn bridge_refresh(&self, request: TokenRefreshRequestData) -> Vec<Message> {
        if request.request_id.is_empty() {
            tracing::error!(account = %request.account_id, "token refresh request without request_id");
            return Vec::new();
        }
        self.listener.on_token_refresh(&request).await;

        let refreshed = match &self.refresher {
            Some(refresher) => refresher.refresh(&request).await.map_err(|e| e.to_string()),
            None => Err("token refresh unavailable".to_string()),
        };
        let response = match &refreshed {
            Ok(token) => {
                tracing::info!(account = %request.account_id, "token refreshed");
                TokenRefreshResponseData::refreshed(&request.request_id, token.clone())
            }
            Err(reason) => {
                tracing::warn!(
                    account = %request.account_id,
                    error = %reason,
                    "token refresh failed"
                );
                TokenRefreshResponseData::failed(&request.request_id, reason.clone())
            }
        };

        let mut replies =
            vec![Message::now(&self.clock, MessageBody::TokenRefreshResponse(response))];
        let token = refreshed.as_deref().ok();
        replies.extend(self.listener.on_token_refreshed(&request, token).await);
        replies
    }

    fn resolve_assignment(&self, assignment: JobAssignmentData) {
        let Some(request_id) = assignment.request_id.clone() else {
            tracing::warn!(job_id = %assignment.job_id, "job assignment without request_id");
            return;
        };
        match self.pending.lock().remove(&request_id) {
            Some(waiter) => {
                let _ = waiter.send(assignment);
            }
            None => tracing::warn!(request_id, "job assignment for unknown or expired request"),
        }
    }

    async fn fallback(
        &self,
        account: Option<&AccountId>,
    ) -> Result<Option<JobAssignmentData>, BusError> {
        let source = self.job_source.as_ref().ok_or(BusError::NotConnected)?;
        tracing::debug!(account = ?account.map(AccountId::as_str), "requesting job over http");
        Ok(source.next_job(account).await?)
    }
}

async fn write_all(writer: &mut OwnedWriteHalf, messages: &[Message]) -> Result<(), ProtocolError> {
    for message in messages {
        write_json_line(writer, message).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
