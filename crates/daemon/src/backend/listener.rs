// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus listener that feeds crawler messages into the dispatcher.

use async_trait::async_trait;
use hv_bus::{BusListener, Health};
use hv_core::{AccountId, Clock, ConnectionId};
use hv_engine::Dispatcher;
use hv_wire::{Message, TokenRefreshRequestData};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct DispatchListener<C: Clock> {
    dispatcher: Arc<Dispatcher<C>>,
    accounts: Vec<AccountId>,
    /// Set on connect; the first heartbeat afterwards seeds `accounts`.
    seed_pending: AtomicBool,
}

impl<C: Clock> DispatchListener<C> {
    pub fn new(dispatcher: Arc<Dispatcher<C>>, accounts: Vec<AccountId>) -> Self {
        Self { dispatcher, accounts, seed_pending: AtomicBool::new(false) }
    }

    async fn dispatch(&self, message: Message) -> Vec<Message> {
        let kind = message.kind();
        let job_id = message.job_id.clone();
        match self.dispatcher.dispatch(message).await {
            Ok(replies) => replies,
            Err(e) => {
                tracing::warn!(%kind, job_id = ?job_id, error = %e, "message not applied");
                Vec::new()
            }
        }
    }

    /// Authorization jobs for accounts that have none yet.
    async fn seed(&self) -> Vec<Message> {
        let mut replies = Vec::new();
        for account in &self.accounts {
            match self.dispatcher.seed_account(account).await {
                Ok(Some(assignment)) => {
                    tracing::info!(account_id = %account, "seeded account");
                    replies.push(assignment);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(account_id = %account, error = %e, "cannot seed account"),
            }
        }
        replies
    }
}

#[async_trait]
impl<C: Clock> BusListener for DispatchListener<C> {
    async fn on_connected(&self, connection: &ConnectionId) {
        tracing::info!(%connection, "crawler connected");
        self.seed_pending.store(true, Ordering::SeqCst);
    }

    async fn on_disconnected(&self, connection: &ConnectionId, reason: &str) {
        tracing::info!(%connection, reason, "crawler disconnected");
    }

    async fn on_status_update(&self, connection: &ConnectionId, health: Health) {
        match health {
            Health::Healthy => tracing::info!(%connection, "crawler healthy"),
            Health::Missed(missed) => tracing::warn!(%connection, missed, "crawler heartbeat late"),
            Health::Dead => tracing::error!(%connection, "crawler heartbeat lost"),
        }
    }

    async fn on_heartbeat(&self, message: Message) -> Vec<Message> {
        let mut replies = self.dispatch(message).await;
        if self.seed_pending.swap(false, Ordering::SeqCst) {
            replies.extend(self.seed().await);
        }
        replies
    }

    async fn on_job_update(&self, message: Message) -> Vec<Message> {
        self.dispatch(message).await
    }

    async fn on_job_failure(&self, message: Message) -> Vec<Message> {
        self.dispatch(message).await
    }

    async fn on_token_refresh(&self, request: &TokenRefreshRequestData) {
        tracing::info!(
            request_id = %request.request_id,
            account_id = %request.account_id,
            "crawler requested token refresh"
        );
        if let Err(e) = self.dispatcher.credential_refresh_requested(&request.account_id).await {
            tracing::warn!(
                account_id = %request.account_id,
                error = %e,
                "cannot park expired jobs"
            );
        }
    }

    async fn on_token_refreshed(
        &self,
        request: &TokenRefreshRequestData,
        token: Option<&str>,
    ) -> Vec<Message> {
        let Some(token) = token else {
            tracing::warn!(
                account_id = %request.account_id,
                "token refresh failed, jobs keep waiting for renewal"
            );
            return Vec::new();
        };
        match self.dispatcher.credential_refreshed(&request.account_id, token).await {
            Ok(replies) => replies,
            Err(e) => {
                tracing::warn!(account_id = %request.account_id, error = %e, "cannot renew jobs");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
