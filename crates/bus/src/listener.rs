// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::health::Health;
use async_trait::async_trait;
use hv_core::ConnectionId;
use hv_wire::{Message, TokenRefreshRequestData};

/// Receives bus events, one method per category.
///
/// Message handlers return the replies to write back on the same connection.
/// Every method defaults to doing nothing.
#[async_trait]
pub trait BusListener: Send + Sync {
    async fn on_connected(&self, _connection: &ConnectionId) {}

    async fn on_disconnected(&self, _connection: &ConnectionId, _reason: &str) {}

    /// Health check outcome changed.
    async fn on_status_update(&self, _connection: &ConnectionId, _health: Health) {}

    async fn on_heartbeat(&self, _message: Message) -> Vec<Message> {
        Vec::new()
    }

    /// `job_started`, `job_progress`, `job_completed`, `jobs_discovered`
    /// and `job_request`.
    async fn on_job_update(&self, _message: Message) -> Vec<Message> {
        Vec::new()
    }

    async fn on_job_failure(&self, _message: Message) -> Vec<Message> {
        Vec::new()
    }

    /// Notified before the refresh is bridged to the token endpoint.
    async fn on_token_refresh(&self, _request: &TokenRefreshRequestData) {}

    /// Outcome of a bridged refresh: the new token, or `None` when the
    /// refresh failed. Replies are sent after the `token_refresh_response`.
    async fn on_token_refreshed(
        &self,
        _request: &TokenRefreshRequestData,
        _token: Option<&str>,
    ) -> Vec<Message> {
        Vec::new()
    }
}
