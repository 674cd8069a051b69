// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP collaborators: the task pull endpoint used when the socket is
//! unavailable, and the token refresh endpoint.

use async_trait::async_trait;
use hv_core::AccountId;
use hv_wire::{JobAssignmentData, TokenRefreshRequestData};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid base url: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("refresh rejected: {0}")]
    Rejected(String),
}

/// Pull-based source of job assignments.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn next_job(
        &self,
        account: Option<&AccountId>,
    ) -> Result<Option<JobAssignmentData>, HttpError>;
}

/// Obtains a fresh API token for an account.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, request: &TokenRefreshRequestData) -> Result<String, HttpError>;
}

/// Shared reqwest client plus base url and bearer token.
#[derive(Clone)]
struct Api {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl Api {
    fn new(base: &str, token: Option<String>) -> Result<Self, HttpError> {
        Ok(Self { client: reqwest::Client::new(), base: Url::parse(base)?, token })
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

async fn api_error(resp: reqwest::Response) -> HttpError {
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    HttpError::Api { status, message }
}

/// `GET {base}/api/tasks/next?accountId=`; 204 means nothing is queued.
#[derive(Clone)]
pub struct HttpJobSource {
    api: Api,
}

impl HttpJobSource {
    pub fn new(base: &str, token: Option<String>) -> Result<Self, HttpError> {
        Ok(Self { api: Api::new(base, token)? })
    }

    fn url(&self, account: Option<&AccountId>) -> Result<Url, HttpError> {
        let mut url = self.api.base.join("api/tasks/next")?;
        if let Some(account) = account {
            url.query_pairs_mut().append_pair("accountId", account.as_str());
        }
        Ok(url)
    }
}

#[async_trait]
impl JobSource for HttpJobSource {
    async fn next_job(
        &self,
        account: Option<&AccountId>,
    ) -> Result<Option<JobAssignmentData>, HttpError> {
        let url = self.url(account)?;
        let resp = self.api.request(reqwest::Method::GET, url).send().await?;
        match resp.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => Ok(Some(resp.json().await?)),
            _ => Err(api_error(resp).await),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    account_id: &'a AccountId,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

#[derive(Deserialize)]
struct RefreshReply {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// `POST {base}/api/tokens/refresh`.
#[derive(Clone)]
pub struct HttpTokenRefresher {
    api: Api,
}

impl HttpTokenRefresher {
    pub fn new(base: &str, token: Option<String>) -> Result<Self, HttpError> {
        Ok(Self { api: Api::new(base, token)? })
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, request: &TokenRefreshRequestData) -> Result<String, HttpError> {
        let url = self.api.base.join("api/tokens/refresh")?;
        let body =
            RefreshBody { account_id: &request.account_id, reason: request.reason.as_deref() };
        let resp = self.api.request(reqwest::Method::POST, url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        let reply: RefreshReply = resp.json().await?;
        match reply.token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(HttpError::Rejected(
                reply.error.unwrap_or_else(|| "no token in response".to_string()),
            )),
        }
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
