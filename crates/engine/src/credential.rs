// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credentials attached to job assignments.

use async_trait::async_trait;
use hv_core::AccountId;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub gitlab_url: String,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credential for account {0}")]
    Missing(AccountId),

    #[error("credential lookup failed: {0}")]
    Lookup(String),
}

/// Source of API credentials per account.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential(&self, account: &AccountId) -> Result<Credential, CredentialError>;

    /// A refreshed token for `account` replaces the one handed out so far.
    fn record_renewal(&self, _account: &AccountId, _token: &str) {}
}

/// One credential shared by every account, until an account's token is
/// renewed.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    credential: Option<Credential>,
    renewed: Mutex<HashMap<AccountId, String>>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>, gitlab_url: impl Into<String>) -> Self {
        Self {
            credential: Some(Credential { token: token.into(), gitlab_url: gitlab_url.into() }),
            renewed: Mutex::new(HashMap::new()),
        }
    }

    /// A provider that has nothing to hand out.
    pub fn none() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credential(&self, account: &AccountId) -> Result<Credential, CredentialError> {
        let mut credential =
            self.credential.clone().ok_or_else(|| CredentialError::Missing(account.clone()))?;
        if let Some(token) = self.renewed.lock().get(account) {
            credential.token = token.clone();
        }
        Ok(credential)
    }

    fn record_renewal(&self, account: &AccountId, token: &str) {
        self.renewed.lock().insert(account.clone(), token.to_string());
    }
}
