// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hv-engine: job lifecycle, discovery fan-out and crawler message dispatch

mod credential;
mod discovery;
mod dispatch;
mod lifecycle;
mod tracker;

#[cfg(test)]
mod test_helpers;

pub use credential::{Credential, CredentialError, CredentialProvider, StaticCredentials};
pub use discovery::{
    CommandTable, DiscoveryConfig, DiscoveryError, DiscoveryHandler, DiscoveryReport,
    DEFAULT_PRIORITY_TOP_N,
};
pub use dispatch::{CrawlerStatus, DispatchError, Dispatcher, DEFAULT_CLAIM_LEASE};
pub use lifecycle::{Completion, Failure, JobLifecycle, LifecycleError};
pub use tracker::{DiscoveryState, DiscoveryTracker};
