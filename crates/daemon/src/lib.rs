// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Harvest daemon library
//!
//! The `hvd` supervisor and the `hv-backend` process share configuration,
//! environment access and logging setup.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod backend;
pub mod config;
pub mod env;
pub mod logging;
pub mod supervisor;

pub use backend::{Backend, BackendConfig, BackendError};
pub use config::{ConfigError, FileConfig, ProcessSpec, SupervisorConfig};
pub use supervisor::{Supervisor, SupervisorError, SupervisorHandle};
