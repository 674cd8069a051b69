// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hv-bus: backend-side connection to the crawler socket

mod breaker;
mod client;
mod health;
mod http;
mod listener;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker, ReconnectPolicy};
pub use client::{BusConfig, BusError, MessageBusClient};
pub use health::{Connection, ConnectionRole, Health, HealthConfig};
pub use http::{HttpError, HttpJobSource, HttpTokenRefresher, JobSource, TokenRefresher};
pub use listener::BusListener;
