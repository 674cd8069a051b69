// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hv-core: data model shared by the harvest supervisor, backend and crawler bridge

pub mod macros;

pub mod account;
pub mod area;
pub mod clock;
pub mod id;
pub mod job;
pub mod progress;
pub mod status;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use account::AccountId;
pub use area::{Area, AreaAuthorization, AreaType, DiscoveredArea};
pub use clock::{Clock, FakeClock, SystemClock};
pub use id::{ConnectionId, RequestId};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobBuilder;
pub use job::{CommandScope, Job, JobCommand, JobId, JobKey, NewJob};
pub use progress::{
    EntityProgress, Progress, ProgressError, ProgressUpdate, ResumeCursor, ResumeState,
};
pub use status::JobStatus;
