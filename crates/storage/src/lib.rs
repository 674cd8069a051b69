// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hv-storage: job store seam, in-memory store and snapshots

mod memory;
mod snapshot;
mod store;

pub use memory::{MemoryStore, StoreState};
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use store::{is_claimable, Field, Insert, JobPatch, JobStore, StoreError};
