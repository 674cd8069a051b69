// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for the in-memory store.
//!
//! A snapshot is the complete store state as zstd-compressed JSON. Writes go
//! to a temp file and are renamed into place; the previous snapshot is kept
//! as a rotated `.bak`.

use crate::memory::StoreState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current snapshot schema version
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 3;
const MAX_BAK_FILES: u32 = 3;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot version {0} is newer than supported ({1})")]
    TooNew(u32, u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "v")]
    pub version: u32,
    pub state: StoreState,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(state: StoreState, created_at: DateTime<Utc>) -> Self {
        Self { version: CURRENT_SNAPSHOT_VERSION, state, created_at }
    }

    /// Write atomically, rotating any existing snapshot into a backup.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("tmp");
        {
            let file = BufWriter::new(File::create(&tmp)?);
            let mut encoder = zstd::stream::Encoder::new(file, ZSTD_LEVEL)?;
            serde_json::to_writer(&mut encoder, self)?;
            let mut file = encoder.finish()?;
            file.flush()?;
            file.get_ref().sync_all()?;
        }
        if path.exists() {
            fs::rename(path, rotate_bak_path(path))?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a snapshot. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Snapshot>, SnapshotError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let decoder = zstd::stream::Decoder::new(BufReader::new(file))?;
        let value: serde_json::Value = serde_json::from_reader(decoder)?;
        let version = value.get("v").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        if version > CURRENT_SNAPSHOT_VERSION {
            return Err(SnapshotError::TooNew(version, CURRENT_SNAPSHOT_VERSION));
        }
        let mut snapshot: Snapshot = serde_json::from_value(value)?;
        snapshot.state.rebuild_indexes();
        Ok(Some(snapshot))
    }
}

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
