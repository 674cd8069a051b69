// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured progress and resume cursors for crawl jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Counts for a single entity kind (issues, commits, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityProgress {
    pub processed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Stored progress of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub processed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<String, EntityProgress>,
}

/// Partial progress reported by the crawler. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<String, EntityProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressError {
    #[error("processed ({processed}) exceeds total ({total})")]
    ProcessedExceedsTotal { processed: u64, total: u64 },

    #[error("{entity}: processed ({processed}) exceeds total ({total})")]
    EntityExceedsTotal { entity: String, processed: u64, total: u64 },
}

impl Progress {
    /// Apply a partial update, returning the merged progress.
    ///
    /// The merged result is checked as a whole: an update that only moves
    /// `processed` past a previously stored `total` is rejected too.
    pub fn merged(&self, update: &ProgressUpdate) -> Result<Progress, ProgressError> {
        let mut next = self.clone();
        if let Some(processed) = update.processed {
            next.processed = processed;
        }
        if let Some(total) = update.total {
            next.total = Some(total);
        }
        for (entity, counts) in &update.entities {
            next.entities.insert(entity.clone(), *counts);
        }
        next.check()?;
        Ok(next)
    }

    pub fn check(&self) -> Result<(), ProgressError> {
        if let Some(total) = self.total {
            if self.processed > total {
                return Err(ProgressError::ProcessedExceedsTotal {
                    processed: self.processed,
                    total,
                });
            }
        }
        for (entity, counts) in &self.entities {
            if let Some(total) = counts.total {
                if counts.processed > total {
                    return Err(ProgressError::EntityExceedsTotal {
                        entity: entity.clone(),
                        processed: counts.processed,
                        total,
                    });
                }
            }
        }
        Ok(())
    }

    /// Fraction complete in `[0, 1]`, when a total is known.
    pub fn ratio(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some(self.processed as f64 / total as f64),
            None => None,
        }
    }
}

impl From<ProgressUpdate> for Progress {
    fn from(update: ProgressUpdate) -> Self {
        Progress {
            processed: update.processed.unwrap_or(0),
            total: update.total,
            entities: update.entities,
        }
    }
}

/// Position within one entity stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResumeCursor {
    /// Offset pagination.
    Page { page: u64 },
    /// Keyset pagination token.
    After { token: String },
    /// Incremental crawl watermark.
    Since { at: DateTime<Utc> },
}

/// Resume cursors keyed by entity name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumeState {
    cursors: BTreeMap<String, ResumeCursor>,
}

impl ResumeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, entity: impl Into<String>, cursor: ResumeCursor) -> Self {
        self.cursors.insert(entity.into(), cursor);
        self
    }

    pub fn get(&self, entity: &str) -> Option<&ResumeCursor> {
        self.cursors.get(entity)
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.cursors.keys().map(String::as_str)
    }

    /// Last write wins per entity; entities missing from `newer` are kept.
    pub fn merge(&mut self, newer: ResumeState) {
        self.cursors.extend(newer.cursors);
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
