// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovered areas (groups and projects) and who may see them.

use crate::account::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaType {
    Group,
    Project,
}

crate::simple_display! {
    AreaType {
        Group => "group",
        Project => "project",
    }
}

/// A stored area row. `full_path` is the primary key, `external_id` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub full_path: String,
    pub external_id: u64,
    pub name: String,
    pub area_type: AreaType,
    pub created_at: DateTime<Utc>,
}

/// Grants an account visibility of an area.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AreaAuthorization {
    pub account_id: AccountId,
    pub area_path: String,
}

/// An area as reported by the crawler in a `jobs_discovered` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredArea {
    #[serde(rename = "type")]
    pub area_type: AreaType,
    #[serde(rename = "id")]
    pub external_id: u64,
    pub name: String,
    pub full_path: String,
}

impl DiscoveredArea {
    pub fn new(
        area_type: AreaType,
        external_id: u64,
        name: impl Into<String>,
        full_path: impl Into<String>,
    ) -> Self {
        Self { area_type, external_id, name: name.into(), full_path: full_path.into() }
    }

    pub fn into_area(self, created_at: DateTime<Utc>) -> Area {
        Area {
            full_path: self.full_path,
            external_id: self.external_id,
            name: self.name,
            area_type: self.area_type,
            created_at,
        }
    }
}

#[cfg(test)]
#[path = "area_tests.rs"]
mod tests;
