//! Content records mirrored from persistent storage.
//!
//! Only the fields that drive cache invalidation or identify a record are
//! modelled here; presentation columns stay in the rendering layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::types::Mediable;

/// Primary key type shared by every content table.
pub type EntityId = i64;

/// Singleton key/value settings row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsRecord {
    pub values: BTreeMap<String, String>,
}

impl SettingsRecord {
    /// The settings table holds at most one row.
    pub const SINGLETON_ID: EntityId = 1;

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: EntityId,
    pub name: String,
    pub website: Option<String>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionRecord {
    pub id: EntityId,
    pub slug: String,
    pub name: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: EntityId,
    pub division_id: EntityId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnologyRecord {
    pub id: EntityId,
    pub division_id: EntityId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRecord {
    pub id: EntityId,
    pub division_id: EntityId,
    pub name: String,
}

/// An uploaded asset attached to some owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: EntityId,
    pub mediable: Mediable,
    pub path: String,
    pub is_home_slider: bool,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneRecord {
    pub id: EntityId,
    pub year: i32,
    pub title: String,
}
