//! Shared domain enumerations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{entities::EntityId, error::DomainError};

/// Closed set of content kinds observed for cache invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Settings,
    Client,
    Division,
    Product,
    Technology,
    Machine,
    Media,
    Milestone,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Settings,
        EntityKind::Client,
        EntityKind::Division,
        EntityKind::Product,
        EntityKind::Technology,
        EntityKind::Machine,
        EntityKind::Media,
        EntityKind::Milestone,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Settings => "settings",
            EntityKind::Client => "client",
            EntityKind::Division => "division",
            EntityKind::Product => "product",
            EntityKind::Technology => "technology",
            EntityKind::Machine => "machine",
            EntityKind::Media => "media",
            EntityKind::Milestone => "milestone",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = DomainError;

    /// Accepts the snake-case name, any casing of it, or a namespaced class
    /// name whose last segment is the kind (`App\Models\Division`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let name = class_basename(value).to_ascii_lowercase();
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| DomainError::validation(format!("unknown entity kind `{value}`")))
    }
}

/// Owner of a media row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Mediable {
    Division(EntityId),
    Product(EntityId),
    Technology(EntityId),
    Machine(EntityId),
    Client(EntityId),
    /// Synthetic owner for the homepage slider; persisted with id `0`.
    HomeSlider,
}

impl Mediable {
    pub const HOME_SLIDER_TYPE: &'static str = "home_slider";

    /// Rebuild the owner from the persisted `(mediable_type, mediable_id)` pair.
    pub fn from_parts(mediable_type: &str, mediable_id: EntityId) -> Result<Self, DomainError> {
        let name = class_basename(mediable_type).to_ascii_lowercase();
        let owner = match name.as_str() {
            Self::HOME_SLIDER_TYPE | "homeslider" => Mediable::HomeSlider,
            "division" => Mediable::Division(mediable_id),
            "product" => Mediable::Product(mediable_id),
            "technology" => Mediable::Technology(mediable_id),
            "machine" => Mediable::Machine(mediable_id),
            "client" => Mediable::Client(mediable_id),
            _ => {
                return Err(DomainError::validation(format!(
                    "unsupported mediable type `{mediable_type}`"
                )));
            }
        };
        Ok(owner)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Mediable::Division(_) => "division",
            Mediable::Product(_) => "product",
            Mediable::Technology(_) => "technology",
            Mediable::Machine(_) => "machine",
            Mediable::Client(_) => "client",
            Mediable::HomeSlider => Self::HOME_SLIDER_TYPE,
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            Mediable::Division(id)
            | Mediable::Product(id)
            | Mediable::Technology(id)
            | Mediable::Machine(id)
            | Mediable::Client(id) => *id,
            Mediable::HomeSlider => 0,
        }
    }
}

fn class_basename(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed.rsplit('\\').next().unwrap_or(trimmed)
}
