//! Cache tag definitions.
//!
//! A tag names a logical cache partition. Tags render to lowercase,
//! colon-separated strings (`kind` or `kind:identifier`); external dump and
//! debug tooling matches on these names, so `Display` and `FromStr` must stay
//! in lockstep.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::domain::entities::EntityId;

/// Deterministically ordered set of tags produced for one or more changes.
pub type TagSet = BTreeSet<CacheTag>;

/// Stable external key of a parent division.
///
/// The slug is preferred; the numeric id is the fallback when the parent row
/// could not be loaded. Equality, hashing and ordering follow the rendered
/// form, so a slug of `2024` and the id `2024` name the same tag.
#[derive(Debug, Clone)]
pub enum DivisionRef {
    Slug(String),
    Id(EntityId),
}

impl fmt::Display for DivisionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivisionRef::Slug(slug) => f.write_str(slug),
            DivisionRef::Id(id) => write!(f, "{id}"),
        }
    }
}

impl DivisionRef {
    fn parse(value: &str) -> Option<Self> {
        if let Ok(id) = value.parse::<EntityId>()
            && id.to_string() == value
        {
            return Some(DivisionRef::Id(id));
        }
        normalize_identifier(value).map(DivisionRef::Slug)
    }

    fn rendered(&self) -> Cow<'_, str> {
        match self {
            DivisionRef::Slug(slug) => Cow::Borrowed(slug),
            DivisionRef::Id(id) => Cow::Owned(id.to_string()),
        }
    }
}

impl PartialEq for DivisionRef {
    fn eq(&self, other: &Self) -> bool {
        self.rendered() == other.rendered()
    }
}

impl Eq for DivisionRef {}

impl Hash for DivisionRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rendered().hash(state);
    }
}

impl PartialOrd for DivisionRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DivisionRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rendered().cmp(&other.rendered())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheTag {
    Settings,
    Clients,
    Divisions,
    Division(String),
    Products,
    ProductsOf(DivisionRef),
    Technologies,
    TechnologiesOf(DivisionRef),
    Machines,
    MachinesOf(DivisionRef),
    MediaHomeSlider,
    MediaDivision,
    Milestones,
}

impl CacheTag {
    /// Tag for a single division page; `None` when the slug is blank.
    pub fn division(slug: &str) -> Option<Self> {
        normalize_identifier(slug).map(CacheTag::Division)
    }

    /// Every collection-wide tag, in rendering order.
    pub fn collections() -> [CacheTag; 9] {
        [
            CacheTag::Settings,
            CacheTag::Clients,
            CacheTag::Divisions,
            CacheTag::Products,
            CacheTag::Technologies,
            CacheTag::Machines,
            CacheTag::MediaHomeSlider,
            CacheTag::MediaDivision,
            CacheTag::Milestones,
        ]
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheTag::Settings => f.write_str("settings"),
            CacheTag::Clients => f.write_str("clients"),
            CacheTag::Divisions => f.write_str("divisions"),
            CacheTag::Division(slug) => write!(f, "division:{slug}"),
            CacheTag::Products => f.write_str("products"),
            CacheTag::ProductsOf(parent) => write!(f, "products:{parent}"),
            CacheTag::Technologies => f.write_str("technologies"),
            CacheTag::TechnologiesOf(parent) => write!(f, "technologies:{parent}"),
            CacheTag::Machines => f.write_str("machines"),
            CacheTag::MachinesOf(parent) => write!(f, "machines:{parent}"),
            CacheTag::MediaHomeSlider => f.write_str("media:home_slider"),
            CacheTag::MediaDivision => f.write_str("media:division"),
            CacheTag::Milestones => f.write_str("milestones"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid cache tag `{input}`")]
pub struct TagParseError {
    pub input: String,
}

impl FromStr for CacheTag {
    type Err = TagParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || TagParseError {
            input: value.to_string(),
        };

        let tag = match value.split_once(':') {
            None => match value {
                "settings" => CacheTag::Settings,
                "clients" => CacheTag::Clients,
                "divisions" => CacheTag::Divisions,
                "products" => CacheTag::Products,
                "technologies" => CacheTag::Technologies,
                "machines" => CacheTag::Machines,
                "milestones" => CacheTag::Milestones,
                _ => return Err(invalid()),
            },
            Some(("media", "home_slider")) => CacheTag::MediaHomeSlider,
            Some(("media", "division")) => CacheTag::MediaDivision,
            Some(("division", slug)) => CacheTag::division(slug).ok_or_else(invalid)?,
            Some(("products", parent)) => {
                CacheTag::ProductsOf(DivisionRef::parse(parent).ok_or_else(invalid)?)
            }
            Some(("technologies", parent)) => {
                CacheTag::TechnologiesOf(DivisionRef::parse(parent).ok_or_else(invalid)?)
            }
            Some(("machines", parent)) => {
                CacheTag::MachinesOf(DivisionRef::parse(parent).ok_or_else(invalid)?)
            }
            Some(_) => return Err(invalid()),
        };

        // Reject non-canonical spellings so parse(display(t)) is the only way in.
        if tag.to_string() != value {
            return Err(invalid());
        }
        Ok(tag)
    }
}

impl Serialize for CacheTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CacheTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Normalize an identifier for use inside a tag.
///
/// Trims, lowercases and collapses whitespace runs into `-`. Returns `None`
/// for blank input.
pub fn normalize_identifier(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    Some(normalized)
}
