//! Shared types used across the indexing pipeline.
//!
//! Everything in here is persisted inside a cache generation, so the types
//! stay codec-neutral: no `#[serde(flatten)]`, no `skip_serializing_if`, and
//! no self-describing values like `serde_json::Value`. The compact binary codec
//! cannot round-trip any of those.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Publication state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Draft,
    Published,
    Unlisted,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Draft, Status::Published, Status::Unlisted];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::Published => "published",
            Status::Unlisted => "unlisted",
        }
    }

    /// Parse a frontmatter status. Case-insensitive; unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Status> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Status::Draft),
            "published" => Some(Status::Published),
            "unlisted" => Some(Status::Unlisted),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary sort key of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Date,
    Title,
    /// Manual order from the `NNN-` filename prefix or the `order` key.
    Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortField::Date => "date",
            SortField::Title => "title",
            SortField::Order => "order",
        })
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        })
    }
}

/// Value of a custom frontmatter field.
///
/// A closed set of shapes, so every codec can round-trip it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<serde_yaml::Value> for FieldValue {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => FieldValue::Int(i),
                (None, Some(f)) if f.is_finite() => FieldValue::Float(f),
                // .inf / .nan have no portable encoding; keep the YAML spelling
                _ => FieldValue::Text(n.to_string()),
            },
            Value::String(s) => FieldValue::Text(s),
            Value::Sequence(seq) => FieldValue::List(seq.into_iter().map(Into::into).collect()),
            Value::Mapping(map) => FieldValue::Map(
                map.into_iter()
                    .filter_map(|(k, v)| yaml_key(k).map(|k| (k, v.into())))
                    .collect(),
            ),
            Value::Tagged(tagged) => tagged.value.into(),
        }
    }
}

fn yaml_key(key: serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value;
    match key {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Everything about an item except its body.
///
/// This is what listings return: `all_meta`, `recent_meta` and query pages
/// never carry bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMeta {
    /// Stable identifier, `<type>/<slug>` unless set in frontmatter.
    pub id: String,
    pub item_type: String,
    /// Unique within `item_type`.
    pub slug: String,
    pub title: String,
    pub status: Status,
    pub date: Option<NaiveDateTime>,
    pub updated: Option<NaiveDateTime>,
    pub excerpt: String,
    /// Term slugs per taxonomy, in frontmatter order.
    pub terms: BTreeMap<String, Vec<String>>,
    /// Open-ended frontmatter keys.
    pub fields: BTreeMap<String, FieldValue>,
    /// Manual order.
    pub order: i64,
    /// Source file, relative to the site root, `/`-separated.
    pub path: String,
    /// Public URL, when the item's route could be resolved.
    pub url: Option<String>,
}

impl ItemMeta {
    pub fn is_published(&self) -> bool {
        self.status == Status::Published
    }

    pub fn terms_for(&self, taxonomy: &str) -> &[String] {
        self.terms.get(taxonomy).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A content item: metadata plus the raw Markdown body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub meta: ItemMeta,
    pub body: String,
}

/// A label within a taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub taxonomy: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    /// Published items tagged with this term, ordered by slug then type.
    /// Derived on every rebuild; authoritative membership lives in item
    /// frontmatter.
    pub items: Vec<ItemRef>,
}

/// An item named by type and slug, the pair that is unique across the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub item_type: String,
    pub slug: String,
}

impl ItemRef {
    pub fn new(item_type: impl Into<String>, slug: impl Into<String>) -> Self {
        ItemRef {
            item_type: item_type.into(),
            slug: slug.into(),
        }
    }

    pub fn of(meta: &ItemMeta) -> Self {
        ItemRef::new(&meta.item_type, &meta.slug)
    }
}

impl Ord for ItemRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.slug
            .cmp(&other.slug)
            .then_with(|| self.item_type.cmp(&other.item_type))
    }
}

impl PartialOrd for ItemRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.item_type, self.slug)
    }
}

/// Where a URL points.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteTarget {
    pub item_type: String,
    pub slug: String,
    pub status: Status,
}

/// Compiled URL table of one generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTable {
    /// URL → owning item.
    pub routes: BTreeMap<String, RouteTarget>,
    /// URL → every claimant, owner first. Only URLs with more than one claimant.
    pub collisions: BTreeMap<String, Vec<RouteTarget>>,
}

impl RouteTable {
    pub fn resolve(&self, url: &str) -> Option<&RouteTarget> {
        self.routes.get(url)
    }
}

/// A non-fatal problem found while building an index.
///
/// Issues never abort a rebuild. `lint` returns them, `rebuild` reports them.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndexIssue {
    #[error("{path}: {message}")]
    Parse { path: String, message: String },
    #[error("{path}: duplicate slug '{slug}' in type '{item_type}' (already used by {kept})")]
    DuplicateSlug {
        path: String,
        item_type: String,
        slug: String,
        kept: String,
    },
    #[error("route collision on {url}: {owner} owns it, also claimed by {}", .others.join(", "))]
    RouteCollision {
        url: String,
        owner: String,
        others: Vec<String>,
    },
    #[error("{item_type}/{slug}: cannot resolve route '{pattern}': {reason}")]
    UnresolvableRoute {
        item_type: String,
        slug: String,
        pattern: String,
        reason: String,
    },
    #[error("taxonomy '{taxonomy}': {message}")]
    Taxonomy { taxonomy: String, message: String },
}

impl IndexIssue {
    pub fn kind(&self) -> &'static str {
        match self {
            IndexIssue::Parse { .. } => "parse",
            IndexIssue::DuplicateSlug { .. } => "duplicate-slug",
            IndexIssue::RouteCollision { .. } => "route-collision",
            IndexIssue::UnresolvableRoute { .. } => "unresolvable-route",
            IndexIssue::Taxonomy { .. } => "taxonomy",
        }
    }
}
