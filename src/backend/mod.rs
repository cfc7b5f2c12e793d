//! Storage backends for built index snapshots.
//!
//! A [`Backend`] persists a [`Snapshot`] into a generation directory and
//! loads it back as an [`IndexHandle`], the read interface the repository
//! works against. Two implementations exist:
//!
//! - [`array::ArrayBackend`]: the whole item collection as one codec blob,
//!   loaded into memory once. Every lookup is a map or vector access.
//! - [`sqlite::SqliteBackend`]: rows in an embedded SQLite file with indexes
//!   on `(type, slug)` and `(type, status, date)`. Listings are translated to
//!   SQL; nothing is loaded up front beyond the small projections.
//!
//! Both return identical results for identical input. They share the
//! comparator in [`crate::ordering`] (the SQLite translation mirrors it key by
//! key) and they share the projection blobs written by
//! [`write_projections`]: slug lookup, recent cache, route table and taxonomy
//! index are the same files in both layouts.

pub mod array;
pub mod codec;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::ordering::{self, TypeSort};
use crate::types::{Item, ItemMeta, RouteTable, Status, Term};
use codec::{Codec, CodecError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const INDEX_BLOB: &str = "index.bin";
pub const SQLITE_FILE: &str = "index.sqlite";
pub const SLUGS_BLOB: &str = "slugs.bin";
pub const RECENT_BLOB: &str = "recent.bin";
pub const ROUTES_BLOB: &str = "routes.bin";
pub const TAXONOMY_BLOB: &str = "taxonomy.bin";

/// Upper bound of every recent-cache list.
pub const RECENT_LIMIT: usize = 200;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error in {file}: {source}")]
    Codec { file: String, source: CodecError },
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("backend '{0}' is not compiled into this build")]
    Unavailable(&'static str),
    #[error("unknown backend '{0}'")]
    Unknown(String),
    #[error("corrupt index: {0}")]
    Corrupt(String),
}

/// Which backend wrote a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Array,
    Sqlite,
}

impl BackendKind {
    pub const ALL: [BackendKind; 2] = [BackendKind::Array, BackendKind::Sqlite];

    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Array => "array",
            BackendKind::Sqlite => "sqlite",
        }
    }

    pub fn parse(name: &str) -> Result<BackendKind, BackendError> {
        match name {
            "array" => Ok(BackendKind::Array),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => Err(BackendError::Unknown(other.to_string())),
        }
    }

    pub fn is_available(self) -> bool {
        match self {
            BackendKind::Array => true,
            BackendKind::Sqlite => cfg!(feature = "sqlite"),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `type → slug → offset` into the snapshot's item collection.
pub type SlugIndex = BTreeMap<String, BTreeMap<String, usize>>;

/// Precomputed recent listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentCache {
    /// Configured order of every type, also used by `all_meta`.
    pub sorts: BTreeMap<String, TypeSort>,
    /// First [`RECENT_LIMIT`] published items of each type, in its order.
    pub items: BTreeMap<String, Vec<ItemMeta>>,
}

/// The unit a rebuild produces and a backend persists.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Sorted by (type, slug). Offsets in [`SlugIndex`] point into this.
    pub items: Vec<Item>,
    pub slugs: SlugIndex,
    pub recent: RecentCache,
    pub routes: RouteTable,
    /// Taxonomy name → terms.
    pub terms: BTreeMap<String, Vec<Term>>,
}

impl Snapshot {
    /// Assemble a snapshot and derive its projections.
    ///
    /// `types` lists every configured type with its order, including types
    /// that have no items yet.
    pub fn new(
        mut items: Vec<Item>,
        types: BTreeMap<String, TypeSort>,
        routes: RouteTable,
        terms: BTreeMap<String, Vec<Term>>,
    ) -> Snapshot {
        items.sort_by(|a, b| {
            (&a.meta.item_type, &a.meta.slug).cmp(&(&b.meta.item_type, &b.meta.slug))
        });

        let mut slugs = SlugIndex::new();
        let mut published: BTreeMap<String, Vec<ItemMeta>> = BTreeMap::new();
        for (offset, item) in items.iter().enumerate() {
            slugs
                .entry(item.meta.item_type.clone())
                .or_default()
                .insert(item.meta.slug.clone(), offset);
            if item.meta.is_published() {
                published
                    .entry(item.meta.item_type.clone())
                    .or_default()
                    .push(item.meta.clone());
            }
        }

        let recent_items = types
            .iter()
            .map(|(name, sort)| {
                let metas = published.remove(name).unwrap_or_default();
                (name.clone(), ordering::top_k(metas, RECENT_LIMIT, *sort))
            })
            .collect();

        Snapshot {
            items,
            slugs,
            recent: RecentCache {
                sorts: types,
                items: recent_items,
            },
            routes,
            terms,
        }
    }
}

/// The projections every backend writes and loads identically.
#[derive(Debug, Clone, Default)]
pub struct Projections {
    pub slugs: SlugIndex,
    pub recent: RecentCache,
    pub routes: RouteTable,
    pub terms: BTreeMap<String, Vec<Term>>,
}

impl Projections {
    /// Rough resident size, for benchmark reporting.
    pub fn approx_bytes(&self) -> usize {
        let slugs: usize = self
            .slugs
            .values()
            .flat_map(|m| m.keys())
            .map(|s| s.len() + 48)
            .sum();
        let recent: usize = self.recent.items.values().flatten().map(meta_bytes).sum();
        let routes: usize = self
            .routes
            .routes
            .iter()
            .map(|(url, t)| url.len() + t.item_type.len() + t.slug.len() + 64)
            .sum();
        let terms: usize = self
            .terms
            .values()
            .flatten()
            .map(|t| {
                let members: usize = t
                    .items
                    .iter()
                    .map(|r| r.item_type.len() + r.slug.len() + 48)
                    .sum();
                t.name.len() + t.slug.len() + members + 96
            })
            .sum();
        slugs + recent + routes + terms
    }
}

/// Rough resident size of one metadata record.
pub fn meta_bytes(meta: &ItemMeta) -> usize {
    std::mem::size_of::<ItemMeta>()
        + meta.id.len()
        + meta.item_type.len()
        + meta.slug.len()
        + meta.title.len()
        + meta.excerpt.len()
        + meta.path.len()
        + meta.url.as_ref().map_or(0, String::len)
        + meta
            .terms
            .values()
            .flatten()
            .map(|t| t.len() + 24)
            .sum::<usize>()
        + meta.fields.len() * 64
}

/// Write the shared projection blobs of `snapshot` into `dir`.
pub fn write_projections(snapshot: &Snapshot, dir: &Path, codec: Codec) -> Result<(), BackendError> {
    write_blob(dir, SLUGS_BLOB, codec, &snapshot.slugs)?;
    write_blob(dir, RECENT_BLOB, codec, &snapshot.recent)?;
    write_blob(dir, ROUTES_BLOB, codec, &snapshot.routes)?;
    write_blob(dir, TAXONOMY_BLOB, codec, &snapshot.terms)?;
    Ok(())
}

/// Load the shared projection blobs from a generation directory.
pub fn load_projections(dir: &Path) -> Result<Projections, BackendError> {
    Ok(Projections {
        slugs: read_blob(dir, SLUGS_BLOB)?,
        recent: read_blob(dir, RECENT_BLOB)?,
        routes: read_blob(dir, ROUTES_BLOB)?,
        terms: read_blob(dir, TAXONOMY_BLOB)?,
    })
}

pub(crate) fn write_blob<T: Serialize>(
    dir: &Path,
    file: &str,
    codec: Codec,
    value: &T,
) -> Result<(), BackendError> {
    let bytes = codec.encode(value).map_err(|source| BackendError::Codec {
        file: file.to_string(),
        source,
    })?;
    fs::write(dir.join(file), bytes)?;
    Ok(())
}

pub(crate) fn read_blob<T: serde::de::DeserializeOwned>(
    dir: &Path,
    file: &str,
) -> Result<T, BackendError> {
    let bytes = fs::read(dir.join(file))?;
    Codec::decode(&bytes).map_err(|source| BackendError::Codec {
        file: file.to_string(),
        source,
    })
}

/// A listing request, the common denominator of `all_meta` and queries.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRequest {
    pub item_type: Option<String>,
    /// Allowed statuses; empty means any.
    pub statuses: Vec<Status>,
    pub sort: TypeSort,
    /// Lowercase tokens that must all occur in title, excerpt or body.
    pub search: Vec<String>,
    /// `(taxonomy, term slug)` filter.
    pub term: Option<(String, String)>,
    pub offset: usize,
    /// `None` returns everything after `offset`.
    pub limit: Option<usize>,
}

impl ListingRequest {
    /// Every item of a type in the given order, any status.
    pub fn all_of_type(item_type: &str, sort: TypeSort) -> Self {
        Self {
            item_type: Some(item_type.to_string()),
            statuses: Vec::new(),
            sort,
            search: Vec::new(),
            term: None,
            offset: 0,
            limit: None,
        }
    }

    /// Whether `meta` passes every filter except search.
    pub fn accepts(&self, meta: &ItemMeta) -> bool {
        if let Some(t) = &self.item_type
            && meta.item_type != *t
        {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&meta.status) {
            return false;
        }
        if let Some((taxonomy, term)) = &self.term
            && !meta.terms_for(taxonomy).iter().any(|t| t == term)
        {
            return false;
        }
        true
    }

    /// Whether every search token occurs in the item's searchable text.
    pub fn matches_search(&self, item: &Item) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let haystack = search_text(&item.meta, &item.body);
        self.search.iter().all(|token| haystack.contains(token.as_str()))
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub items: Vec<ItemMeta>,
    /// Matches before pagination.
    pub total: usize,
}

/// Lowercased title, excerpt and body: what `search` scans.
pub fn search_text(meta: &ItemMeta, body: &str) -> String {
    format!("{}\n{}\n{}", meta.title, meta.excerpt, body).to_lowercase()
}

/// Split a search phrase into lowercase tokens.
pub fn search_tokens(phrase: &str) -> Vec<String> {
    phrase
        .to_lowercase()
        .split_whitespace()
        .map(String::from)
        .collect()
}

/// Read access to one loaded generation.
pub trait IndexHandle: Send + Sync {
    fn backend(&self) -> BackendKind;

    fn count(&self, item_type: &str, status: Option<Status>) -> Result<usize, BackendError>;

    fn get_by_slug(&self, item_type: &str, slug: &str) -> Result<Option<Item>, BackendError>;

    /// Look an item up by its site-relative source path.
    fn get_by_path(&self, path: &str) -> Result<Option<Item>, BackendError>;

    fn list(&self, request: &ListingRequest) -> Result<Listing, BackendError>;

    /// Every item with its body, in (type, slug) order.
    fn all_raw(&self) -> Result<Vec<Item>, BackendError>;

    fn projections(&self) -> &Projections;

    /// Approximate resident bytes held by the handle.
    fn approx_memory_bytes(&self) -> usize;

    fn backend_name(&self) -> &'static str {
        self.backend().name()
    }

    /// Configured order of a type; date descending for unknown types.
    fn sort_for(&self, item_type: &str) -> TypeSort {
        self.projections()
            .recent
            .sorts
            .get(item_type)
            .copied()
            .unwrap_or_default()
    }

    /// Metadata of every item of a type, any status, in the type's order.
    fn all_meta(&self, item_type: &str) -> Result<Vec<ItemMeta>, BackendError> {
        let request = ListingRequest::all_of_type(item_type, self.sort_for(item_type));
        Ok(self.list(&request)?.items)
    }

    /// The first `min(n, 200)` published items of a type.
    fn recent_meta(&self, item_type: &str, n: usize) -> Vec<ItemMeta> {
        self.projections()
            .recent
            .items
            .get(item_type)
            .map(|v| v.iter().take(n.min(RECENT_LIMIT)).cloned().collect())
            .unwrap_or_default()
    }

    fn terms(&self, taxonomy: &str) -> Vec<Term> {
        self.projections()
            .terms
            .get(taxonomy)
            .cloned()
            .unwrap_or_default()
    }

    fn routes(&self) -> &RouteTable {
        &self.projections().routes
    }
}

/// A storage implementation.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Persist `snapshot` into the (staging) directory `dir`.
    fn write(&self, snapshot: &Snapshot, dir: &Path, codec: Codec) -> Result<(), BackendError>;

    /// Open a generation directory written by this backend.
    fn load(&self, dir: &Path) -> Result<Box<dyn IndexHandle>, BackendError>;
}

/// Instantiate a backend by kind.
pub fn create_backend(kind: BackendKind) -> Result<Box<dyn Backend>, BackendError> {
    match kind {
        BackendKind::Array => Ok(Box::new(array::ArrayBackend)),
        #[cfg(feature = "sqlite")]
        BackendKind::Sqlite => Ok(Box::new(sqlite::SqliteBackend)),
        #[cfg(not(feature = "sqlite"))]
        BackendKind::Sqlite => Err(BackendError::Unavailable(kind.name())),
    }
}
