//! Site configuration module.
//!
//! Handles loading, validating, and merging `folio.toml`. The file lives at the
//! site root and describes where content lives, how each content type is
//! routed and ordered, which taxonomies exist, and how the index cache behaves.
//!
//! ## Config File Location
//!
//! ```text
//! site/
//! ├── folio.toml               # Engine config (optional, stock defaults otherwise)
//! ├── content/
//! │   ├── posts/               # [types.post]
//! │   ├── pages/               # [types.page]
//! │   └── taxonomies/
//! │       └── tags.yaml        # [taxonomies.tags]
//! └── .folio-cache/            # Index generations (cache_dir)
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! cache_dir = ".folio-cache"
//!
//! [index]
//! mode = "never"            # never | auto | always
//! backend = "auto"          # auto | array | sqlite
//! binary_codec = true       # bincode blobs when available, JSON otherwise
//! sqlite_threshold = 2000   # auto backend switches to SQLite at this many items
//!
//! [types.post]
//! dir = "content/posts"
//! url = "/blog/{year}/{slug}/"
//! url_style = "flat"        # flat | hierarchical
//! sort = "date"             # date | title | order
//! direction = "desc"        # asc | desc
//!
//! [taxonomies.tags]
//! file = "content/taxonomies/tags.yaml"
//!
//! [processing]
//! max_processes = 4         # parser workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Scalar sections are sparse: override just the values you want. The
//! `[types]` and `[taxonomies]` tables are different: a user file that
//! declares either table replaces the stock entries for it entirely, so a site
//! never inherits content types it did not ask for.
//!
//! Unknown keys are rejected to catch typos early.

use crate::types::{SortDirection, SortField};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file at the site root.
pub const CONFIG_FILENAME: &str = "folio.toml";

/// Frontmatter keys with a fixed meaning; taxonomies may not reuse them.
pub const RESERVED_KEYS: &[&str] = &[
    "id", "title", "slug", "status", "date", "updated", "excerpt", "order", "type",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Engine configuration loaded from `folio.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Cache directory, relative to the site root.
    pub cache_dir: String,
    /// Index mode, backend choice, codec preference.
    pub index: IndexConfig,
    /// Content types keyed by type name.
    pub types: BTreeMap<String, TypeConfig>,
    /// Taxonomies keyed by taxonomy name (also the frontmatter key).
    pub taxonomies: BTreeMap<String, TaxonomyConfig>,
    /// Parallel parsing settings.
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let mut types = BTreeMap::new();
        types.insert(
            "post".to_string(),
            TypeConfig {
                dir: "content/posts".to_string(),
                url: "/blog/{slug}/".to_string(),
                url_style: UrlStyle::Flat,
                sort: SortField::Date,
                direction: SortDirection::Desc,
            },
        );
        types.insert(
            "page".to_string(),
            TypeConfig {
                dir: "content/pages".to_string(),
                url: "/{path}/".to_string(),
                url_style: UrlStyle::Hierarchical,
                sort: SortField::Order,
                direction: SortDirection::Asc,
            },
        );
        let mut taxonomies = BTreeMap::new();
        taxonomies.insert(
            "tags".to_string(),
            TaxonomyConfig {
                file: Some("content/taxonomies/tags.yaml".to_string()),
            },
        );
        Self {
            cache_dir: ".folio-cache".to_string(),
            index: IndexConfig::default(),
            types,
            taxonomies,
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_dir.trim().is_empty() {
            return Err(ConfigError::Validation("cache_dir must not be empty".into()));
        }
        if self.index.sqlite_threshold == 0 {
            return Err(ConfigError::Validation(
                "index.sqlite_threshold must be greater than zero".into(),
            ));
        }
        for (name, ty) in &self.types {
            if !is_identifier(name) {
                return Err(ConfigError::Validation(format!(
                    "type name '{name}' must be lowercase letters, digits, '-' or '_'"
                )));
            }
            if ty.dir.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "types.{name}.dir must not be empty"
                )));
            }
            let has_key = match ty.url_style {
                UrlStyle::Flat => ty.url.contains("{slug}"),
                UrlStyle::Hierarchical => ty.url.contains("{path}") || ty.url.contains("{slug}"),
            };
            if !has_key {
                return Err(ConfigError::Validation(format!(
                    "types.{name}.url must contain {{slug}} or {{path}}"
                )));
            }
        }
        for name in self.taxonomies.keys() {
            if !is_identifier(name) {
                return Err(ConfigError::Validation(format!(
                    "taxonomy name '{name}' must be lowercase letters, digits, '-' or '_'"
                )));
            }
            if RESERVED_KEYS.contains(&name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "taxonomy name '{name}' is a reserved frontmatter key"
                )));
            }
        }
        Ok(())
    }

    /// Absolute cache directory for a site rooted at `root`.
    pub fn cache_path(&self, root: &Path) -> PathBuf {
        root.join(&self.cache_dir)
    }

    /// Look up a content type's settings.
    pub fn type_config(&self, name: &str) -> Option<&TypeConfig> {
        self.types.get(name)
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// How often the committed index is checked against the content on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Trust the committed generation unconditionally. Production setting.
    #[default]
    Never,
    /// Recompute the fingerprint on every read and rebuild when it differs.
    Auto,
    /// Rebuild the whole index on every read. Debug only: every request pays
    /// for a full scan and write of the corpus.
    Always,
}

/// Which backend new generations are written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Array below `sqlite_threshold` items, SQLite at or above it.
    #[default]
    Auto,
    Array,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    pub mode: IndexMode,
    pub backend: BackendChoice,
    /// Prefer the compact binary codec for cache blobs.
    pub binary_codec: bool,
    /// Item count at which `backend = "auto"` switches to SQLite.
    pub sqlite_threshold: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            mode: IndexMode::Never,
            backend: BackendChoice::Auto,
            binary_codec: true,
            sqlite_threshold: 2000,
        }
    }
}

/// URL layout of a content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlStyle {
    /// One pattern for every item: `/blog/{year}/{slug}/`.
    #[default]
    Flat,
    /// URL mirrors the directory tree below the type's directory.
    Hierarchical,
}

/// Settings for one content type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TypeConfig {
    /// Content directory, relative to the site root.
    pub dir: String,
    /// URL pattern. Tokens: `{type}`, `{slug}`, `{path}`, `{year}`, `{month}`, `{day}`.
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub url_style: UrlStyle,
    /// Listing order for this type (recent cache, `all_meta`, default query sort).
    #[serde(default)]
    pub sort: SortField,
    #[serde(default = "default_direction")]
    pub direction: SortDirection,
}

fn default_url() -> String {
    "/{type}/{slug}/".to_string()
}

fn default_direction() -> SortDirection {
    SortDirection::Desc
}

/// Settings for one taxonomy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TaxonomyConfig {
    /// YAML term definition file, relative to the site root. Optional: terms
    /// referenced only from frontmatter are created on the fly.
    pub file: Option<String>,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel parser workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SiteConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults do not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `folio.toml` from a site root as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
///
/// `[types]` and `[taxonomies]` in the overlay replace the base tables.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => {
            let mut base = base;
            if let (toml::Value::Table(base_table), toml::Value::Table(ov_table)) =
                (&mut base, &ov)
            {
                for key in ["types", "taxonomies"] {
                    if ov_table.contains_key(key) {
                        base_table.remove(key);
                    }
                }
            }
            merge_toml(base, ov)
        }
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config for the site rooted at `root`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    let config = resolve_config(base, overlay)?;
    log::debug!(
        "loaded config: {} types, {} taxonomies, mode {:?}",
        config.types.len(),
        config.taxonomies.len(),
        config.index.mode
    );
    Ok(config)
}

/// Config files whose changes must invalidate the index.
pub fn tracked_config_files(root: &Path, config: &SiteConfig) -> Vec<PathBuf> {
    let mut files = vec![root.join(CONFIG_FILENAME)];
    files.extend(
        config
            .taxonomies
            .values()
            .filter_map(|t| t.file.as_ref())
            .map(|f| root.join(f)),
    );
    files
}

/// Returns a fully-commented stock `folio.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Folio Configuration
# ===================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Where index generations are written, relative to the site root.
cache_dir = ".folio-cache"

# ---------------------------------------------------------------------------
# Index
# ---------------------------------------------------------------------------
[index]
# When to check the cache against the content on disk:
#   never  - trust the committed index (production)
#   auto   - fingerprint the content on every read, rebuild when it changed
#   always - rebuild on EVERY read. Debug only: each request rescans and
#            rewrites the whole corpus.
mode = "never"

# Storage backend for new generations: auto | array | sqlite.
# "auto" picks the in-memory array backend below sqlite_threshold items.
backend = "auto"

# Write cache blobs with the compact binary codec (falls back to JSON when
# the binary codec is not compiled in).
binary_codec = true

sqlite_threshold = 2000

# ---------------------------------------------------------------------------
# Content types
# ---------------------------------------------------------------------------
# Declaring [types.*] replaces these stock types entirely.
#
# url tokens: {type} {slug} {path} {year} {month} {day}
# url_style:  flat | hierarchical (URL mirrors the directory tree)
# sort:       date | title | order      direction: asc | desc
[types.post]
dir = "content/posts"
url = "/blog/{slug}/"
url_style = "flat"
sort = "date"
direction = "desc"

[types.page]
dir = "content/pages"
url = "/{path}/"
url_style = "hierarchical"
sort = "order"
direction = "asc"

# ---------------------------------------------------------------------------
# Taxonomies
# ---------------------------------------------------------------------------
# The table name is also the frontmatter key (tags: [rust, cms]).
# Declaring [taxonomies.*] replaces these stock taxonomies entirely.
[taxonomies.tags]
file = "content/taxonomies/tags.yaml"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel parser workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
