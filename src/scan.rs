//! Content scanning and parsing.
//!
//! First step of every rebuild. Walks each content type's directory, parses
//! every Markdown file into an [`Item`], and loads taxonomy definitions into
//! [`Term`] lists.
//!
//! ## Directory Structure
//!
//! ```text
//! site/
//! ├── folio.toml
//! └── content/
//!     ├── posts/                       # [types.post]  (flat)
//!     │   ├── hello-world.md           # slug: hello-world
//!     │   └── 2024/recap.md            # slug: recap (flat types ignore directories)
//!     ├── pages/                       # [types.page]  (hierarchical)
//!     │   ├── 010-about.md             # slug: about, order 10
//!     │   └── 020-docs/
//!     │       ├── index.md             # slug: docs
//!     │       └── 010-intro.md         # slug: docs/intro
//!     └── taxonomies/tags.yaml
//! ```
//!
//! ## Frontmatter
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `title` | Required |
//! | `id` | Stable identifier, default `<type>/<slug>` |
//! | `slug` | Overrides the filename-derived slug |
//! | `status` | `draft` (default), `published`, `unlisted` |
//! | `date`, `updated` | See [`crate::metadata::parse_date`] |
//! | `excerpt` | Default: first paragraph of the body |
//! | `order` | Manual order, default: the `NNN-` prefix |
//! | *taxonomy name* | Term list, e.g. `tags: [rust, cms]` |
//! | anything else | Custom field |
//!
//! ## Error Policy
//!
//! A broken file never aborts the scan. It is skipped and recorded as an
//! [`IndexIssue`]; the rest of the corpus is indexed normally. Only failures
//! that make the whole scan meaningless surface as [`ScanError`].

use crate::config::{RESERVED_KEYS, SiteConfig, TypeConfig, UrlStyle};
use crate::frontmatter;
use crate::metadata;
use crate::naming::{parse_entry_name, slugify, slugify_path, strip_prefix};
use crate::taxonomy::{self, TermLabel};
use crate::types::{FieldValue, IndexIssue, Item, ItemMeta, Status, Term};
use rayon::prelude::*;
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("content directory {0} is not a directory")]
    NotADirectory(PathBuf),
}

const CONTENT_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Everything one scan produced.
#[derive(Debug, Default)]
pub struct ScanOutput {
    /// Sorted by (type, slug).
    pub items: Vec<Item>,
    /// Taxonomy name → terms sorted by slug.
    pub terms: BTreeMap<String, Vec<Term>>,
    pub issues: Vec<IndexIssue>,
    /// Number of content files found, including skipped ones.
    pub files_seen: usize,
}

/// A content file queued for parsing.
#[derive(Debug, Clone)]
struct ContentFile {
    item_type: String,
    /// Absolute path.
    path: PathBuf,
    /// Path relative to the type directory.
    rel: PathBuf,
}

/// One successfully parsed file.
#[derive(Debug)]
struct Parsed {
    item: Item,
    labels: Vec<TermLabel>,
}

/// Scan every configured content type and taxonomy below `root`.
pub fn scan(root: &Path, config: &SiteConfig) -> Result<ScanOutput, ScanError> {
    let mut issues = Vec::new();
    let files = discover(root, config, &mut issues)?;
    let files_seen = files.len();
    log::debug!("scan: {files_seen} content files under {}", root.display());

    let parsed: Vec<Result<Parsed, IndexIssue>> = files
        .par_iter()
        .map(|file| {
            parse_file(root, file, config).map_err(|message| IndexIssue::Parse {
                path: relative_path(root, &file.path),
                message,
            })
        })
        .collect();

    let mut items: Vec<Item> = Vec::with_capacity(parsed.len());
    let mut labels = Vec::new();
    let mut claimed: HashMap<(String, String), String> = HashMap::new();
    for result in parsed {
        match result {
            Ok(p) => {
                let key = (p.item.meta.item_type.clone(), p.item.meta.slug.clone());
                if let Some(kept) = claimed.get(&key) {
                    issues.push(IndexIssue::DuplicateSlug {
                        path: p.item.meta.path.clone(),
                        item_type: key.0,
                        slug: key.1,
                        kept: kept.clone(),
                    });
                    continue;
                }
                claimed.insert(key, p.item.meta.path.clone());
                labels.extend(p.labels);
                items.push(p.item);
            }
            Err(issue) => issues.push(issue),
        }
    }
    items.sort_by(|a, b| {
        (&a.meta.item_type, &a.meta.slug).cmp(&(&b.meta.item_type, &b.meta.slug))
    });

    let mut terms = BTreeMap::new();
    for (name, tax) in &config.taxonomies {
        let (defs, tax_issues) = match &tax.file {
            Some(file) => taxonomy::load_definitions(name, &root.join(file)),
            None => (Vec::new(), Vec::new()),
        };
        issues.extend(tax_issues);
        terms.insert(
            name.clone(),
            taxonomy::build_terms(name, defs, &items, &labels),
        );
    }

    for issue in &issues {
        log::debug!("scan issue: {issue}");
    }
    Ok(ScanOutput {
        items,
        terms,
        issues,
        files_seen,
    })
}

/// Enumerate content files, type by type, each type path-sorted.
fn discover(
    root: &Path,
    config: &SiteConfig,
    issues: &mut Vec<IndexIssue>,
) -> Result<Vec<ContentFile>, ScanError> {
    let mut files = Vec::new();
    for (name, ty) in &config.types {
        let dir = root.join(&ty.dir);
        if !dir.exists() {
            log::debug!("type '{name}': {} does not exist, skipping", dir.display());
            continue;
        }
        if !dir.is_dir() {
            return Err(ScanError::NotADirectory(dir));
        }
        for entry in content_walker(&dir) {
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_content_file(entry.path()) => {
                    let path = entry.path().to_path_buf();
                    let rel = path.strip_prefix(&dir).unwrap_or(&path).to_path_buf();
                    files.push(ContentFile {
                        item_type: name.clone(),
                        path,
                        rel,
                    });
                }
                Ok(_) => {}
                Err(e) => issues.push(IndexIssue::Parse {
                    path: e
                        .path()
                        .map(|p| relative_path(root, p))
                        .unwrap_or_else(|| ty.dir.clone()),
                    message: format!("cannot read directory entry: {e}"),
                }),
            }
        }
    }
    Ok(files)
}

/// Sorted, hidden-entry-skipping walker shared with the fingerprint.
pub(crate) fn content_walker(dir: &Path) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
}

pub(crate) fn is_content_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| CONTENT_EXTENSIONS.contains(&ext.as_str()))
}

/// Site-relative, `/`-separated path.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn parse_file(root: &Path, file: &ContentFile, config: &SiteConfig) -> Result<Parsed, String> {
    let ty = config
        .type_config(&file.item_type)
        .ok_or_else(|| format!("unknown content type '{}'", file.item_type))?;
    let content = fs::read_to_string(&file.path).map_err(|e| format!("cannot read file: {e}"))?;
    let fm = frontmatter::extract(&content).map_err(|e| e.to_string())?;

    let title = fm
        .get_scalar("title")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or("missing required field 'title'")?;

    let status = match fm.get_scalar("status") {
        Some(raw) => Status::parse(&raw).unwrap_or_else(|| {
            log::debug!("{}: unknown status '{raw}', using draft", file.path.display());
            Status::Draft
        }),
        None => Status::Draft,
    };

    let date = date_field(&fm, "date")?;
    let updated = date_field(&fm, "updated")?;

    let stem = file
        .rel
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let order = match fm.get("order") {
        Some(v) => v.as_i64().ok_or("'order' must be an integer")?,
        None => parse_entry_name(&stem).number.map(i64::from).unwrap_or(0),
    };

    let slug = derive_slug(ty, &file.rel, fm.get_scalar("slug").as_deref());
    if slug.is_empty() {
        return Err(format!("cannot derive a slug from '{stem}'"));
    }
    let id = fm
        .get_scalar("id")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("{}/{slug}", file.item_type));

    let mut terms = BTreeMap::new();
    let mut labels = Vec::new();
    for taxonomy in config.taxonomies.keys() {
        let mut slugs: Vec<String> = Vec::new();
        for label in fm.get_string_list(taxonomy) {
            let term = slugify(&label);
            if term.is_empty() || slugs.contains(&term) {
                continue;
            }
            labels.push(TermLabel {
                taxonomy: taxonomy.clone(),
                slug: term.clone(),
                label: label.trim().to_string(),
            });
            slugs.push(term);
        }
        if !slugs.is_empty() {
            terms.insert(taxonomy.clone(), slugs);
        }
    }

    let fields: BTreeMap<String, FieldValue> = fm
        .entries()
        .filter(|(k, _)| !RESERVED_KEYS.contains(k) && !config.taxonomies.contains_key(*k))
        .map(|(k, v)| (k.to_string(), FieldValue::from(v.clone())))
        .collect();

    let body = fm.body();
    let meta = ItemMeta {
        id,
        item_type: file.item_type.clone(),
        slug,
        title,
        status,
        date,
        updated,
        excerpt: metadata::excerpt(fm.get_str("excerpt"), body),
        terms,
        fields,
        order,
        path: relative_path(root, &file.path),
        url: None,
    };
    Ok(Parsed {
        item: Item {
            meta,
            body: body.to_string(),
        },
        labels,
    })
}

fn date_field(fm: &frontmatter::Frontmatter<'_>, key: &str) -> Result<Option<chrono::NaiveDateTime>, String> {
    match fm.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => {
            let raw = fm
                .get_scalar(key)
                .ok_or_else(|| format!("'{key}' must be a date string"))?;
            metadata::parse_date(&raw)
                .map(Some)
                .ok_or_else(|| format!("unparsable {key} '{raw}'"))
        }
    }
}

/// Slug for a file at `rel` (relative to its type directory).
///
/// Flat types use the prefix-stripped stem. Hierarchical types use the whole
/// prefix-stripped path, with `index` files standing for their directory.
fn derive_slug(ty: &TypeConfig, rel: &Path, explicit: Option<&str>) -> String {
    let mut segments: Vec<String> = rel
        .with_extension("")
        .components()
        .map(|c| strip_prefix(&c.as_os_str().to_string_lossy()))
        .collect();

    match ty.url_style {
        UrlStyle::Flat => match explicit {
            Some(slug) => slugify(slug),
            None => segments.last().map(|s| slugify(s)).unwrap_or_default(),
        },
        UrlStyle::Hierarchical => {
            if segments.len() > 1 && segments.last().is_some_and(|s| s == "index") {
                segments.pop();
            }
            if let Some(slug) = explicit {
                segments.pop();
                segments.push(slug.to_string());
            }
            slugify_path(&segments.join("/"))
        }
    }
}
