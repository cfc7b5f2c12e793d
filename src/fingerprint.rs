//! Corpus fingerprint and the fingerprint record.
//!
//! The fingerprint is how `auto` mode notices that content changed without
//! rescanning it. It is a SHA-256 over the metadata of every relevant file:
//!
//! - every file below each content type directory (hidden entries skipped)
//! - `folio.toml` and every taxonomy definition file, present or not
//! - the cache format version
//!
//! For each file the relative path, modification time (nanoseconds) and size
//! are fed to the hasher in path order. No file contents are read, so a check
//! is O(number of files). A file edited within the filesystem's timestamp
//! resolution without a size change is the known blind spot.
//!
//! The [`FingerprintRecord`] is the commit marker of a cache generation: the
//! last file a rebuild writes. It names the generation readers must use.

use crate::config::{self, SiteConfig};
use crate::scan::{content_walker, relative_path};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Version of the on-disk cache format. Bump this to invalidate every
/// existing cache when a blob layout or the digest computation changes.
pub const FORMAT_VERSION: u32 = 1;

/// A freshly computed fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Hex SHA-256.
    pub digest: String,
    /// Number of files that went into the digest.
    pub files: usize,
}

/// One file's contribution to the digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct FileStamp {
    rel: String,
    mtime_nanos: Option<u128>,
    size: Option<u64>,
}

fn stamp(root: &Path, path: &Path) -> FileStamp {
    let meta = std::fs::metadata(path).ok();
    FileStamp {
        rel: relative_path(root, path),
        mtime_nanos: meta
            .as_ref()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos()),
        size: meta.map(|m| m.len()),
    }
}

/// Compute the fingerprint of the site rooted at `root`.
///
/// Never fails: unreadable entries are logged and left out, which changes
/// the digest and therefore errs on the side of rebuilding.
pub fn compute(root: &Path, config: &SiteConfig) -> Fingerprint {
    let mut stamps: Vec<FileStamp> = Vec::new();

    for ty in config.types.values() {
        let dir = root.join(&ty.dir);
        if !dir.is_dir() {
            continue;
        }
        for entry in content_walker(&dir) {
            match entry {
                Ok(e) if e.file_type().is_file() => stamps.push(stamp(root, e.path())),
                Ok(_) => {}
                Err(e) => log::warn!("fingerprint: skipping unreadable entry: {e}"),
            }
        }
    }
    for file in config::tracked_config_files(root, config) {
        stamps.push(stamp(root, &file));
    }

    stamps.sort();
    stamps.dedup_by(|a, b| a.rel == b.rel);

    let mut hasher = Sha256::new();
    hasher.update(b"folio-fingerprint\0");
    hasher.update(FORMAT_VERSION.to_le_bytes());
    for s in &stamps {
        hasher.update(s.rel.as_bytes());
        hasher.update(b"\0");
        match (s.mtime_nanos, s.size) {
            (Some(mtime), Some(size)) => {
                hasher.update(b"\x01");
                hasher.update(mtime.to_le_bytes());
                hasher.update(size.to_le_bytes());
            }
            _ => hasher.update(b"\x00"),
        }
        hasher.update(b"\n");
    }

    Fingerprint {
        digest: format!("{:x}", hasher.finalize()),
        files: stamps.len(),
    }
}

/// The commit marker of a cache generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub format_version: u32,
    /// Fingerprint of the corpus the generation was built from.
    pub digest: String,
    pub built_at: DateTime<Utc>,
    /// Generation directory name below the cache dir (`gen-…`).
    pub generation: String,
    /// Backend that wrote the generation (`array` or `sqlite`).
    pub backend: String,
    /// Codec of the generation's blobs (`binary` or `json`).
    pub codec: String,
    pub item_count: usize,
}

impl FingerprintRecord {
    /// Whether this record is usable by this build of the engine.
    pub fn is_current_format(&self) -> bool {
        self.format_version == FORMAT_VERSION
    }

    /// Whether the record matches `fingerprint`.
    pub fn matches(&self, fingerprint: &Fingerprint) -> bool {
        self.is_current_format() && self.digest == fingerprint.digest
    }
}

/// Recompute the fingerprint and compare it with `record`.
pub fn is_fresh(root: &Path, config: &SiteConfig, record: &FingerprintRecord) -> bool {
    let current = compute(root, config);
    let fresh = record.matches(&current);
    if fresh {
        log::debug!("fingerprint: index is fresh ({} files)", current.files);
    } else {
        log::info!(
            "fingerprint: index is stale (recorded {}, current {})",
            short(&record.digest),
            short(&current.digest)
        );
    }
    fresh
}

/// First 12 hex digits, for display.
pub fn short(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
