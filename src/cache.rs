//! On-disk cache layout: generations, atomic commits, garbage collection.
//!
//! Building an index takes a full scan of the corpus; reading one must never
//! observe a half-written build. This module owns the directory layout that
//! makes both true without locks.
//!
//! # Layout
//!
//! ```text
//! .folio-cache/
//! ├── fingerprint.json        # commit marker → names the live generation
//! ├── gen-20240103T101500-…/  # a complete generation
//! │   ├── index.bin           # array backend only
//! │   ├── index.sqlite        # SQLite backend only
//! │   ├── slugs.bin
//! │   ├── recent.bin
//! │   ├── routes.bin
//! │   └── taxonomy.bin
//! └── .tmp-XXXXXX/            # a generation being written
//! ```
//!
//! # Write protocol
//!
//! 1. Every file of the new generation is written into a fresh `.tmp-*`
//!    directory. A failed or abandoned build deletes it on drop.
//! 2. The files and the directory are synced, then the directory is renamed
//!    to `gen-<id>`. Renaming a directory is atomic.
//! 3. `fingerprint.json` is replaced atomically (temp file + rename). Only now
//!    do readers see the new generation.
//!
//! Readers resolve the generation through `fingerprint.json` alone, so they
//! never mix files from two builds. Until step 3 completes the previous
//! generation stays authoritative.
//!
//! # Garbage collection
//!
//! After a commit, `gen-*` directories other than the new and the previously
//! committed one are deleted, as are stale `.tmp-*` directories. Both only
//! once they are older than a grace period, so a concurrent rebuild that has
//! renamed its generation but not yet committed it keeps its files.

use crate::fingerprint::FingerprintRecord;
use chrono::Utc;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime};
use tempfile::{NamedTempFile, TempDir};
use thiserror::Error;

/// Name of the commit marker within the cache directory.
pub const RECORD_FILENAME: &str = "fingerprint.json";

const GEN_PREFIX: &str = "gen-";
const TMP_PREFIX: &str = ".tmp-";

/// Default age before an unreferenced generation may be deleted.
pub const DEFAULT_GC_GRACE: Duration = Duration::from_secs(600);

static GENERATION_COUNTER: AtomicU32 = AtomicU32::new(0);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot replace {path}: {source}")]
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
    },
    #[error("fingerprint record error: {0}")]
    Record(#[from] serde_json::Error),
}

/// A cache directory.
#[derive(Debug, Clone)]
pub struct CacheDir {
    path: PathBuf,
}

/// A generation directory being written. Deleted on drop unless published.
#[derive(Debug)]
pub struct StagingDir {
    dir: TempDir,
}

impl StagingDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Outcome of a garbage collection pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GcStats {
    pub removed: Vec<String>,
    pub kept: usize,
}

impl fmt::Display for GcStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.removed.is_empty() {
            write!(f, "{} generation(s) kept", self.kept)
        } else {
            write!(
                f,
                "{} generation(s) kept, {} removed",
                self.kept,
                self.removed.len()
            )
        }
    }
}

impl CacheDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_path(&self) -> PathBuf {
        self.path.join(RECORD_FILENAME)
    }

    pub fn generation_path(&self, generation: &str) -> PathBuf {
        self.path.join(generation)
    }

    /// Read the commit marker.
    ///
    /// Returns `Ok(None)` if there is none. A marker that cannot be parsed is
    /// treated like a missing one: the cache is rebuilt, not trusted.
    pub fn read_record(&self) -> Result<Option<FingerprintRecord>, CacheError> {
        let path = self.record_path();
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                log::warn!("ignoring unreadable {}: {e}", path.display());
                Ok(None)
            }
        }
    }

    /// The committed record, if its generation directory still exists.
    pub fn committed(&self) -> Result<Option<FingerprintRecord>, CacheError> {
        Ok(self
            .read_record()?
            .filter(|r| self.generation_path(&r.generation).is_dir()))
    }

    /// Create a fresh staging directory for a new generation.
    pub fn begin_generation(&self) -> Result<StagingDir, CacheError> {
        fs::create_dir_all(&self.path)?;
        let dir = tempfile::Builder::new()
            .prefix(TMP_PREFIX)
            .tempdir_in(&self.path)?;
        Ok(StagingDir { dir })
    }

    /// Sync a staged generation and rename it into place.
    ///
    /// Returns the generation name. The generation is not visible to readers
    /// until [`CacheDir::commit_record`] names it.
    pub fn publish(&self, staging: StagingDir) -> Result<String, CacheError> {
        for entry in fs::read_dir(staging.path())? {
            let path = entry?.path();
            if path.is_file() {
                File::open(&path)?.sync_all()?;
            }
        }
        sync_dir(staging.path());

        let generation = new_generation_name();
        let target = self.generation_path(&generation);
        let staged = staging.dir.keep();
        if let Err(e) = fs::rename(&staged, &target) {
            discard_staging(&staged);
            return Err(e.into());
        }
        sync_dir(&self.path);
        log::debug!("published generation {generation}");
        Ok(generation)
    }

    /// Atomically replace the commit marker.
    pub fn commit_record(&self, record: &FingerprintRecord) -> Result<(), CacheError> {
        let json = serde_json::to_vec_pretty(record)?;
        atomic_write(&self.record_path(), &json)
    }

    /// Names of all published generations, oldest first.
    pub fn generations(&self) -> Result<Vec<String>, CacheError> {
        let mut names: Vec<String> = match fs::read_dir(&self.path) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .filter(|n| n.starts_with(GEN_PREFIX))
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        names.sort();
        Ok(names)
    }

    /// Delete unreferenced generations and stale staging directories.
    ///
    /// `keep` names generations that must survive regardless of age.
    pub fn collect_garbage(&self, keep: &[&str], grace: Duration) -> Result<GcStats, CacheError> {
        let mut stats = GcStats::default();
        let entries = match fs::read_dir(&self.path) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(stats),
            Err(e) => return Err(e.into()),
        };
        let now = SystemTime::now();
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_gen = name.starts_with(GEN_PREFIX);
            if !is_gen && !name.starts_with(TMP_PREFIX) {
                continue;
            }
            if keep.contains(&name.as_str()) {
                stats.kept += 1;
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| now.duration_since(t).ok())
                .unwrap_or_default();
            if age < grace {
                if is_gen {
                    stats.kept += 1;
                }
                continue;
            }
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => {
                    log::debug!("removed stale cache entry {name}");
                    stats.removed.push(name);
                }
                Err(e) => log::warn!("cannot remove stale cache entry {name}: {e}"),
            }
        }
        Ok(stats)
    }

    /// Total size in bytes of one generation's files.
    pub fn generation_size(&self, generation: &str) -> u64 {
        walkdir::WalkDir::new(self.generation_path(generation))
            .into_iter()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum()
    }
}

/// Generation names sort by creation time; the counter and pid keep
/// concurrent builders apart.
fn new_generation_name() -> String {
    let seq = GENERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "{GEN_PREFIX}{}-{}-{seq:06}",
        Utc::now().format("%Y%m%dT%H%M%S%.6f"),
        std::process::id()
    )
}

/// Write `bytes` to `path` atomically: temp file in the same directory,
/// sync, rename over the target.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CacheError::Persist {
        path: path.to_path_buf(),
        source: e,
    })?;
    sync_dir(dir);
    Ok(())
}

/// Remove a staging directory that could not be published. A leftover is
/// harmless (garbage collection sweeps `.tmp-*`) so failure only warns.
fn discard_staging(staged: &Path) -> bool {
    match fs::remove_dir_all(staged) {
        Ok(()) => true,
        Err(e) => {
            log::warn!(
                "could not remove unpublished staging dir {}: {e}",
                staged.display()
            );
            false
        }
    }
}

/// Best effort: directories cannot be opened for syncing on every platform.
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}
