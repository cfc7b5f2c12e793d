//! Build, persist and commit index generations.
//!
//! A rebuild runs in five steps:
//!
//! ```text
//! 1. fingerprint   digest of the corpus before anything is read
//! 2. scan          content/ → items, terms, issues
//! 3. routes        items → URLs, route table, collisions
//! 4. write         snapshot → .tmp-*/ → gen-*/     (backend + codec)
//! 5. commit        fingerprint.json names gen-*    (last, atomic)
//! ```
//!
//! The fingerprint is taken first so that a file edited while the scan runs
//! makes the committed digest stale and the next `auto` read rebuilds again.
//!
//! Steps 4 and 5 are split ([`Indexer::write_generation`] returns a
//! [`PendingGeneration`] that must be committed) so a failure between them
//! leaves the previous generation in charge. [`Indexer::lint`] runs steps
//! 2 and 3 only and never touches the cache.

use crate::backend::codec::Codec;
use crate::backend::{self, BackendError, BackendKind, IndexHandle, Snapshot};
use crate::cache::{CacheDir, CacheError, DEFAULT_GC_GRACE, GcStats};
use crate::config::{self, BackendChoice, ConfigError, SiteConfig};
use crate::fingerprint::{self, Fingerprint, FingerprintRecord, FORMAT_VERSION};
use crate::hooks::{HookRegistry, IndexEvent};
use crate::ordering::TypeSort;
use crate::routes;
use crate::scan::{self, ScanError};
use crate::types::IndexIssue;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("backend write error: {0}")]
    Backend(#[from] BackendError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Result of a read-only validation pass.
#[derive(Debug, Clone, Default)]
pub struct LintReport {
    pub files_seen: usize,
    pub item_count: usize,
    pub issues: Vec<IndexIssue>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// A scanned and routed corpus, ready to be written.
#[derive(Debug)]
pub struct Compiled {
    pub snapshot: Snapshot,
    pub fingerprint: Fingerprint,
    pub issues: Vec<IndexIssue>,
    pub files_seen: usize,
}

/// Result of a committed rebuild.
#[derive(Debug, Clone)]
pub struct RebuildReport {
    pub generation: String,
    pub backend: BackendKind,
    pub codec: Codec,
    pub digest: String,
    pub item_count: usize,
    pub files_seen: usize,
    pub issues: Vec<IndexIssue>,
    pub gc: GcStats,
    pub elapsed: Duration,
}

/// Cache state as seen from outside, for `folio status`.
#[derive(Debug, Clone)]
pub struct IndexStatus {
    pub committed: Option<FingerprintRecord>,
    pub current: Fingerprint,
    pub fresh: bool,
    pub generations: Vec<String>,
}

/// A committed generation opened for reading.
pub struct LoadedGeneration {
    pub record: FingerprintRecord,
    pub handle: Box<dyn IndexHandle>,
}

/// Builds generations for one site.
#[derive(Debug)]
pub struct Indexer<'h> {
    root: PathBuf,
    config: SiteConfig,
    cache: CacheDir,
    hooks: Option<&'h HookRegistry>,
    backend_override: Option<BackendKind>,
    gc_grace: Duration,
}

impl<'h> Indexer<'h> {
    pub fn new(root: impl Into<PathBuf>, config: SiteConfig) -> Self {
        let root = root.into();
        let cache = CacheDir::new(config.cache_path(&root));
        Self {
            root,
            config,
            cache,
            hooks: None,
            backend_override: None,
            gc_grace: DEFAULT_GC_GRACE,
        }
    }

    /// Load `folio.toml` from `root` and build an indexer for it.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, IndexError> {
        let root = root.into();
        let config = config::load_config(&root)?;
        Ok(Self::new(root, config))
    }

    pub fn with_hooks(mut self, hooks: &'h HookRegistry) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Force the backend of new generations regardless of configuration.
    pub fn with_backend(mut self, kind: Option<BackendKind>) -> Self {
        self.backend_override = kind;
        self
    }

    /// Write generations somewhere other than the configured cache dir.
    pub fn with_cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache = CacheDir::new(path);
        self
    }

    pub fn with_gc_grace(mut self, grace: Duration) -> Self {
        self.gc_grace = grace;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheDir {
        &self.cache
    }

    pub fn backend_override(&self) -> Option<BackendKind> {
        self.backend_override
    }

    pub fn set_backend_override(&mut self, kind: Option<BackendKind>) {
        self.backend_override = kind;
    }

    fn emit(&self, event: IndexEvent) {
        if let Some(hooks) = self.hooks {
            hooks.emit(&event);
        }
    }

    /// Configured order of every type.
    fn type_sorts(&self) -> BTreeMap<String, TypeSort> {
        self.config
            .types
            .iter()
            .map(|(name, ty)| (name.clone(), TypeSort::new(ty.sort, ty.direction)))
            .collect()
    }

    /// Backend for a generation of `item_count` items.
    pub fn select_backend(&self, item_count: usize) -> Result<BackendKind, IndexError> {
        let kind = match (self.backend_override, self.config.index.backend) {
            (Some(kind), _) => kind,
            (None, BackendChoice::Array) => BackendKind::Array,
            (None, BackendChoice::Sqlite) => BackendKind::Sqlite,
            (None, BackendChoice::Auto) => {
                if item_count >= self.config.index.sqlite_threshold
                    && BackendKind::Sqlite.is_available()
                {
                    BackendKind::Sqlite
                } else {
                    BackendKind::Array
                }
            }
        };
        if !kind.is_available() {
            return Err(BackendError::Unavailable(kind.name()).into());
        }
        Ok(kind)
    }

    /// Scan and route the corpus without writing anything.
    pub fn lint(&self) -> Result<LintReport, IndexError> {
        let mut out = scan::scan(&self.root, &self.config)?;
        let (_, route_issues) = routes::compile(&mut out.items, &self.config);
        let mut issues = out.issues;
        issues.extend(route_issues);
        Ok(LintReport {
            files_seen: out.files_seen,
            item_count: out.items.len(),
            issues,
        })
    }

    /// Fingerprint, scan and route the corpus into a snapshot.
    pub fn compile(&self) -> Result<Compiled, IndexError> {
        let fingerprint = fingerprint::compute(&self.root, &self.config);
        let mut out = scan::scan(&self.root, &self.config)?;
        let (routes, route_issues) = routes::compile(&mut out.items, &self.config);
        let mut issues = out.issues;
        issues.extend(route_issues);
        let snapshot = Snapshot::new(out.items, self.type_sorts(), routes, out.terms);
        Ok(Compiled {
            snapshot,
            fingerprint,
            issues,
            files_seen: out.files_seen,
        })
    }

    /// Write `compiled` as a new, not yet visible, generation.
    pub fn write_generation(&self, compiled: &Compiled) -> Result<PendingGeneration<'_, 'h>, IndexError> {
        let item_count = compiled.snapshot.items.len();
        let kind = self.select_backend(item_count)?;
        let codec = Codec::preferred(self.config.index.binary_codec);
        let backend = backend::create_backend(kind)?;

        let staging = self.cache.begin_generation()?;
        backend.write(&compiled.snapshot, staging.path(), codec)?;
        let generation = self.cache.publish(staging)?;
        log::debug!("wrote {item_count} items to {generation} ({kind}, {codec})");

        Ok(PendingGeneration {
            indexer: self,
            record: FingerprintRecord {
                format_version: FORMAT_VERSION,
                digest: compiled.fingerprint.digest.clone(),
                built_at: Utc::now(),
                generation,
                backend: kind.name().to_string(),
                codec: codec.name().to_string(),
                item_count,
            },
            backend: kind,
            codec,
        })
    }

    /// Build and commit a new generation.
    pub fn rebuild(&self) -> Result<RebuildReport, IndexError> {
        self.emit(IndexEvent::RebuildStarted {
            root: self.root.display().to_string(),
        });
        let result = self.rebuild_inner();
        if let Err(e) = &result {
            log::error!("rebuild of {} failed: {e}", self.root.display());
            self.emit(IndexEvent::RebuildFailed {
                error: e.to_string(),
            });
        }
        result
    }

    fn rebuild_inner(&self) -> Result<RebuildReport, IndexError> {
        let start = Instant::now();
        let compiled = self.compile()?;
        for issue in &compiled.issues {
            self.emit(IndexEvent::IssueRecorded(issue.clone()));
        }
        let pending = self.write_generation(&compiled)?;
        let (backend, codec) = (pending.backend, pending.codec);
        let (record, gc) = pending.commit()?;
        let elapsed = start.elapsed();
        log::info!(
            "rebuilt index: {} items, {} issue(s), {backend} backend, {:.1?}",
            record.item_count,
            compiled.issues.len(),
            elapsed
        );
        Ok(RebuildReport {
            generation: record.generation,
            backend,
            codec,
            digest: record.digest,
            item_count: record.item_count,
            files_seen: compiled.files_seen,
            issues: compiled.issues,
            gc,
            elapsed,
        })
    }

    /// Compare the committed generation with the corpus on disk.
    pub fn status(&self) -> Result<IndexStatus, IndexError> {
        let committed = self.cache.committed()?;
        let current = fingerprint::compute(&self.root, &self.config);
        let fresh = committed.as_ref().is_some_and(|r| r.matches(&current));
        Ok(IndexStatus {
            committed,
            current,
            fresh,
            generations: self.cache.generations()?,
        })
    }

    /// Open the committed generation.
    ///
    /// `Ok(None)` means there is nothing usable to read: no record, a record
    /// of another format, a missing generation directory, or files the
    /// backend rejects. Callers rebuild in every one of those cases.
    pub fn load_committed(&self) -> Result<Option<LoadedGeneration>, IndexError> {
        let Some(record) = self.cache.committed()? else {
            return Ok(None);
        };
        if !record.is_current_format() {
            log::info!(
                "cache format {} is not {FORMAT_VERSION}, ignoring it",
                record.format_version
            );
            return Ok(None);
        }
        let dir = self.cache.generation_path(&record.generation);
        let loaded = BackendKind::parse(&record.backend)
            .and_then(backend::create_backend)
            .and_then(|b| b.load(&dir));
        match loaded {
            Ok(handle) => Ok(Some(LoadedGeneration { record, handle })),
            Err(e) => {
                log::warn!("cannot load generation {}: {e}", record.generation);
                Ok(None)
            }
        }
    }
}

/// A written generation waiting for its commit marker.
///
/// Dropping it without [`commit`](PendingGeneration::commit) leaves the
/// previous generation committed; the orphaned directory is collected later.
#[derive(Debug)]
pub struct PendingGeneration<'a, 'h> {
    indexer: &'a Indexer<'h>,
    record: FingerprintRecord,
    backend: BackendKind,
    codec: Codec,
}

impl PendingGeneration<'_, '_> {
    pub fn generation(&self) -> &str {
        &self.record.generation
    }

    /// Make the generation visible, then collect old ones.
    pub fn commit(self) -> Result<(FingerprintRecord, GcStats), IndexError> {
        let cache = &self.indexer.cache;
        let previous = cache.committed()?.map(|r| r.generation);
        cache.commit_record(&self.record)?;
        self.indexer.emit(IndexEvent::GenerationCommitted {
            generation: self.record.generation.clone(),
            backend: self.record.backend.clone(),
            item_count: self.record.item_count,
        });

        let mut keep = vec![self.record.generation.as_str()];
        if let Some(prev) = previous.as_deref() {
            keep.push(prev);
        }
        let gc = match cache.collect_garbage(&keep, self.indexer.gc_grace) {
            Ok(stats) => stats,
            Err(e) => {
                log::warn!("cache garbage collection failed: {e}");
                GcStats::default()
            }
        };
        log::debug!("committed {}: {gc}", self.record.generation);
        Ok((self.record, gc))
    }
}
