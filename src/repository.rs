//! Read API over the committed index.
//!
//! A [`Repository`] acquires a backend handle on first use and keeps it for
//! its own lifetime. How the handle is acquired depends on `index.mode`:
//!
//! | Mode | On first read | Later reads |
//! |------|---------------|-------------|
//! | `never` | load the committed generation; rebuild only if there is none | cached handle |
//! | `auto` | recompute the fingerprint; rebuild if it differs from the record | cached handle |
//! | `always` | full rebuild | full rebuild again, nothing cached |
//!
//! `always` exists for debugging the indexer. Every read pays for a complete
//! scan and write of the corpus, and each one logs a warning saying so.
//!
//! A repository is meant to live as long as one request. Long-lived
//! processes call [`Repository::clear_cache`] to pick up new generations.

use crate::backend::{BackendError, BackendKind, IndexHandle, Listing, ListingRequest, RECENT_LIMIT};
use crate::config::{IndexMode, SiteConfig};
use crate::fingerprint;
use crate::hooks::HookRegistry;
use crate::indexer::{IndexError, Indexer};
use crate::ordering::TypeSort;
use crate::query::{Page, Query};
use crate::scan::relative_path;
use crate::types::{Item, ItemMeta, RouteTable, Status, Term};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("index read error: {0}")]
    Backend(#[from] BackendError),
    #[error("no usable index generation after rebuilding {0}")]
    MissingCache(PathBuf),
}

/// Read access to one site's index.
pub struct Repository<'h> {
    indexer: Indexer<'h>,
    handle: Mutex<Option<Arc<dyn IndexHandle>>>,
}

impl<'h> Repository<'h> {
    pub fn new(indexer: Indexer<'h>) -> Self {
        Self {
            indexer,
            handle: Mutex::new(None),
        }
    }

    /// Load `folio.toml` from `root` and open a repository for it.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        Ok(Self::new(Indexer::open(root)?))
    }

    pub fn with_hooks(root: impl Into<PathBuf>, hooks: &'h HookRegistry) -> Result<Self, RepositoryError> {
        Ok(Self::new(Indexer::open(root)?.with_hooks(hooks)))
    }

    pub fn config(&self) -> &SiteConfig {
        self.indexer.config()
    }

    pub fn indexer(&self) -> &Indexer<'h> {
        &self.indexer
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<dyn IndexHandle>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The backend handle, acquired according to the index mode.
    pub fn handle(&self) -> Result<Arc<dyn IndexHandle>, RepositoryError> {
        let mode = self.config().index.mode;
        if mode == IndexMode::Always {
            log::warn!(
                "index.mode = \"always\": rebuilding {} on every read",
                self.indexer.root().display()
            );
            return self.rebuild_and_load();
        }

        let mut slot = self.slot();
        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }
        let handle = match self.indexer.load_committed()? {
            Some(loaded) if self.is_usable(mode, &loaded.record) => Arc::from(loaded.handle),
            _ => self.rebuild_and_load()?,
        };
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    fn is_usable(&self, mode: IndexMode, record: &fingerprint::FingerprintRecord) -> bool {
        if let Some(kind) = self.indexer.backend_override()
            && record.backend != kind.name()
        {
            log::info!(
                "generation {} was written by {}, {kind} requested",
                record.generation,
                record.backend
            );
            return false;
        }
        match mode {
            IndexMode::Never => true,
            IndexMode::Auto => {
                fingerprint::is_fresh(self.indexer.root(), self.indexer.config(), record)
            }
            IndexMode::Always => false,
        }
    }

    fn rebuild_and_load(&self) -> Result<Arc<dyn IndexHandle>, RepositoryError> {
        self.indexer.rebuild()?;
        match self.indexer.load_committed()? {
            Some(loaded) => Ok(Arc::from(loaded.handle)),
            None => Err(RepositoryError::MissingCache(
                self.indexer.cache().path().to_path_buf(),
            )),
        }
    }

    /// Drop the cached handle; the next read acquires a fresh one.
    pub fn clear_cache(&self) {
        *self.slot() = None;
    }

    /// Force the backend used for rebuilds. A committed generation written
    /// by another backend is rebuilt on the next read.
    pub fn set_backend_override(&mut self, kind: Option<BackendKind>) {
        self.indexer.set_backend_override(kind);
        self.clear_cache();
    }

    pub fn backend_name(&self) -> Result<&'static str, RepositoryError> {
        Ok(self.handle()?.backend_name())
    }

    /// Configured content type names.
    pub fn types(&self) -> Vec<String> {
        self.config().types.keys().cloned().collect()
    }

    /// Configured taxonomy names.
    pub fn taxonomies(&self) -> Vec<String> {
        self.config().taxonomies.keys().cloned().collect()
    }

    /// Configured order of a type; date descending when untyped or unknown.
    pub fn default_sort(&self, item_type: Option<&str>) -> TypeSort {
        item_type
            .and_then(|t| self.config().type_config(t))
            .map(|ty| TypeSort::new(ty.sort, ty.direction))
            .unwrap_or_default()
    }

    pub fn count(&self, item_type: &str, status: Option<Status>) -> Result<usize, RepositoryError> {
        Ok(self.handle()?.count(item_type, status)?)
    }

    /// Full item, body included.
    pub fn get(&self, item_type: &str, slug: &str) -> Result<Option<Item>, RepositoryError> {
        Ok(self.handle()?.get_by_slug(item_type, slug)?)
    }

    /// The item parsed from `path`, absolute or relative to the site root.
    ///
    /// Only indexed files resolve: a file that exists on disk but failed to
    /// parse, or was added after the last rebuild, returns `None`.
    pub fn get_by_path(&self, path: impl AsRef<Path>) -> Result<Option<Item>, RepositoryError> {
        let rel = relative_path(self.indexer.root(), path.as_ref());
        Ok(self.handle()?.get_by_path(&rel)?)
    }

    /// Every item of a type, any status, in the type's order. No bodies.
    pub fn all_meta(&self, item_type: &str) -> Result<Vec<ItemMeta>, RepositoryError> {
        Ok(self.handle()?.all_meta(item_type)?)
    }

    /// The first `min(n, 200)` published items of a type, in its order.
    pub fn recent_meta(&self, item_type: &str, n: usize) -> Result<Vec<ItemMeta>, RepositoryError> {
        Ok(self.handle()?.recent_meta(item_type, n))
    }

    /// The newest `min(n, 200)` published items across all types.
    pub fn recent(&self, n: usize) -> Result<Vec<ItemMeta>, RepositoryError> {
        let request = ListingRequest {
            item_type: None,
            statuses: vec![Status::Published],
            sort: TypeSort::default(),
            search: Vec::new(),
            term: None,
            offset: 0,
            limit: Some(n.min(RECENT_LIMIT)),
        };
        Ok(self.list(&request)?.items)
    }

    pub fn terms(&self, taxonomy: &str) -> Result<Vec<Term>, RepositoryError> {
        Ok(self.handle()?.terms(taxonomy))
    }

    pub fn routes(&self) -> Result<RouteTable, RepositoryError> {
        Ok(self.handle()?.routes().clone())
    }

    /// Every item with its body, in (type, slug) order.
    pub fn all_raw(&self) -> Result<Vec<Item>, RepositoryError> {
        Ok(self.handle()?.all_raw()?)
    }

    pub fn list(&self, request: &ListingRequest) -> Result<Listing, RepositoryError> {
        Ok(self.handle()?.list(request)?)
    }

    pub fn query(&self, query: &Query) -> Result<Page, RepositoryError> {
        query.fetch(self)
    }
}

impl std::fmt::Debug for Repository<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("indexer", &self.indexer)
            .field("loaded", &self.slot().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use crate::test_helpers::*;
    use std::time::Duration;

    fn repo_with_mode(root: &Path, mode: IndexMode) -> Repository<'static> {
        let mut config = load_config(root).unwrap();
        config.index.mode = mode;
        Repository::new(Indexer::new(root, config).with_gc_grace(Duration::ZERO))
    }

    fn committed_generation(repo: &Repository<'_>) -> String {
        repo.indexer()
            .cache()
            .committed()
            .unwrap()
            .unwrap()
            .generation
    }

    // =========================================================================
    // Handle acquisition
    // =========================================================================

    #[test]
    fn first_read_builds_missing_cache() {
        let tmp = setup_fixtures();
        let repo = repo_with_mode(tmp.path(), IndexMode::Never);
        assert!(repo.indexer().cache().committed().unwrap().is_none());
        assert!(repo.count("post", None).unwrap() > 0);
        assert!(repo.indexer().cache().committed().unwrap().is_some());
    }

    #[test]
    fn never_mode_trusts_stale_cache() {
        let tmp = setup_fixtures();
        let repo = repo_with_mode(tmp.path(), IndexMode::Never);
        let before = repo.count("post", None).unwrap();

        write_post(
            tmp.path(),
            "fresh.md",
            &post_source("Fresh", Status::Published, Some("2024-06-01")),
        );
        let repo = repo_with_mode(tmp.path(), IndexMode::Never);
        assert_eq!(repo.count("post", None).unwrap(), before);
    }

    #[test]
    fn auto_mode_rebuilds_when_stale() {
        let tmp = setup_fixtures();
        let repo = repo_with_mode(tmp.path(), IndexMode::Auto);
        let before = repo.count("post", None).unwrap();
        let generation = committed_generation(&repo);

        // Unchanged corpus: the committed generation is reused
        let repo = repo_with_mode(tmp.path(), IndexMode::Auto);
        assert_eq!(repo.count("post", None).unwrap(), before);
        assert_eq!(committed_generation(&repo), generation);

        write_post(
            tmp.path(),
            "fresh.md",
            &post_source("Fresh", Status::Published, Some("2024-06-01")),
        );
        let repo = repo_with_mode(tmp.path(), IndexMode::Auto);
        assert_eq!(repo.count("post", None).unwrap(), before + 1);
        assert_ne!(committed_generation(&repo), generation);
    }

    #[test]
    fn handle_is_cached_until_cleared() {
        let tmp = setup_fixtures();
        let repo = repo_with_mode(tmp.path(), IndexMode::Auto);
        let before = repo.count("post", None).unwrap();

        write_post(
            tmp.path(),
            "fresh.md",
            &post_source("Fresh", Status::Published, Some("2024-06-01")),
        );
        assert_eq!(repo.count("post", None).unwrap(), before);
        repo.clear_cache();
        assert_eq!(repo.count("post", None).unwrap(), before + 1);
    }

    #[test]
    fn always_mode_rebuilds_every_read() {
        let tmp = setup_fixtures();
        let repo = repo_with_mode(tmp.path(), IndexMode::Always);
        repo.count("post", None).unwrap();
        let first = committed_generation(&repo);
        repo.count("post", None).unwrap();
        assert_ne!(committed_generation(&repo), first);
    }

    #[test]
    fn backend_override_forces_rebuild() {
        let tmp = setup_fixtures();
        let mut repo = repo_with_mode(tmp.path(), IndexMode::Never);
        repo.set_backend_override(Some(BackendKind::Array));
        assert_eq!(repo.backend_name().unwrap(), "array");
        let generation = committed_generation(&repo);

        if cfg!(feature = "sqlite") {
            repo.set_backend_override(Some(BackendKind::Sqlite));
            assert_eq!(repo.backend_name().unwrap(), "sqlite");
            assert_ne!(committed_generation(&repo), generation);
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    #[test]
    fn get_returns_body_and_fields() {
        let tmp = setup_fixtures();
        let repo = repo_with_mode(tmp.path(), IndexMode::Never);
        let post = repo.get("post", "hello-world").unwrap().unwrap();
        assert_eq!(post.meta.title, "Hello World");
        assert!(!post.body.is_empty());
        assert!(repo.get("post", "no-such-post").unwrap().is_none());
    }

    #[test]
    fn get_by_path_accepts_absolute_and_relative() {
        let tmp = setup_fixtures();
        let repo = repo_with_mode(tmp.path(), IndexMode::Never);
        let rel = repo
            .get_by_path("content/posts/hello-world.md")
            .unwrap()
            .unwrap();
        let abs = repo
            .get_by_path(tmp.path().join("content/posts/hello-world.md"))
            .unwrap()
            .unwrap();
        assert_eq!(rel, abs);
        // On disk but failed to parse
        assert!(repo.get_by_path("content/posts/broken.md").unwrap().is_none());
    }

    #[test]
    fn recent_merges_types_by_date() {
        let tmp = setup_fixtures();
        let repo = repo_with_mode(tmp.path(), IndexMode::Never);
        let recent = repo.recent(2).unwrap();
        assert_eq!(slugs(&recent), vec!["second-post", "hello-world"]);
        assert!(recent.iter().all(|m| m.is_published()));
    }

    #[test]
    fn types_and_taxonomies_come_from_config() {
        let tmp = setup_fixtures();
        let repo = repo_with_mode(tmp.path(), IndexMode::Never);
        assert_eq!(repo.types(), vec!["page", "post"]);
        assert_eq!(repo.taxonomies(), vec!["tags"]);
    }
}
