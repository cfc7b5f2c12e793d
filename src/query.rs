//! Fluent listing queries.
//!
//! ```rust,no_run
//! use folio::query::Query;
//! use folio::repository::Repository;
//! use folio::types::{SortDirection, SortField};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = Repository::open("site")?;
//! let page = Query::new()
//!     .item_type("post")
//!     .order_by(SortField::Title, SortDirection::Asc)
//!     .term("tags", "rust")
//!     .page(2)
//!     .fetch(&repo)?;
//! println!("{} of {} posts", page.items.len(), page.total);
//! # Ok(())
//! # }
//! ```
//!
//! Defaults: published items only, the type's configured order (date
//! descending when no type is set), 10 per page. Ties always break on slug,
//! so page boundaries are stable across calls and backends.
//!
//! `search` is a substring scan over title, excerpt and body, linear in the
//! size of the matched type. It is not a search index.

use crate::backend::{ListingRequest, search_tokens};
use crate::ordering::TypeSort;
use crate::repository::{Repository, RepositoryError};
use crate::types::{ItemMeta, SortDirection, SortField, Status};
use serde::Serialize;

pub const DEFAULT_PER_PAGE: usize = 10;

/// A listing query. Build it, then [`fetch`](Query::fetch) or
/// [`count`](Query::count) against a repository.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    item_type: Option<String>,
    sort: Option<TypeSort>,
    page: usize,
    per_page: usize,
    search: Vec<String>,
    term: Option<(String, String)>,
    statuses: Vec<Status>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            item_type: None,
            sort: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            search: Vec::new(),
            term: None,
            statuses: vec![Status::Published],
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub items: Vec<ItemMeta>,
    /// Matches across all pages.
    pub total: usize,
    /// 1-based.
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

impl Page {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item_type(mut self, item_type: &str) -> Self {
        self.item_type = Some(item_type.to_string());
        self
    }

    pub fn order_by(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort = Some(TypeSort::new(field, direction));
        self
    }

    /// 1-based page number; 0 is treated as 1.
    pub fn page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Keep items whose title, excerpt or body contain every whitespace
    /// separated token of `phrase`, case-insensitively.
    pub fn search(mut self, phrase: &str) -> Self {
        self.search = search_tokens(phrase);
        self
    }

    /// Keep items tagged with `term` in `taxonomy`.
    pub fn term(mut self, taxonomy: &str, term: &str) -> Self {
        self.term = Some((taxonomy.to_string(), term.to_string()));
        self
    }

    /// Published and draft items.
    pub fn include_drafts(mut self) -> Self {
        self.statuses = vec![Status::Published, Status::Draft];
        self
    }

    pub fn with_statuses(mut self, statuses: &[Status]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn any_status(mut self) -> Self {
        self.statuses.clear();
        self
    }

    /// The backend request for this query, with `sort` as the fallback order.
    pub(crate) fn to_request(&self, fallback: TypeSort) -> ListingRequest {
        ListingRequest {
            item_type: self.item_type.clone(),
            statuses: self.statuses.clone(),
            sort: self.sort.unwrap_or(fallback),
            search: self.search.clone(),
            term: self.term.clone(),
            offset: (self.page - 1).saturating_mul(self.per_page),
            limit: Some(self.per_page),
        }
    }

    pub fn fetch(&self, repo: &Repository<'_>) -> Result<Page, RepositoryError> {
        let listing = repo.list(&self.to_request(repo.default_sort(self.item_type.as_deref())))?;
        Ok(Page {
            items: listing.items,
            total: listing.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: listing.total.div_ceil(self.per_page),
        })
    }

    /// Number of matches, ignoring pagination.
    pub fn count(&self, repo: &Repository<'_>) -> Result<usize, RepositoryError> {
        let mut request = self.to_request(repo.default_sort(self.item_type.as_deref()));
        request.offset = 0;
        request.limit = Some(0);
        Ok(repo.list(&request)?.total)
    }
}
