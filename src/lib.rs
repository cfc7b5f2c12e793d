//! # Folio
//!
//! The content indexing and caching engine of a flat-file CMS. Content lives
//! as Markdown files with YAML frontmatter; folio scans them into a compact,
//! queryable snapshot, persists it with one of two storage backends, and
//! decides cheaply when that snapshot is stale. There is no server process
//! and no database to run.
//!
//! # Architecture: Build Once, Read Many
//!
//! ```text
//! content/ ──scan──▶ items ──routes──▶ snapshot ──backend──▶ .folio-cache/gen-*/
//!                                                                 │
//!          fingerprint(path, mtime, size) ──────────▶ fingerprint.json (commit)
//!                                                                 │
//!                                   Repository ◀──load── handle ◀─┘
//!                                        │
//!                                      Query
//! ```
//!
//! A rebuild produces a whole new generation and commits it by replacing
//! `fingerprint.json` last. Readers only ever follow that file, so they see
//! either the old generation or the new one, never a mix.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Walks content directories, parses files into items and terms, collects issues |
//! | [`frontmatter`] | Splits a file into its YAML block and Markdown body |
//! | [`metadata`] | Dates, excerpts, first-available value resolution |
//! | [`naming`] | `NNN-name` filename convention and slugs |
//! | [`taxonomy`] | Term definition files and term membership |
//! | [`routes`] | URL patterns, the route table, collision detection |
//! | [`ordering`] | The one comparator every listing uses |
//! | [`fingerprint`] | Corpus digest and the commit record |
//! | [`cache`] | Generation directories, atomic commit, garbage collection |
//! | [`backend`] | Array and SQLite storage behind one handle trait; blob codecs |
//! | [`indexer`] | Orchestrates scan → routes → write → commit; read-only lint |
//! | [`repository`] | Read API with `never` / `auto` / `always` freshness modes |
//! | [`query`] | Fluent filter, sort, paginate and search builder |
//! | [`edit`] | Locked, conflict-checked single-file saves |
//! | [`hooks`] | Explicit event registry passed to the indexer |
//! | [`benchmark`] | Backend timing and equivalence probes |
//! | [`config`] | `folio.toml` loading, stock defaults, validation |
//! | [`types`] | Items, terms, routes and issues shared by every module |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | flexi_logger setup for the binary |
//!
//! # Design Decisions
//!
//! ## Two Backends, One Answer
//!
//! Small sites load one blob into memory and answer everything from vectors
//! and maps. Large sites keep items in SQLite and only pay for the rows a
//! listing touches. `backend = "auto"` switches at `sqlite_threshold` items.
//! Both backends order with the comparator in [`ordering`] (SQLite through an
//! `ORDER BY` that mirrors it key by key) and share the same projection
//! blobs, so switching backends never changes a page of results.
//!
//! ## Fingerprint, Not Watchers
//!
//! Freshness is a hash over the path, mtime and size of every content and
//! config file. Recomputing it is one `stat` per file, cheap enough to run on
//! every request in development (`auto`) and skipped entirely in production
//! (`never`).
//!
//! ## Issues Are Data
//!
//! A malformed file, a duplicate slug or two items claiming one URL never
//! abort a rebuild. They become [`types::IndexIssue`] values: `lint` returns
//! them, `rebuild` reports them, hooks receive them.
//!
//! ## Published Only by Default
//!
//! Listings and queries return published items unless the caller opts in to
//! drafts. Ties in any ordering break on slug, then type, so pagination is
//! deterministic.

pub mod backend;
pub mod benchmark;
pub mod cache;
pub mod config;
pub mod edit;
pub mod fingerprint;
pub mod frontmatter;
pub mod hooks;
pub mod indexer;
pub mod logging;
pub mod metadata;
pub mod naming;
pub mod ordering;
pub mod output;
pub mod query;
pub mod repository;
pub mod routes;
pub mod scan;
pub mod taxonomy;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
