//! Shared test utilities for the folio test suite.
//!
//! Provides fixture setup, content-file writers, item constructors, and
//! lookup helpers that panic with a useful message on a miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let config = crate::config::load_config(tmp.path()).unwrap();
//! let out = crate::scan::scan(tmp.path(), &config).unwrap();
//!
//! let post = find_item(&out.items, "post", "hello-world");
//! assert_eq!(post.meta.title, "Hello World");
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::metadata::parse_date;
use crate::types::{Item, ItemMeta, Status};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Content writers
// =========================================================================

/// Write a file below the stock post directory, creating parents.
pub fn write_post(root: &Path, rel: &str, content: &str) {
    write_content(root, &format!("content/posts/{rel}"), content);
}

/// Write a file anywhere below the site root, creating parents.
pub fn write_content(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Frontmatter + body for a post.
pub fn post_source(title: &str, status: Status, date: Option<&str>) -> String {
    let mut src = format!("---\ntitle: {title}\nstatus: {status}\n");
    if let Some(date) = date {
        src.push_str(&format!("date: {date}\n"));
    }
    src.push_str(&format!("---\n\n{title} body text.\n"));
    src
}

// =========================================================================
// Item construction
// =========================================================================

/// A minimal item without touching the filesystem.
pub fn item(item_type: &str, slug: &str, status: Status, date: Option<&str>) -> Item {
    Item {
        meta: ItemMeta {
            id: format!("{item_type}/{slug}"),
            item_type: item_type.to_string(),
            slug: slug.to_string(),
            title: slug.to_uppercase(),
            status,
            date: date.map(|d| parse_date(d).unwrap()),
            updated: None,
            excerpt: format!("About {slug}"),
            terms: Default::default(),
            fields: Default::default(),
            order: 0,
            path: format!("content/{item_type}s/{slug}.md"),
            url: None,
        },
        body: format!("Body of {slug}."),
    }
}

// =========================================================================
// Lookups: panic with a clear message on miss
// =========================================================================

/// Find an item by type and slug. Panics if not found.
pub fn find_item<'a>(items: &'a [Item], item_type: &str, slug: &str) -> &'a Item {
    items
        .iter()
        .find(|i| i.meta.item_type == item_type && i.meta.slug == slug)
        .unwrap_or_else(|| {
            let keys: Vec<String> = items
                .iter()
                .map(|i| format!("{}/{}", i.meta.item_type, i.meta.slug))
                .collect();
            panic!("item '{item_type}/{slug}' not found. Available: {keys:?}")
        })
}

/// Slugs of a metadata listing, in order.
pub fn slugs(metas: &[ItemMeta]) -> Vec<&str> {
    metas.iter().map(|m| m.slug.as_str()).collect()
}
