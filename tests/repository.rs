//! End-to-end behavior of the read API over real site directories.

mod common;

use common::*;
use folio::backend::{BackendKind, RECENT_LIMIT};
use folio::config::IndexMode;
use folio::edit;
use folio::indexer::Indexer;
use folio::query::Query;
use folio::types::{FieldValue, SortDirection, SortField, Status};
use std::fs::File;
use std::time::{Duration, SystemTime};

/// Posts `a` (published, 2024-01-01), `b` (draft, 2024-01-02) and `c`
/// (published, 2024-01-03).
fn worked_example() -> tempfile::TempDir {
    let tmp = site();
    write_post(tmp.path(), "a", Status::Published, Some("2024-01-01"));
    write_post(tmp.path(), "b", Status::Draft, Some("2024-01-02"));
    write_post(tmp.path(), "c", Status::Published, Some("2024-01-03"));
    tmp
}

// =========================================================================
// Worked example, on every backend
// =========================================================================

#[test]
fn worked_example_counts_and_default_query() {
    let tmp = worked_example();
    for backend in backends() {
        let repo = repo(tmp.path(), IndexMode::Never, Some(backend));
        assert_eq!(repo.count("post", None).unwrap(), 3, "{backend}");
        assert_eq!(repo.count("post", Some(Status::Published)).unwrap(), 2);

        let page = Query::new().item_type("post").fetch(&repo).unwrap();
        assert_eq!(slugs(&page.items), vec!["c", "a"], "{backend}");
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages, 1);

        let with_drafts = Query::new()
            .item_type("post")
            .include_drafts()
            .fetch(&repo)
            .unwrap();
        assert_eq!(slugs(&with_drafts.items), vec!["c", "b", "a"]);
    }
}

#[test]
fn all_meta_has_every_status_recent_only_published() {
    let tmp = worked_example();
    let repo = repo(tmp.path(), IndexMode::Never, None);
    assert_eq!(slugs(&repo.all_meta("post").unwrap()), vec!["c", "b", "a"]);
    assert_eq!(slugs(&repo.recent_meta("post", 10).unwrap()), vec!["c", "a"]);
}

// =========================================================================
// Round trip
// =========================================================================

#[test]
fn scanned_fields_survive_the_cache() {
    let tmp = site();
    write(
        tmp.path(),
        "content/posts/010-full.md",
        "---\n\
         title: Full Post\n\
         status: published\n\
         date: 2024-03-04T05:06:07Z\n\
         updated: 2024-03-05\n\
         excerpt: Short version.\n\
         tags: [Rust, Web Dev]\n\
         rating: 4.5\n\
         draft_notes: [one, two]\n\
         ---\n\
         \n\
         Long version of the post.\n",
    );
    for backend in backends() {
        let repo = repo(tmp.path(), IndexMode::Never, Some(backend));
        let item = repo.get("post", "full").unwrap().unwrap();
        let meta = &item.meta;
        assert_eq!(meta.id, "post/full");
        assert_eq!(meta.title, "Full Post");
        assert_eq!(meta.status, Status::Published);
        assert_eq!(meta.date.unwrap().to_string(), "2024-03-04 05:06:07");
        assert_eq!(meta.updated.unwrap().to_string(), "2024-03-05 00:00:00");
        assert_eq!(meta.excerpt, "Short version.");
        assert_eq!(meta.order, 10);
        assert_eq!(meta.terms["tags"], vec!["rust", "web-dev"]);
        assert_eq!(meta.fields["rating"], FieldValue::Float(4.5));
        assert_eq!(
            meta.fields["draft_notes"],
            FieldValue::List(vec![
                FieldValue::Text("one".into()),
                FieldValue::Text("two".into())
            ])
        );
        assert_eq!(meta.path, "content/posts/010-full.md");
        assert_eq!(meta.url.as_deref(), Some("/blog/2024/full/"));
        assert!(item.body.contains("Long version of the post."));
    }
}

#[test]
fn missing_status_defaults_to_draft() {
    let tmp = site();
    write(tmp.path(), "content/posts/x.md", "---\ntitle: X\n---\nbody\n");
    write(
        tmp.path(),
        "content/posts/y.md",
        "---\ntitle: Y\nstatus: archived\n---\nbody\n",
    );
    let repo = repo(tmp.path(), IndexMode::Never, None);
    assert_eq!(repo.count("post", Some(Status::Draft)).unwrap(), 2);
}

// =========================================================================
// Idempotence and freshness
// =========================================================================

#[test]
fn rebuilding_unchanged_content_is_idempotent() {
    let tmp = site();
    generate_corpus(tmp.path(), 20);
    for backend in backends() {
        let indexer = Indexer::open(tmp.path())
            .unwrap()
            .with_backend(Some(backend));
        let first = indexer.rebuild().unwrap();
        let snapshot_one = indexer
            .load_committed()
            .unwrap()
            .unwrap()
            .handle
            .all_raw()
            .unwrap();
        let second = indexer.rebuild().unwrap();
        let snapshot_two = indexer
            .load_committed()
            .unwrap()
            .unwrap()
            .handle
            .all_raw()
            .unwrap();

        assert_eq!(first.digest, second.digest);
        assert_eq!(first.issues, second.issues);
        assert_eq!(snapshot_one, snapshot_two);
    }
}

#[test]
fn mtime_change_makes_auto_mode_rebuild() {
    let tmp = worked_example();
    let repo = repo(tmp.path(), IndexMode::Auto, None);
    assert_eq!(repo.get("post", "a").unwrap().unwrap().meta.title, "A");

    // Same size, different content: only the mtime tells them apart
    let path = tmp.path().join("content/posts/a.md");
    let content = std::fs::read_to_string(&path)
        .unwrap()
        .replace("title: \"A\"", "title: \"Z\"");
    std::fs::write(&path, content).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();

    let fresh = common::repo(tmp.path(), IndexMode::Auto, None);
    assert_eq!(fresh.get("post", "a").unwrap().unwrap().meta.title, "Z");
}

#[test]
fn deleted_file_disappears_in_auto_mode() {
    let tmp = worked_example();
    repo(tmp.path(), IndexMode::Auto, None).count("post", None).unwrap();
    std::fs::remove_file(tmp.path().join("content/posts/b.md")).unwrap();
    let repo = repo(tmp.path(), IndexMode::Auto, None);
    assert_eq!(repo.count("post", None).unwrap(), 2);
    assert!(repo.get("post", "b").unwrap().is_none());
}

// =========================================================================
// Recent cache
// =========================================================================

#[test]
fn recent_meta_is_bounded_and_matches_all_meta() {
    let tmp = site();
    for i in 0..(RECENT_LIMIT + 30) {
        write_post(
            tmp.path(),
            &format!("p{i:04}"),
            Status::Published,
            Some(&format!("2023-{:02}-{:02}", i % 12 + 1, i % 28 + 1)),
        );
    }
    for backend in backends() {
        let repo = repo(tmp.path(), IndexMode::Never, Some(backend));
        let recent = repo.recent_meta("post", 1000).unwrap();
        assert_eq!(recent.len(), RECENT_LIMIT);
        let all = repo.all_meta("post").unwrap();
        assert_eq!(recent, all[..RECENT_LIMIT].to_vec(), "{backend}");
        assert_eq!(repo.recent_meta("post", 5).unwrap(), all[..5].to_vec());
    }
}

// =========================================================================
// Taxonomies, routes, queries
// =========================================================================

#[test]
fn term_membership_is_published_only() {
    let tmp = site();
    generate_corpus(tmp.path(), 20);
    let repo = repo(tmp.path(), IndexMode::Never, None);
    let terms = repo.terms("tags").unwrap();
    let rust = terms.iter().find(|t| t.slug == "rust").unwrap();
    assert_eq!(rust.name, "Rust");
    for member in &rust.items {
        let item = repo.get(&member.item_type, &member.slug).unwrap().unwrap();
        assert!(item.meta.is_published());
        assert!(item.meta.terms_for("tags").contains(&"rust".to_string()));
    }
    // Referenced but not defined in tags.yaml
    assert!(terms.iter().any(|t| t.slug == "misc"));
}

#[test]
fn term_members_name_their_type() {
    let tmp = site();
    write(
        tmp.path(),
        "content/posts/shared.md",
        &source("Shared Post", Status::Published, Some("2024-01-01"), &["rust"]),
    );
    write(
        tmp.path(),
        "content/pages/shared.md",
        &source("Shared Page", Status::Published, None, &["rust"]),
    );
    for backend in backends() {
        let repo = repo(tmp.path(), IndexMode::Never, Some(backend));
        let terms = repo.terms("tags").unwrap();
        let rust = terms.iter().find(|t| t.slug == "rust").unwrap();
        let members: Vec<String> = rust.items.iter().map(ToString::to_string).collect();
        assert_eq!(members, vec!["page/shared", "post/shared"], "{backend}");
    }
}

#[test]
fn route_collisions_keep_both_items() {
    let tmp = site();
    write(
        tmp.path(),
        "content/pages/notes/dup.md",
        &source("Page Dup", Status::Published, None, &[]),
    );
    write(
        tmp.path(),
        "content/notes/dup.md",
        &source("Note Dup", Status::Published, None, &[]),
    );
    let report = Indexer::open(tmp.path()).unwrap().lint().unwrap();
    assert!(report.issues.iter().any(|i| i.kind() == "route-collision"));

    let repo = repo(tmp.path(), IndexMode::Never, None);
    assert!(repo.get("note", "dup").unwrap().is_some());
    assert!(repo.get("page", "notes/dup").unwrap().is_some());
    let routes = repo.routes().unwrap();
    let owner = routes.resolve("/notes/dup/").unwrap();
    assert_eq!(owner.item_type, "note");
    assert_eq!(routes.collisions["/notes/dup/"].len(), 2);
}

#[test]
fn hierarchical_pages_route_by_path() {
    let tmp = site();
    generate_corpus(tmp.path(), 4);
    let repo = repo(tmp.path(), IndexMode::Never, None);
    let routes = repo.routes().unwrap();
    assert_eq!(routes.resolve("/guide/").unwrap().slug, "guide");
    assert_eq!(routes.resolve("/guide/start/").unwrap().slug, "guide/start");
    // index.md carries no prefix of its own, so it sorts at order 0
    let pages = repo.all_meta("page").unwrap();
    assert_eq!(slugs(&pages), vec!["guide", "about", "guide/start", "guide/next"]);
}

#[test]
fn query_ties_break_on_slug() {
    let tmp = site();
    for slug in ["m", "k", "z", "a"] {
        write_post(tmp.path(), slug, Status::Published, Some("2024-05-05"));
    }
    let repo = repo(tmp.path(), IndexMode::Never, None);
    for direction in [SortDirection::Asc, SortDirection::Desc] {
        let page = Query::new()
            .item_type("post")
            .order_by(SortField::Date, direction)
            .per_page(2)
            .fetch(&repo)
            .unwrap();
        assert_eq!(slugs(&page.items), vec!["a", "k"]);
    }
}

#[test]
fn get_by_path_only_resolves_indexed_files() {
    let tmp = worked_example();
    let repo = repo(tmp.path(), IndexMode::Never, None);
    assert!(repo.get_by_path("content/posts/a.md").unwrap().is_some());

    write_post(tmp.path(), "later", Status::Published, Some("2024-02-02"));
    assert!(repo.get_by_path("content/posts/later.md").unwrap().is_none());
}

// =========================================================================
// Editing
// =========================================================================

#[test]
fn edit_then_rebuild_shows_new_content() {
    let tmp = worked_example();
    let path = tmp.path().join("content/posts/c.md");
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(30))
        .unwrap();

    let session = edit::open_for_edit(&path).unwrap();
    let updated = session.content.replace("status: published", "status: draft");
    edit::save(&path, session.mtime, &updated).unwrap();

    // A second editor still holding the old token is refused
    assert!(matches!(
        edit::save(&path, session.mtime, "clobber"),
        Err(edit::EditError::Conflict { .. })
    ));

    let repo = repo(tmp.path(), IndexMode::Auto, Some(BackendKind::Array));
    assert_eq!(repo.count("post", Some(Status::Published)).unwrap(), 1);
}

// =========================================================================
// Hooks
// =========================================================================

#[test]
fn hooks_see_issues_and_the_commit() {
    use folio::hooks::{HookRegistry, IndexEvent};
    use folio::repository::Repository;
    use std::sync::{Arc, Mutex};

    let tmp = worked_example();
    write(tmp.path(), "content/posts/bad.md", "---\ntitle: [unclosed\n---\n");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut hooks = HookRegistry::new();
    let sink = Arc::clone(&seen);
    hooks.on(move |event| {
        let label = match event {
            IndexEvent::RebuildStarted { .. } => "started".to_string(),
            IndexEvent::IssueRecorded(issue) => issue.kind().to_string(),
            IndexEvent::GenerationCommitted { item_count, .. } => format!("committed {item_count}"),
            IndexEvent::RebuildFailed { .. } => "failed".to_string(),
        };
        sink.lock().unwrap().push(label);
    });

    let repo = Repository::with_hooks(tmp.path(), &hooks).unwrap();
    assert_eq!(repo.count("post", None).unwrap(), 3);
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["started", "parse", "committed 3"]
    );
}
