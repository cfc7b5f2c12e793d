//! Shared helpers for the integration tests: site setup, corpus
//! generation, and repository construction.

#![allow(dead_code)]

use folio::backend::BackendKind;
use folio::config::{IndexMode, load_config};
use folio::indexer::Indexer;
use folio::repository::Repository;
use folio::types::{ItemMeta, Status};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// `folio.toml` used by every generated site.
pub const SITE_CONFIG: &str = r#"
[index]
mode = "never"

[types.post]
dir = "content/posts"
url = "/blog/{year}/{slug}/"
sort = "date"
direction = "desc"

[types.note]
dir = "content/notes"
url = "/notes/{slug}/"
sort = "title"
direction = "asc"

[types.page]
dir = "content/pages"
url = "/{path}/"
url_style = "hierarchical"
sort = "order"
direction = "asc"

[taxonomies.tags]
file = "content/taxonomies/tags.yaml"
"#;

/// An empty site with [`SITE_CONFIG`].
pub fn site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "folio.toml", SITE_CONFIG);
    write(
        tmp.path(),
        "content/taxonomies/tags.yaml",
        "- slug: rust\n  name: Rust\n- slug: web\n  name: Web\n",
    );
    tmp
}

/// Write a file below `root`, creating parents.
pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Frontmatter + body.
pub fn source(title: &str, status: Status, date: Option<&str>, tags: &[&str]) -> String {
    source_with(title, status, date, tags, "")
}

/// Frontmatter with extra raw YAML lines (custom fields) + body.
pub fn source_with(
    title: &str,
    status: Status,
    date: Option<&str>,
    tags: &[&str],
    extra: &str,
) -> String {
    let mut src = format!("---\ntitle: \"{title}\"\nstatus: {status}\n{extra}");
    if let Some(date) = date {
        src.push_str(&format!("date: {date}\n"));
    }
    if !tags.is_empty() {
        src.push_str(&format!("tags: [{}]\n", tags.join(", ")));
    }
    src.push_str(&format!("---\n\n{title} is about indexing.\n"));
    src
}

pub fn write_post(root: &Path, slug: &str, status: Status, date: Option<&str>) {
    write(
        root,
        &format!("content/posts/{slug}.md"),
        &source(&slug.to_uppercase(), status, date, &[]),
    );
}

/// A deterministic corpus of `n` posts, `n / 4` notes and a page tree.
///
/// Built to stress ordering: repeated dates, undated posts, titles that only
/// differ in case, every status, and overlapping tags.
pub fn generate_corpus(root: &Path, n: usize) {
    const WORDS: &[&str] = &["alpha", "Beta", "gamma", "delta", "Alpha", "omega"];
    for i in 0..n {
        let status = match i % 5 {
            0 | 1 | 2 => Status::Published,
            3 => Status::Draft,
            _ => Status::Unlisted,
        };
        let date = (i % 7 != 0).then(|| format!("2024-{:02}-{:02}", i % 12 + 1, i % 5 + 1));
        let mut tags = Vec::new();
        if i % 2 == 0 {
            tags.push("rust");
        }
        if i % 3 == 0 {
            tags.push("web");
        }
        if i % 11 == 0 {
            tags.push("misc");
        }
        let title = format!("{} {}", WORDS[i % WORDS.len()], i % 9);
        write(
            root,
            &format!("content/posts/post-{i:04}.md"),
            &source_with(&title, status, date.as_deref(), &tags, &custom_fields(i)),
        );
    }
    for i in 0..n / 4 {
        let title = WORDS[i % WORDS.len()];
        write(
            root,
            &format!("content/notes/note-{i:03}.md"),
            &source(title, Status::Published, None, &["web"]),
        );
    }
    write(root, "content/pages/010-about.md", &source("About", Status::Published, None, &[]));
    write(root, "content/pages/020-guide/index.md", &source("Guide", Status::Published, None, &[]));
    write(
        root,
        "content/pages/020-guide/010-start.md",
        &source("Start", Status::Published, None, &[]),
    );
    write(
        root,
        "content/pages/020-guide/020-next.md",
        &source("Next", Status::Draft, None, &[]),
    );
}

/// Custom frontmatter covering every field shape, including the YAML
/// spellings of infinity and NaN.
pub fn custom_fields(i: usize) -> String {
    let rating = match i % 6 {
        0 => ".inf".to_string(),
        1 => ".nan".to_string(),
        2 => "-.inf".to_string(),
        n => format!("{}.{}", n, i % 10),
    };
    format!(
        "featured: {}\nviews: {}\nrating: {rating}\nbig: 18446744073709551615\n\
         aliases: [old-{i}, {i}, {}]\n\
         seo:\n  description: Post {i}\n  weight: {}\n  extra: ~\n  nested: {{ score: 0.25 }}\n",
        i % 2 == 0,
        i * 17,
        i % 3 == 0,
        i % 4,
    )
}

/// A repository over `root` with the given mode and backend.
pub fn repo(root: &Path, mode: IndexMode, backend: Option<BackendKind>) -> Repository<'static> {
    let mut config = load_config(root).unwrap();
    config.index.mode = mode;
    let indexer = Indexer::new(root, config)
        .with_backend(backend)
        .with_gc_grace(Duration::ZERO);
    Repository::new(indexer)
}

/// A repository with its own cache directory, for side-by-side backends.
pub fn repo_in(root: &Path, cache: &Path, backend: BackendKind) -> Repository<'static> {
    repo_with_codec(root, cache, backend, true)
}

/// Like [`repo_in`], choosing between the binary and JSON blob codecs.
pub fn repo_with_codec(
    root: &Path,
    cache: &Path,
    backend: BackendKind,
    binary_codec: bool,
) -> Repository<'static> {
    let mut config = load_config(root).unwrap();
    config.index.binary_codec = binary_codec;
    let indexer = Indexer::new(root, config)
        .with_backend(Some(backend))
        .with_cache_dir(cache)
        .with_gc_grace(Duration::ZERO);
    Repository::new(indexer)
}

pub fn slugs(metas: &[ItemMeta]) -> Vec<String> {
    metas.iter().map(|m| m.slug.clone()).collect()
}

/// Backends compiled into this build.
pub fn backends() -> Vec<BackendKind> {
    BackendKind::ALL
        .into_iter()
        .filter(|k| k.is_available())
        .collect()
}
