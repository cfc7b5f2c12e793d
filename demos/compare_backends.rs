//! Side-by-side timing of the array and SQLite backends on a synthetic site.
//!
//! Generates a corpus of the requested size in a temporary directory,
//! builds it with every available backend, and prints the benchmark table
//! together with the equivalence check.
//!
//! ```sh
//! cargo run --release --example compare_backends -- 20000
//! ```

use folio::backend::BackendKind;
use folio::config::load_config;
use folio::{benchmark, output};
use std::path::Path;
use std::time::Instant;

const DEFAULT_ITEMS: usize = 5_000;
const ITERATIONS: usize = 20;

const CONFIG: &str = r#"
[types.post]
dir = "content/posts"
url = "/blog/{year}/{slug}/"
sort = "date"
direction = "desc"

[taxonomies.tags]
file = "content/taxonomies/tags.yaml"
"#;

const WORDS: &[&str] = &[
    "cache", "index", "render", "slug", "route", "term", "draft", "page", "query", "build",
];

fn write(root: &Path, rel: &str, content: &str) -> std::io::Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
}

fn generate(root: &Path, n: usize) -> std::io::Result<()> {
    write(root, "folio.toml", CONFIG)?;
    write(
        root,
        "content/taxonomies/tags.yaml",
        "- slug: rust\n  name: Rust\n- slug: web\n  name: Web\n",
    )?;
    for i in 0..n {
        let status = if i % 6 == 0 { "draft" } else { "published" };
        let title = format!("{} {} {}", WORDS[i % 10], WORDS[(i / 10) % 10], i);
        let tag = if i % 2 == 0 { "rust" } else { "web" };
        let body = WORDS
            .iter()
            .cycle()
            .skip(i % 10)
            .take(60)
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        write(
            root,
            &format!("content/posts/post-{i:06}.md"),
            &format!(
                "---\ntitle: \"{title}\"\nstatus: {status}\ndate: 20{:02}-{:02}-{:02}\ntags: [{tag}]\n---\n\n{body}\n",
                10 + i % 15,
                i % 12 + 1,
                i % 28 + 1,
            ),
        )?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let n = std::env::args()
        .nth(1)
        .map(|s| s.parse::<usize>())
        .transpose()?
        .unwrap_or(DEFAULT_ITEMS);

    let site = tempfile::tempdir()?;
    let start = Instant::now();
    generate(site.path(), n)?;
    println!("Generated {n} posts in {:.1?}", start.elapsed());

    let config = load_config(site.path())?;
    let kinds: Vec<BackendKind> = BackendKind::ALL
        .into_iter()
        .filter(|k| k.is_available())
        .collect();
    let report = benchmark::run(site.path(), &config, &kinds, ITERATIONS, true)?;
    output::print_benchmark(&report);

    if !report.is_consistent() {
        std::process::exit(1);
    }
    Ok(())
}
