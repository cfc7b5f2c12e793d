//! Backend benchmark and equivalence check behind `folio benchmark`.
//!
//! Each backend builds the site into its own scratch cache directory, then
//! the read operations the rendering layer relies on are timed over N
//! iterations. With `compare`, every backend's answers to a fixed set of
//! probes (listings, counts, terms, query pages, searches) are checked
//! against the first backend's.

use crate::backend::{BackendKind, IndexHandle, RECENT_LIMIT};
use crate::config::SiteConfig;
use crate::indexer::{IndexError, Indexer};
use crate::query::Query;
use crate::types::{SortDirection, SortField, Status};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

/// Timing of one operation over all iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct OpTiming {
    pub name: &'static str,
    pub mean: Duration,
    pub max: Duration,
}

#[derive(Debug, Clone)]
pub struct BackendBenchmark {
    pub backend: BackendKind,
    pub item_count: usize,
    pub build: Duration,
    /// Size of the generation directory.
    pub disk_bytes: u64,
    /// Approximate bytes held by the loaded handle.
    pub memory_bytes: usize,
    pub ops: Vec<OpTiming>,
}

/// A probe whose answer differs from the reference backend's.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub probe: String,
    pub backend: BackendKind,
    pub expected: Vec<String>,
    pub actual: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub iterations: usize,
    pub results: Vec<BackendBenchmark>,
    /// `None` unless a comparison was requested.
    pub mismatches: Option<Vec<Mismatch>>,
}

impl BenchmarkReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.as_ref().is_none_or(Vec::is_empty)
    }
}

/// Benchmark `kinds` against the site at `root`.
pub fn run(
    root: &Path,
    config: &SiteConfig,
    kinds: &[BackendKind],
    iterations: usize,
    compare: bool,
) -> Result<BenchmarkReport, IndexError> {
    let iterations = iterations.max(1);
    let scratch = tempfile::Builder::new()
        .prefix("folio-bench-")
        .tempdir()
        .map_err(crate::cache::CacheError::from)?;

    let mut results = Vec::new();
    let mut probes: Vec<(BackendKind, BTreeMap<String, Vec<String>>)> = Vec::new();
    for &kind in kinds {
        let indexer = Indexer::new(root, config.clone())
            .with_backend(Some(kind))
            .with_cache_dir(scratch.path().join(kind.name()));

        let start = Instant::now();
        let report = indexer.rebuild()?;
        let build = start.elapsed();
        let loaded = indexer
            .load_committed()?
            .ok_or_else(|| crate::backend::BackendError::Corrupt(format!(
                "{kind} generation did not load after building"
            )))?;
        let handle = loaded.handle.as_ref();

        log::info!("benchmarking {kind} backend ({} items)", report.item_count);
        let ops = time_ops(handle, config, iterations)?;
        results.push(BackendBenchmark {
            backend: kind,
            item_count: report.item_count,
            build,
            disk_bytes: indexer.cache().generation_size(&report.generation),
            memory_bytes: handle.approx_memory_bytes(),
            ops,
        });
        if compare {
            probes.push((kind, probe(handle, config)?));
        }
    }

    let mismatches = compare.then(|| diff_probes(&probes));
    Ok(BenchmarkReport {
        iterations,
        results,
        mismatches,
    })
}

fn time<T>(
    name: &'static str,
    iterations: usize,
    mut op: impl FnMut() -> Result<T, IndexError>,
) -> Result<OpTiming, IndexError> {
    let mut total = Duration::ZERO;
    let mut max = Duration::ZERO;
    for _ in 0..iterations {
        let start = Instant::now();
        std::hint::black_box(op()?);
        let took = start.elapsed();
        total += took;
        max = max.max(took);
    }
    Ok(OpTiming {
        name,
        mean: total / iterations as u32,
        max,
    })
}

/// The busiest type, one of its slugs, and the busiest term.
struct Sample {
    item_type: String,
    slug: Option<String>,
    term: Option<(String, String)>,
    word: String,
}

fn sample(handle: &dyn IndexHandle, config: &SiteConfig) -> Result<Sample, IndexError> {
    let mut best = (String::new(), 0);
    for name in config.types.keys() {
        let n = handle.count(name, None)?;
        if n > best.1 || best.0.is_empty() {
            best = (name.clone(), n);
        }
    }
    let item_type = best.0;
    let metas = handle.all_meta(&item_type)?;
    let slug = metas.get(metas.len() / 2).map(|m| m.slug.clone());
    let word = metas
        .first()
        .and_then(|m| m.title.split_whitespace().next())
        .unwrap_or("the")
        .to_lowercase();
    let term = config
        .taxonomies
        .keys()
        .flat_map(|tax| handle.terms(tax).into_iter().map(move |t| (tax.clone(), t)))
        .max_by_key(|(_, t)| t.items.len())
        .map(|(tax, t)| (tax, t.slug));
    Ok(Sample {
        item_type,
        slug,
        term,
        word,
    })
}

fn time_ops(
    handle: &dyn IndexHandle,
    config: &SiteConfig,
    iterations: usize,
) -> Result<Vec<OpTiming>, IndexError> {
    let s = sample(handle, config)?;
    let ty = s.item_type.as_str();
    let sort = handle.sort_for(ty);
    let page = Query::new().item_type(ty).page(2).to_request(sort);
    let search = Query::new().item_type(ty).search(&s.word).to_request(sort);

    let mut ops = vec![
        time("count", iterations, || Ok(handle.count(ty, Some(Status::Published))?))?,
        time("get", iterations, || match &s.slug {
            Some(slug) => Ok(handle.get_by_slug(ty, slug)?),
            None => Ok(None),
        })?,
        time("all_meta", iterations, || Ok(handle.all_meta(ty)?))?,
        time("recent_meta", iterations, || Ok(handle.recent_meta(ty, 20)))?,
        time("query page", iterations, || Ok(handle.list(&page)?))?,
        time("search", iterations, || Ok(handle.list(&search)?))?,
    ];
    if let Some((tax, _)) = &s.term {
        ops.push(time("terms", iterations, || Ok(handle.terms(tax)))?);
    }
    Ok(ops)
}

/// Answers to a fixed set of read operations, as comparable string lists.
fn probe(
    handle: &dyn IndexHandle,
    config: &SiteConfig,
) -> Result<BTreeMap<String, Vec<String>>, IndexError> {
    let mut out = BTreeMap::new();
    let slugs = |metas: Vec<crate::types::ItemMeta>| -> Vec<String> {
        metas.into_iter().map(|m| m.slug).collect()
    };

    for ty in config.types.keys() {
        let counts = Status::ALL
            .iter()
            .map(|&st| Ok(format!("{st}={}", handle.count(ty, Some(st))?)))
            .collect::<Result<Vec<_>, IndexError>>()?;
        out.insert(format!("count({ty})"), counts);
        out.insert(format!("all_meta({ty})"), slugs(handle.all_meta(ty)?));
        out.insert(
            format!("recent_meta({ty})"),
            slugs(handle.recent_meta(ty, RECENT_LIMIT)),
        );

        let sorts = [
            (SortField::Date, SortDirection::Desc),
            (SortField::Date, SortDirection::Asc),
            (SortField::Title, SortDirection::Asc),
            (SortField::Order, SortDirection::Desc),
        ];
        for (field, direction) in sorts {
            for page in 1..=3 {
                let q = Query::new()
                    .item_type(ty)
                    .include_drafts()
                    .order_by(field, direction)
                    .per_page(3)
                    .page(page);
                let listing = handle.list(&q.to_request(handle.sort_for(ty)))?;
                let mut answer = slugs(listing.items);
                answer.push(format!("total={}", listing.total));
                out.insert(format!("query({ty}, {field} {direction}, page {page})"), answer);
            }
        }
    }

    for tax in config.taxonomies.keys() {
        for term in handle.terms(tax) {
            let members: Vec<String> = term.items.iter().map(ToString::to_string).collect();
            out.insert(format!("terms({tax}/{})", term.slug), members);
            let q = Query::new().term(tax, &term.slug).per_page(RECENT_LIMIT);
            let listing = handle.list(&q.to_request(Default::default()))?;
            out.insert(format!("query(term {tax}/{})", term.slug), slugs(listing.items));
        }
    }

    let s = sample(handle, config)?;
    let q = Query::new().any_status().search(&s.word).per_page(RECENT_LIMIT);
    out.insert(
        format!("search({})", s.word),
        slugs(handle.list(&q.to_request(Default::default()))?.items),
    );
    Ok(out)
}

fn diff_probes(probes: &[(BackendKind, BTreeMap<String, Vec<String>>)]) -> Vec<Mismatch> {
    let Some((_, reference)) = probes.first() else {
        return Vec::new();
    };
    let mut mismatches = Vec::new();
    for (kind, answers) in &probes[1..] {
        for (name, expected) in reference {
            let actual = answers.get(name).cloned().unwrap_or_default();
            if actual != *expected {
                mismatches.push(Mismatch {
                    probe: name.clone(),
                    backend: *kind,
                    expected: expected.clone(),
                    actual,
                });
            }
        }
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use crate::test_helpers::setup_fixtures;

    #[test]
    fn array_benchmark_times_every_op() {
        let tmp = setup_fixtures();
        let config = load_config(tmp.path()).unwrap();
        let report = run(tmp.path(), &config, &[BackendKind::Array], 3, false).unwrap();

        assert_eq!(report.results.len(), 1);
        let result = &report.results[0];
        let names: Vec<&str> = result.ops.iter().map(|o| o.name).collect();
        assert!(names.contains(&"all_meta"));
        assert!(names.contains(&"terms"));
        assert!(result.disk_bytes > 0);
        assert!(result.memory_bytes > 0);
        assert!(report.mismatches.is_none());
        // Scratch caches only: the site's own cache is untouched
        assert!(!tmp.path().join(".folio-cache").exists());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn backends_agree_on_fixture_site() {
        let tmp = setup_fixtures();
        let config = load_config(tmp.path()).unwrap();
        let report = run(tmp.path(), &config, &BackendKind::ALL, 1, true).unwrap();
        assert!(report.is_consistent(), "{:#?}", report.mismatches);
    }

    #[test]
    fn diff_reports_differences() {
        let a = BTreeMap::from([("p".to_string(), vec!["x".to_string()])]);
        let b = BTreeMap::from([("p".to_string(), vec!["y".to_string()])]);
        let diffs = diff_probes(&[(BackendKind::Array, a), (BackendKind::Sqlite, b)]);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].probe, "p");
        assert_eq!(diffs[0].actual, vec!["y"]);
    }
}
