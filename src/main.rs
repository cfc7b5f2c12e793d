use clap::{Parser, Subcommand};
use folio::backend::BackendKind;
use folio::{benchmark, config, indexer::Indexer, logging, output};
use std::path::PathBuf;
use std::process::ExitCode;

fn version_string() -> &'static str {
    let on_tag = env!("FOLIO_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("FOLIO_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Content index and cache for flat-file Markdown sites")]
#[command(long_about = "\
Content index and cache for flat-file Markdown sites

Content lives as Markdown files with YAML frontmatter. folio scans them into
a compact snapshot, writes it with the array or SQLite backend, and tells the
rendering layer when that snapshot is stale.

Site structure:

  site/
  ├── folio.toml                   # Types, taxonomies, index settings (optional)
  ├── content/
  │   ├── posts/
  │   │   └── hello-world.md       # YAML frontmatter + Markdown body
  │   ├── pages/
  │   │   ├── 010-about.md         # Numeric prefix = manual order
  │   │   └── 020-docs/index.md    # Hierarchical URL: /docs/
  │   └── taxonomies/tags.yaml     # Term names and descriptions
  └── .folio-cache/                # Generations + fingerprint.json

Run 'folio gen-config' to print a documented folio.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Site root (directory holding folio.toml and content/)
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Log level spec, e.g. `info` or `warn,folio::scan=debug`
    #[arg(long, env = "FOLIO_LOG", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Backend names accepted on the command line.
#[derive(clap::ValueEnum, Clone, Copy)]
enum BackendArg {
    Array,
    Sqlite,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Array => BackendKind::Array,
            BackendArg::Sqlite => BackendKind::Sqlite,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Scan the content and commit a new index generation
    Rebuild {
        /// Write with this backend instead of the configured one
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,
    },
    /// Validate content without writing anything; fails on any issue
    Lint,
    /// Show the committed generation and whether it is fresh
    Status,
    /// Time read operations on each backend
    Benchmark {
        /// Also check that all backends return identical results
        #[arg(long)]
        compare: bool,
        /// Repetitions per operation
        #[arg(long, default_value_t = 100)]
        iterations: usize,
        /// Only benchmark this backend
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,
    },
    /// Print a stock folio.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _logger = logging::init(cli.log_level.as_deref())?;

    match cli.command {
        Command::Rebuild { backend } => {
            let indexer = open(&cli.root)?.with_backend(backend.map(Into::into));
            println!("==> Rebuilding {}", cli.root.display());
            let report = indexer.rebuild()?;
            output::print_rebuild_report(&report);
        }
        Command::Lint => {
            let indexer = open(&cli.root)?;
            println!("==> Checking {}", cli.root.display());
            let report = indexer.lint()?;
            output::print_lint_report(&report);
            if !report.is_clean() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Status => {
            let status = open(&cli.root)?.status()?;
            output::print_status(&status);
        }
        Command::Benchmark {
            compare,
            iterations,
            backend,
        } => {
            let indexer = open(&cli.root)?;
            let kinds: Vec<BackendKind> = match backend {
                Some(b) => vec![b.into()],
                None => BackendKind::ALL
                    .into_iter()
                    .filter(|k| k.is_available())
                    .collect(),
            };
            let report =
                benchmark::run(&cli.root, indexer.config(), &kinds, iterations, compare)?;
            output::print_benchmark(&report);
            if !report.is_consistent() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn open(root: &std::path::Path) -> Result<Indexer<'static>, Box<dyn std::error::Error>> {
    let indexer = Indexer::open(root)?;
    init_thread_pool(&indexer.config().processing);
    Ok(indexer)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
