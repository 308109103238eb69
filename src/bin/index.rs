//! `index`
//!
//! Walks the manual page directories and writes the search cache.
//!
//! Usage:
//!   cargo run --bin index -- -v
//!   cargo run --bin index -- --root /usr/share/man -o /tmp/cache/discoverability_cache

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::error;

use discoverability::config::{CachePaths, DesiredSections, IndexConfig};
use discoverability::constants::{FORMATTER_TIMEOUT_SECS, SECTIONS_PATH};
use discoverability::crawl::discover_roots;
use discoverability::doc::Groff;
use discoverability::index::{build_index, save_index};
use discoverability::logging::init_tracing;
use discoverability::Result;

#[derive(Debug, Parser)]
#[command(name = "index", about = "Build the manual page search cache")]
struct Args {
    /// Report progress on stderr (repeat for per-file detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Cache file to write [default: cache/discoverability_cache]
    #[arg(short = 'o', long)]
    cache: Option<PathBuf>,

    /// File listing the section names worth indexing
    #[arg(short, long, default_value = SECTIONS_PATH)]
    sections: PathBuf,

    /// Directory to walk instead of those reported by `manpath` (repeatable)
    #[arg(long = "root")]
    roots: Vec<PathBuf>,

    /// Extraction threads; 0 uses every core
    #[arg(short, long, default_value_t = 0)]
    jobs: usize,

    /// Seconds one page may spend in the formatter before it is skipped
    #[arg(long, default_value_t = FORMATTER_TIMEOUT_SECS)]
    timeout: u64,
}

fn run(args: Args) -> Result<()> {
    let sections = DesiredSections::load(&args.sections)?;
    let roots = if args.roots.is_empty() {
        discover_roots()?
    } else {
        args.roots
    };
    let paths = args
        .cache
        .map(CachePaths::for_cache_file)
        .unwrap_or_default();

    let mut config = IndexConfig::new(roots, sections);
    config.jobs = args.jobs;

    let built = build_index(&config, &Groff::new(Duration::from_secs(args.timeout)))?;
    save_index(&paths, &built)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
