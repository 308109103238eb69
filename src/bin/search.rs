//! `search`
//!
//! Prints the manual pages most relevant to the given terms, best first.
//!
//! Usage:
//!   cargo run --bin search -- copy file
//!   cargo run --bin search -- --cache-dir /tmp/cache -n 5 grep

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use discoverability::config::CachePaths;
use discoverability::constants::{CACHE_DIR, DEFAULT_RESULT_COUNT};
use discoverability::logging::init_tracing;
use discoverability::store::load_or_build;
use discoverability::Result;

#[derive(Debug, Parser)]
#[command(name = "search", about = "Search the manual page cache")]
struct Args {
    /// Terms to search, joined with spaces into one query
    #[arg(required = true)]
    terms: Vec<String>,

    /// Directory holding the cache file and model artifacts
    #[arg(long, default_value = CACHE_DIR)]
    cache_dir: PathBuf,

    /// Maximum number of titles to print
    #[arg(short = 'n', long, default_value_t = DEFAULT_RESULT_COUNT)]
    count: usize,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(args: Args) -> Result<()> {
    let index = load_or_build(&CachePaths::in_dir(&args.cache_dir))?;
    let query = args.terms.join(" ");

    let mut out = BufWriter::new(io::stdout().lock());
    for title in index.search_titles(&query, args.count) {
        writeln!(out, "{title}")?;
    }
    out.flush()?;
    Ok(())
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
