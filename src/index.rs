use std::io;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use crate::cache::{CachedPage, PersistedCache};
use crate::config::{CachePaths, IndexConfig};
use crate::crawl::{crawl, FoundPath};
use crate::doc::{Extractor, Formatter};
use crate::error::{Error, Result};
use crate::name::PageKey;
use crate::page::{ManualPage, Recorded};
use crate::search::SearchIndex;
use crate::store::save_artifacts;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub files_seen: usize,
    pub files_skipped: usize,
    pub pages_indexed: usize,
    pub pages_dropped: usize,
}

/// Result of one full index build.
#[derive(Debug)]
pub struct BuiltIndex {
    pub cache: PersistedCache,
    pub search: SearchIndex,
    pub stats: IndexStats,
}

/// Feed every path of one logical page through the extractor.
///
/// Per-file failures are logged and leave the page to its other paths; only
/// fatal conditions such as a missing formatter escape.
fn build_page(
    key: PageKey,
    paths: &[FoundPath],
    extractor: &Extractor<'_>,
) -> Result<Option<CachedPage>> {
    let mut page = ManualPage::new(key);
    for found in paths {
        match page.record_path(found, extractor) {
            Ok(Recorded::NewContent) => {}
            Ok(Recorded::Duplicate) => {
                debug!("{}: same content as an earlier copy", found.observed.display());
            }
            Err(e @ (Error::FormatterFailure { .. } | Error::FormatterTimeout { .. })) => {
                warn!("{e}")
            }
            Err(e) if e.is_recoverable() => debug!("{}: {e}", found.observed.display()),
            Err(e) => return Err(e),
        }
    }

    match page.finalize() {
        Ok(cached) => Ok(Some(cached)),
        Err(e @ Error::NoDataExtracted { .. }) => {
            debug!("dropping page: {e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Walk the configured roots, extract every page and fit the search model.
///
/// Pages with distinct keys are extracted in parallel; the paths of one page
/// are processed in walk order by a single task. The first fatal error
/// aborts the build.
pub fn build_index(config: &IndexConfig, formatter: &dyn Formatter) -> Result<BuiltIndex> {
    let crawl = crawl(&config.roots);
    info!(
        files = crawl.files_seen,
        pages = crawl.pages.len(),
        "walked {} root(s)",
        config.roots.len()
    );

    let extractor = Extractor::new(&config.sections, formatter);
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build()
        .map_err(io::Error::other)?;

    let groups: Vec<(PageKey, Vec<FoundPath>)> = crawl.pages.into_iter().collect();
    let total = groups.len();
    let pages: Vec<Option<CachedPage>> = pool.install(|| {
        groups
            .into_par_iter()
            .map(|(key, paths)| build_page(key, &paths, &extractor))
            .collect::<Result<Vec<_>>>()
    })?;

    let mut cache = PersistedCache::new();
    for page in pages.into_iter().flatten() {
        cache.insert(page);
    }

    let search = SearchIndex::from_corpus(cache.corpus());
    let stats = IndexStats {
        files_seen: crawl.files_seen,
        files_skipped: crawl.skipped,
        pages_indexed: cache.len(),
        pages_dropped: total - cache.len(),
    };
    info!(
        indexed = stats.pages_indexed,
        dropped = stats.pages_dropped,
        terms = search.model().len(),
        "index built"
    );

    Ok(BuiltIndex {
        cache,
        search,
        stats,
    })
}

/// Persist the cache file and the search artifacts beside it.
pub fn save_index(paths: &CachePaths, built: &BuiltIndex) -> Result<()> {
    built.cache.save(paths.cache_file())?;
    save_artifacts(paths, &built.search)?;
    info!("saved index to {}", paths.dir().display());
    Ok(())
}
