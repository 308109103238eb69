use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use indexmap::IndexMap;
use tracing::debug;

use crate::constants::MANPATH_PROGRAM;
use crate::error::{Error, Result};
use crate::name::{resolve, PageKey};

/// One walked file: the path the walk reached and where it really lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundPath {
    /// As reached by the walk, symlinked components included.
    pub observed: PathBuf,
    /// Canonical location, used for keys and rendering.
    pub real: PathBuf,
}

impl FoundPath {
    /// A file that is its own canonical location.
    pub fn direct(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        FoundPath {
            observed: path.clone(),
            real: path,
        }
    }
}

/// Every candidate file found under the roots, grouped by logical page.
#[derive(Debug, Default)]
pub struct Crawl {
    /// Files per page in walk order, keys in first-seen order.
    pub pages: IndexMap<PageKey, Vec<FoundPath>>,
    pub files_seen: usize,
    pub skipped: usize,
}

/// Walk `roots` in order, following symlinks, and group man pages by key.
///
/// Within a directory files come before subdirectories and both are visited
/// in name order, so repeated walks of an unchanged tree agree. There is no
/// cycle detection: a symlink loop makes this walk forever.
pub fn crawl(roots: &[PathBuf]) -> Crawl {
    let mut crawl = Crawl::default();

    for root in roots {
        // Iterative DFS; subdirectories pushed in reverse to pop in order
        let mut dirs: Vec<PathBuf> = vec![root.clone()];

        while let Some(dir) = dirs.pop() {
            let mut entries: Vec<PathBuf> = match fs::read_dir(&dir) {
                Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
                Err(e) => {
                    debug!("cannot read {}: {e}", dir.display());
                    continue;
                }
            };
            entries.sort();

            let mut subdirs = Vec::new();
            for path in entries {
                if path.is_dir() {
                    subdirs.push(path);
                } else if path.is_file() {
                    crawl.files_seen += 1;
                    crawl.visit(&path);
                }
            }
            dirs.extend(subdirs.into_iter().rev());
        }
    }

    crawl
}

impl Crawl {
    fn visit(&mut self, path: &Path) {
        let real = match path.canonicalize() {
            Ok(real) => real,
            Err(e) => {
                debug!("cannot resolve {}: {e}", path.display());
                self.skipped += 1;
                return;
            }
        };
        match resolve(&real) {
            Ok(key) => self.pages.entry(key).or_default().push(FoundPath {
                observed: path.to_path_buf(),
                real,
            }),
            Err(e) => {
                debug!("skipping: {e}");
                self.skipped += 1;
            }
        }
    }
}

/// Directories `man` itself would search, from `manpath`.
pub fn discover_roots() -> Result<Vec<PathBuf>> {
    let output = Command::new(MANPATH_PROGRAM)
        .output()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::DependencyUnavailable {
                tool: MANPATH_PROGRAM,
            },
            _ => Error::Io(e),
        })?;
    Ok(parse_manpath(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_manpath(stdout: &str) -> Vec<PathBuf> {
    stdout
        .trim()
        .split(':')
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}
