use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::constants::{
    CACHE_DIR, CACHE_FILE_NAME, CORPUS_FILE_NAME, MATRIX_FILE_NAME, VECTORIZER_FILE_NAME,
};
use crate::error::{Error, Result};

/// Section names whose text is kept in the searchable corpus.
#[derive(Debug, Clone, Default)]
pub struct DesiredSections {
    names: HashSet<String>,
}

impl DesiredSections {
    /// Read a newline-delimited list of section names.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::ConfigurationMissing {
                path: path.to_path_buf(),
            },
            _ => Error::Io(e),
        })?;
        Ok(content.lines().collect())
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, section: &str) -> bool {
        self.names.contains(&section.trim().to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for DesiredSections {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let names = iter
            .into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        DesiredSections { names }
    }
}

/// Everything an index build needs, constructed once at startup.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub roots: Vec<PathBuf>,
    pub sections: DesiredSections,
    /// Worker threads for extraction; `0` uses the available parallelism.
    pub jobs: usize,
}

impl IndexConfig {
    pub fn new(roots: Vec<PathBuf>, sections: DesiredSections) -> Self {
        IndexConfig {
            roots,
            sections,
            jobs: 0,
        }
    }
}

/// Locations of the cache file and the model artifacts beside it.
#[derive(Debug, Clone)]
pub struct CachePaths {
    dir: PathBuf,
    cache_file: PathBuf,
}

impl CachePaths {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let cache_file = dir.join(CACHE_FILE_NAME);
        CachePaths { dir, cache_file }
    }

    /// Use an explicit cache file; artifacts live in its parent directory.
    pub fn for_cache_file(cache_file: impl Into<PathBuf>) -> Self {
        let cache_file = cache_file.into();
        let dir = cache_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        CachePaths { dir, cache_file }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    pub fn matrix(&self) -> PathBuf {
        self.dir.join(MATRIX_FILE_NAME)
    }

    pub fn corpus(&self) -> PathBuf {
        self.dir.join(CORPUS_FILE_NAME)
    }

    pub fn vectorizer(&self) -> PathBuf {
        self.dir.join(VECTORIZER_FILE_NAME)
    }
}

impl Default for CachePaths {
    fn default() -> Self {
        CachePaths::in_dir(CACHE_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_are_case_folded() {
        let sections: DesiredSections = ["name", " Description ", ""].into_iter().collect();
        assert_eq!(sections.len(), 2);
        assert!(sections.contains("NAME"));
        assert!(sections.contains("description"));
        assert!(!sections.contains("SEE ALSO"));
    }

    #[test]
    fn load_reads_one_name_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".sections");
        fs::write(&path, "name\nSYNOPSIS\n\noptions\n").unwrap();

        let sections = DesiredSections::load(&path).unwrap();
        assert_eq!(sections.len(), 3);
        assert!(sections.contains("OPTIONS"));
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DesiredSections::load(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing { .. }));
    }

    #[test]
    fn artifacts_sit_beside_the_cache_file() {
        let paths = CachePaths::for_cache_file("/tmp/idx/my_cache");
        assert_eq!(paths.dir(), Path::new("/tmp/idx"));
        assert_eq!(paths.matrix(), Path::new("/tmp/idx/.matrix"));
        assert_eq!(CachePaths::default().cache_file(), Path::new("cache/discoverability_cache"));
    }
}
