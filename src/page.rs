use std::collections::HashSet;
use std::path::PathBuf;

use indexmap::map::Entry;

use crate::cache::CachedPage;
use crate::crawl::FoundPath;
use crate::doc::{modification_time, ContentHash, Extractor, SectionMap};
use crate::error::{Error, Result};
use crate::name::PageKey;
use crate::text::normalize;

/// Outcome of feeding one more path to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// Formatter output not seen before for this page; sections were read.
    NewContent,
    /// Byte-identical output already processed; only bookkeeping changed.
    Duplicate,
}

/// Accumulates every file that documents one logical page.
#[derive(Debug, Clone)]
pub struct ManualPage {
    key: PageKey,
    paths: Vec<PathBuf>,
    seen_content_hashes: HashSet<ContentHash>,
    sections: SectionMap,
    last_modification_time: f64,
}

impl ManualPage {
    pub fn new(key: PageKey) -> Self {
        ManualPage {
            key,
            paths: Vec::new(),
            seen_content_hashes: HashSet::new(),
            sections: SectionMap::new(),
            last_modification_time: 0.0,
        }
    }

    pub fn key(&self) -> &PageKey {
        &self.key
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn sections(&self) -> &SectionMap {
        &self.sections
    }

    pub fn last_modification_time(&self) -> f64 {
        self.last_modification_time
    }

    /// Record `found` and merge its content unless identical output was seen.
    ///
    /// The observed path and modification time are recorded even when
    /// extraction fails. Extraction itself reads the real path so that
    /// relative includes resolve next to the actual file.
    pub fn record_path(
        &mut self,
        found: &FoundPath,
        extractor: &Extractor<'_>,
    ) -> Result<Recorded> {
        self.paths.push(found.observed.clone());
        self.last_modification_time = self
            .last_modification_time
            .max(modification_time(&found.real)?);

        let extraction = extractor.extract(&found.real)?;
        debug_assert_eq!(extraction.key, self.key);
        if !self.seen_content_hashes.insert(extraction.hash) {
            return Ok(Recorded::Duplicate);
        }
        for (name, text) in extraction.sections {
            match self.sections.entry(name) {
                Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    existing.push(' ');
                    existing.push_str(&text);
                }
                Entry::Vacant(entry) => {
                    entry.insert(text);
                }
            }
        }
        Ok(Recorded::NewContent)
    }

    /// Normalize the collected sections into a cache record.
    pub fn finalize(self) -> Result<CachedPage> {
        if self.sections.is_empty() {
            return Err(Error::NoDataExtracted {
                title: self.key.compound_title(),
            });
        }

        let sections = self
            .sections
            .into_iter()
            .map(|(name, text)| (name, normalize(&text)))
            .collect();
        Ok(CachedPage {
            title: self.key.title,
            section: self.key.section,
            paths: self
                .paths
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            modification: self.last_modification_time,
            sections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DesiredSections;
    use crate::doc::Formatter;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;

    struct Passthrough;

    impl Formatter for Passthrough {
        fn render(&self, source: &[u8], _page: &Path) -> Result<Vec<u8>> {
            Ok(source.to_vec())
        }
    }

    const LS_PAGE: &str = "LS(1)\nNAME\n       ls - list directory contents\n";

    fn desired() -> DesiredSections {
        ["NAME"].into_iter().collect()
    }

    #[test]
    fn identical_copies_merge_once() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a").join("ls.1");
        let b = dir.path().join("b").join("ls.1");
        for p in [&a, &b] {
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, LS_PAGE).unwrap();
        }

        let desired = desired();
        let extractor = Extractor::new(&desired, &Passthrough);
        let mut page = ManualPage::new(PageKey::new("ls", 1));
        let first = FoundPath::direct(&a);
        let second = FoundPath::direct(&b);
        assert_eq!(page.record_path(&first, &extractor).unwrap(), Recorded::NewContent);
        assert_eq!(page.record_path(&second, &extractor).unwrap(), Recorded::Duplicate);

        assert_eq!(page.paths(), &[a.clone(), b.clone()]);
        assert_eq!(page.sections()["NAME"], "ls - list directory contents ");
        assert!(page.last_modification_time() > 0.0);
    }

    #[test]
    fn distinct_content_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("ls.1");
        let b = dir.path().join("de").join("ls.1");
        fs::create_dir_all(b.parent().unwrap()).unwrap();
        fs::write(&a, LS_PAGE).unwrap();
        fs::write(&b, "LS(1)\nNAME\n       ls - Verzeichnisinhalte auflisten\n").unwrap();

        let desired = desired();
        let extractor = Extractor::new(&desired, &Passthrough);
        let mut page = ManualPage::new(PageKey::new("ls", 1));
        page.record_path(&FoundPath::direct(&a), &extractor).unwrap();
        page.record_path(&FoundPath::direct(&b), &extractor).unwrap();

        let cached = page.finalize().unwrap();
        assert_eq!(
            cached.sections["NAME"],
            "ls list directory contents ls verzeichnisinhalte auflisten"
        );
    }

    #[test]
    fn page_without_sections_has_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let so = dir.path().join("lsx.1");
        fs::write(&so, "").unwrap();

        let desired = desired();
        let extractor = Extractor::new(&desired, &Passthrough);
        let mut page = ManualPage::new(PageKey::new("lsx", 1));
        page.record_path(&FoundPath::direct(&so), &extractor).unwrap();

        assert!(matches!(page.finalize(), Err(Error::NoDataExtracted { .. })));
    }

    #[test]
    fn observed_path_is_recorded_and_real_path_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("ls.1");
        fs::write(&real, LS_PAGE).unwrap();
        let found = FoundPath {
            observed: dir.path().join("dir.1"),
            real: real.clone(),
        };

        let desired = desired();
        let extractor = Extractor::new(&desired, &Passthrough);
        let mut page = ManualPage::new(PageKey::new("ls", 1));
        page.record_path(&found, &extractor).unwrap();

        assert_eq!(page.paths(), &[dir.path().join("dir.1")]);
        assert_eq!(page.sections()["NAME"], "ls - list directory contents ");
    }

    #[test]
    fn repeated_section_across_files_is_space_joined() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("ls.1");
        let b = dir.path().join("de").join("ls.1");
        fs::create_dir_all(b.parent().unwrap()).unwrap();
        fs::write(&a, LS_PAGE).unwrap();
        fs::write(&b, "LS(1)\nNAME\n       ls - auflisten\n").unwrap();

        let desired = desired();
        let extractor = Extractor::new(&desired, &Passthrough);
        let mut page = ManualPage::new(PageKey::new("ls", 1));
        page.record_path(&FoundPath::direct(&a), &extractor).unwrap();
        page.record_path(&FoundPath::direct(&b), &extractor).unwrap();

        assert_eq!(
            page.sections()["NAME"],
            "ls - list directory contents  ls - auflisten "
        );
    }
}
