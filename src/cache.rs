//! The persisted per-page metadata: one bzip2-compressed JSON object keyed by
//! compound title.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::io_util::write_atomic;
use crate::model::{Corpus, CorpusEntry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPage {
    pub title: String,
    pub section: u32,
    pub paths: Vec<String>,
    pub modification: f64,
    pub sections: IndexMap<String, String>,
}

impl CachedPage {
    pub fn compound_title(&self) -> String {
        format!("{} ({})", self.title, self.section)
    }

    /// All section text, space-joined in section order.
    pub fn text(&self) -> String {
        self.sections
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedCache {
    pages: IndexMap<String, CachedPage>,
}

impl PersistedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page: CachedPage) {
        self.pages.insert(page.compound_title(), page);
    }

    pub fn get(&self, compound_title: &str) -> Option<&CachedPage> {
        self.pages.get(compound_title)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.pages.keys().map(String::as_str)
    }

    /// One corpus row per page, in cache order.
    pub fn corpus(&self) -> Corpus {
        self.pages
            .iter()
            .map(|(title, page)| CorpusEntry {
                title: title.clone(),
                text: page.text(),
            })
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
        serde_json::to_writer(&mut encoder, self)?;
        let bytes = encoder.finish()?;
        write_atomic(path, |w| w.write_all(&bytes))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NoIndexAvailable {
                path: path.to_path_buf(),
            },
            _ => Error::Io(e),
        })?;
        let reader = BufReader::new(BzDecoder::new(file));
        Ok(serde_json::from_reader(reader)?)
    }
}
