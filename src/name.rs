//! Maps manual-page file names to the logical page they document.

use std::fmt;
use std::path::Path;

use crate::constants::{COMPRESSION_SUFFIXES, MIN_COMPRESSED_NAME_TOKENS};
use crate::error::{Error, Result};

/// Identity of a logical manual page, independent of where it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageKey {
    pub title: String,
    pub section: u32,
}

impl PageKey {
    pub fn new(title: impl Into<String>, section: u32) -> Self {
        PageKey {
            title: title.into(),
            section,
        }
    }

    /// `"{title} ({section})"`, the key used in the cache and corpus.
    pub fn compound_title(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.section)
    }
}

fn parse_section(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// Derive the page key from the final component of `path`.
///
/// Accepts `NAME.SECTION` and `NAME.SECTION.{gz,bz2}`, where `NAME` may itself
/// contain dots.
pub fn resolve(path: &Path) -> Result<PageKey> {
    let not_a_page = || Error::NotAManualPage {
        path: path.to_path_buf(),
    };

    let fname = path
        .file_name()
        .map(|s| s.to_string_lossy())
        .ok_or_else(not_a_page)?;
    let tokens: Vec<&str> = fname.split('.').collect();

    let (title_tokens, section) = match tokens.as_slice() {
        [head @ .., last] if !head.is_empty() && parse_section(last).is_some() => {
            (head, parse_section(last))
        }
        [head @ .., section, suffix]
            if tokens.len() >= MIN_COMPRESSED_NAME_TOKENS
                && COMPRESSION_SUFFIXES.contains(suffix) =>
        {
            (head, parse_section(section))
        }
        _ => return Err(not_a_page()),
    };

    let section = section.ok_or_else(not_a_page)?;
    let title = title_tokens.join(".");
    if title.is_empty() {
        return Err(not_a_page());
    }
    Ok(PageKey { title, section })
}
