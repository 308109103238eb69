use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not find '{tool}' to run")]
    DependencyUnavailable { tool: &'static str },

    #[error("{} doesn't look like a manual page", path.display())]
    NotAManualPage { path: PathBuf },

    #[error("no data was read for {title}")]
    NoDataExtracted { title: String },

    #[error("{} file is missing", path.display())]
    ConfigurationMissing { path: PathBuf },

    #[error("no index at {}; run the index command first", path.display())]
    NoIndexAvailable { path: PathBuf },

    #[error("formatter failed for {} ({status}): {stderr}", path.display())]
    FormatterFailure {
        path: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    #[error("formatter gave up on {} after {timeout:?}", path.display())]
    FormatterTimeout { path: PathBuf, timeout: Duration },

    #[error("corrupt artifact {}: {reason}", path.display())]
    CorruptArtifact { path: PathBuf, reason: String },
}

impl Error {
    /// Per-file conditions the indexer absorbs; anything else aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::NotAManualPage { .. }
                | Error::NoDataExtracted { .. }
                | Error::FormatterFailure { .. }
                | Error::FormatterTimeout { .. }
        )
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_file_kinds_are_recoverable() {
        assert!(Error::NotAManualPage {
            path: "README".into()
        }
        .is_recoverable());
        assert!(Error::NoDataExtracted {
            title: "ls (1)".into()
        }
        .is_recoverable());
        assert!(Error::FormatterTimeout {
            path: "man1/ls.1".into(),
            timeout: Duration::from_secs(60),
        }
        .is_recoverable());
    }

    #[test]
    fn run_level_kinds_are_fatal() {
        assert!(!Error::DependencyUnavailable { tool: "groff" }.is_recoverable());
        assert!(!Error::ConfigurationMissing {
            path: "config/.sections".into()
        }
        .is_recoverable());
        assert!(!Error::NoIndexAvailable {
            path: "cache".into()
        }
        .is_recoverable());
    }
}
