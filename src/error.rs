//! Error types for the reference repair engine.
//!
//! Only [`Error::WorkingDirectory`] and configuration errors abort a run.
//! Every other variant is collected per file into result lists so that one
//! unreadable or conflicting file never stops a batch.

use std::path::PathBuf;

/// Errors raised while indexing, scanning, or rewriting files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The working directory is missing, not a directory, or unreadable.
    #[error("cannot read working directory {}: {source}", path.display())]
    WorkingDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single file could not be read or written.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two corrections in one batch claim overlapping spans of the same file.
    #[error(
        "conflicting rewrite of {} at {}:{} in {}",
        target.display(),
        line,
        column,
        file.display()
    )]
    WriteConflict {
        file: PathBuf,
        target: PathBuf,
        line: usize,
        column: usize,
    },

    /// The chosen correction does not name a file in the index snapshot.
    #[error(
        "correction for {} points at {}, which is not an indexed file",
        target.display(),
        correct_path.display()
    )]
    InvalidCorrection {
        target: PathBuf,
        correct_path: PathBuf,
    },

    /// A referencing-file glob failed to compile.
    #[error("invalid glob '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// The project config file exists but could not be read.
    #[error("cannot read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The project config file is not valid TOML for [`crate::config::FileConfig`].
    #[error("malformed config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
