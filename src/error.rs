//! Error types for session bootstrap.
//!
//! Only directory bootstrap surfaces errors to callers; all other I/O in
//! this crate is best-effort and swallowed (a failed load or store reads
//! as an empty session on the next access).

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while preparing the session directory.
#[derive(Debug, Error)]
pub enum SessionDirError {
    /// I/O error while creating or resolving the directory.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configured path exists but is not a directory.
    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },
}

impl SessionDirError {
    /// Create an I/O error with path context.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
