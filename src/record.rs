//! On-disk session records.
//!
//! One file per session at `<dir>/<sid>.sid`, holding a self-describing
//! record of the session data, its expiry instant, and the owning SID.
//! Loading is strict about validity but silent about failure: anything
//! that does not decode and validate reads as an empty session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::value::SessionValue;

/// A session's key/value map.
pub type SessionData = HashMap<String, SessionValue>;

/// Filename extension for session files.
pub(crate) const FILE_EXTENSION: &str = "sid";

/// The persisted triple.
///
/// Unknown fields in a stored record are ignored on load; unknown value
/// tags inside `data` fail the decode and yield an empty session.
#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    data: SessionData,
    expires: DateTime<Utc>,
    sid: String,
}

/// Errors while writing a record. Callers log and drop these; session
/// persistence is best-effort.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Path of the session file for `sid`.
pub(crate) fn session_path(dir: &Path, sid: &str) -> PathBuf {
    dir.join(format!("{sid}.{FILE_EXTENSION}"))
}

/// Read the session data for `sid` from disk.
///
/// Returns an empty map when the file is missing, unreadable, fails to
/// decode, has expired, or carries a SID other than the one derived from
/// its file name.
pub(crate) async fn load(dir: &Path, sid: &str) -> SessionData {
    let path = session_path(dir, sid);
    let raw = match tokio::fs::read(&path).await {
        Ok(raw) => raw,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                debug!(%sid, %error, "session file unreadable");
            }
            return SessionData::new();
        }
    };

    let record: SessionRecord = match serde_json::from_slice(&raw) {
        Ok(record) => record,
        Err(error) => {
            debug!(%sid, %error, "session record undecodable");
            return SessionData::new();
        }
    };

    if record.expires <= Utc::now() {
        debug!(%sid, "session record expired");
        return SessionData::new();
    }
    if record.sid != sid {
        debug!(%sid, embedded = %record.sid, "session record SID mismatch");
        return SessionData::new();
    }

    record.data
}

/// Write the session data for `sid` to disk.
///
/// The record expires `ttl + 1` seconds from now. The file is created or
/// truncated with owner/group read-write permissions; a partial write
/// leaves a file the next load will reject.
pub(crate) async fn store(
    dir: &Path,
    sid: &str,
    data: &SessionData,
    ttl_secs: i64,
) -> Result<(), RecordError> {
    let record = SessionRecord {
        data: data.clone(),
        expires: Utc::now() + Duration::seconds(ttl_secs + 1),
        sid: sid.to_owned(),
    };
    let raw = serde_json::to_vec(&record)?;

    let path = session_path(dir, sid);
    let mut open = tokio::fs::OpenOptions::new();
    open.write(true).create(true).truncate(true);
    #[cfg(unix)]
    open.mode(0o660);

    let mut file = open
        .open(&path)
        .await
        .map_err(|source| RecordError::Io {
            path: path.clone(),
            source,
        })?;
    file.write_all(&raw)
        .await
        .map_err(|source| RecordError::Io { path, source })
}

/// Remove the session file for `sid`, ignoring any error.
pub(crate) async fn remove(dir: &Path, sid: &str) {
    let _ = tokio::fs::remove_file(session_path(dir, sid)).await;
}
