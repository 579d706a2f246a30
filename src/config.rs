//! Session configuration.
//!
//! TTL, the SID form-field name, and the exclude list are process-wide in
//! spirit: they are captured once by the [`SessionManager`] at start-up
//! and never written to afterwards. Changing them while requests are in
//! flight is not supported.
//!
//! [`SessionManager`]: crate::manager::SessionManager

use serde::Deserialize;

use crate::exclude::ExcludeList;

/// Fallback TTL in seconds (10 minutes).
const DEFAULT_TTL: u64 = 600;

/// Default name of the form value carrying the session ID.
const DEFAULT_SID_NAME: &str = "SID";

/// Configuration for session handling.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionOptions {
    #[serde(default = "default_ttl")]
    ttl: u64,
    #[serde(default = "default_sid_name")]
    sid_name: String,
    #[serde(default)]
    exclude: ExcludeList,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            sid_name: default_sid_name(),
            exclude: ExcludeList::new(),
        }
    }
}

impl SessionOptions {
    /// Create options with the default TTL (600 s) and SID name (`SID`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Time-To-Live of an unused session, in seconds.
    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    /// Set the session lifetime in seconds. Zero resets to the default
    /// of 600 seconds.
    pub fn set_ttl(&mut self, seconds: u64) {
        self.ttl = if seconds == 0 { DEFAULT_TTL } else { seconds };
    }

    /// Name of the GET/POST value identifying the session.
    pub fn sid_name(&self) -> &str {
        &self.sid_name
    }

    /// Set the session ID name. Empty names are ignored.
    pub fn set_sid_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !name.is_empty() {
            self.sid_name = name;
        }
    }

    /// Append URL path prefixes to bypass, returning the new total count.
    pub fn exclude_paths<I, S>(&mut self, prefixes: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.add(prefixes)
    }

    /// The registered exclude prefixes.
    pub fn exclude(&self) -> &ExcludeList {
        &self.exclude
    }

    /// Whether `path` is excluded from session handling.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude.is_excluded(path)
    }
}

fn default_ttl() -> u64 {
    DEFAULT_TTL
}

fn default_sid_name() -> String {
    DEFAULT_SID_NAME.to_string()
}
