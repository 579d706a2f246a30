//! URL path prefixes excluded from session handling.

use serde::Deserialize;

/// An ordered list of URL path prefixes to bypass.
///
/// Matching paths skip both the session wrapper and the link rewriter.
/// Prefixes can only be added, never removed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "Vec<String>")]
pub struct ExcludeList {
    prefixes: Vec<String>,
}

impl From<Vec<String>> for ExcludeList {
    fn from(prefixes: Vec<String>) -> Self {
        let mut list = Self::default();
        list.add(prefixes);
        list
    }
}

impl ExcludeList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append path prefixes, returning the new total count.
    ///
    /// Each prefix gets a leading `/` if it lacks one; empty strings are
    /// skipped.
    pub fn add<I, S>(&mut self, prefixes: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for prefix in prefixes {
            let prefix = prefix.into();
            if prefix.is_empty() {
                continue;
            }
            self.prefixes.push(normalize(prefix));
        }
        self.prefixes.len()
    }

    /// Whether `path` starts with any registered prefix.
    ///
    /// Relative paths may omit the leading slash; it is added before
    /// comparison. An empty list never matches.
    pub fn is_excluded(&self, path: &str) -> bool {
        if path.is_empty() || self.prefixes.is_empty() {
            return false;
        }
        let probe;
        let path = if path.starts_with('/') {
            path
        } else {
            probe = format!("/{path}");
            &probe
        };
        self.prefixes.iter().any(|prefix| path.starts_with(prefix))
    }
}

fn normalize(prefix: String) -> String {
    if prefix.starts_with('/') {
        prefix
    } else {
        format!("/{prefix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_matches_nothing() {
        let list = ExcludeList::new();
        assert!(!list.is_excluded("/static/app.css"));
    }

    #[test]
    fn add_returns_total_count() {
        let mut list = ExcludeList::new();
        assert_eq!(list.add(["/static"]), 1);
        assert_eq!(list.add(["css", "js"]), 3);
    }

    #[test]
    fn add_skips_empty_prefixes() {
        let mut list = ExcludeList::new();
        assert_eq!(list.add(["", "/static", ""]), 1);
    }

    #[test]
    fn prefixes_get_leading_slash() {
        let mut list = ExcludeList::new();
        list.add(["static"]);
        assert!(list.is_excluded("/static/app.css"));
    }

    #[test]
    fn relative_probe_gets_leading_slash() {
        let mut list = ExcludeList::new();
        list.add(["/static"]);
        assert!(list.is_excluded("static/app.css"));
    }

    #[test]
    fn deserialized_prefixes_are_normalized() {
        let list: ExcludeList = serde_json::from_str(r#"["static", "/css"]"#).unwrap();
        assert!(list.is_excluded("/static/app.css"));
        assert!(list.is_excluded("/css/site.css"));
    }

    #[test]
    fn non_matching_path_passes() {
        let mut list = ExcludeList::new();
        list.add(["/static"]);
        assert!(!list.is_excluded("/page1.html"));
        assert!(!list.is_excluded(""));
    }
}
