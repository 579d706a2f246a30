//! Response-body link rewriting.
//!
//! Appends the current session ID as a query argument to local anchor
//! hrefs so the ID survives navigation without cookies. The pass is
//! byte-oriented regex matching, not HTML parsing; malformed markup is
//! forwarded untouched. Case is ignored for tag and attribute names.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::bytes::{Captures, Regex};

use crate::exclude::ExcludeList;

/// Complete anchor tags: opener up to the href value, the pre-fragment
/// URL, and the remainder of the tag (including any fragment).
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r##"(?si)(<a[^>]*href=")([^"#]+)([^"]*"[^>]*>)"##).expect("anchor pattern")
});

/// URLs that start with a URI scheme point elsewhere.
static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+:").expect("scheme pattern"));

/// Rewrite each eligible anchor in `body` to carry `<name>=<sid>`.
///
/// Skipped: URLs with a scheme, excluded URLs, and URLs that are not
/// valid UTF-8. The argument joins with `&` when the URL already has a
/// query string, `?` otherwise; a fragment stays behind the argument.
/// Each anchor is rewritten exactly once.
///
/// Callers suppress the whole pass for empty sessions; see
/// [`middleware`](crate::middleware).
pub fn append_sid<'a>(
    body: &'a [u8],
    name: &str,
    sid: &str,
    exclude: &ExcludeList,
) -> Cow<'a, [u8]> {
    let argument = format!("{name}={sid}");

    HREF_RE.replace_all(body, |caps: &Captures<'_>| {
        let url = &caps[2];
        let eligible = match std::str::from_utf8(url) {
            Ok(url) if SCHEME_RE.is_match(url.as_bytes()) => false,
            Ok(url) => !exclude.is_excluded(url),
            Err(_) => false,
        };
        if !eligible {
            return caps[0].to_vec();
        }

        let joiner: &[u8] = if url.contains(&b'?') { b"&" } else { b"?" };
        let mut replaced =
            Vec::with_capacity(caps[0].len() + joiner.len() + argument.len());
        replaced.extend_from_slice(&caps[1]);
        replaced.extend_from_slice(url);
        replaced.extend_from_slice(joiner);
        replaced.extend_from_slice(argument.as_bytes());
        replaced.extend_from_slice(&caps[3]);
        replaced
    })
}
