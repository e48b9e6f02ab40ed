//! Path normalization and pattern parsing.
//!
//! `NormalizedPath` is the runtime value produced from a request URI's path
//! component; `PathPattern` is its registration-time analogue, classifying
//! each segment as literal, parameter, wildcard, or tail.

mod pattern;

pub use pattern::{PathPattern, PatternSegment};

use crate::error::{RelicError, Result};

/// A request path, split into normalized segments.
///
/// Normalization: leading/trailing slashes are discarded, empty segments
/// (from repeated slashes) are collapsed, and percent-decoding is applied
/// to each segment. Equality is segment-wise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedPath {
    segments: Vec<String>,
}

impl NormalizedPath {
    /// Parse a raw request path (no query string) into a `NormalizedPath`.
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(percent_decode)
            .collect();
        Self { segments }
    }

    /// Build a `NormalizedPath` directly from already-decoded segments.
    /// Used internally by the trie to materialize `matched`/`remaining` slices.
    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Render back to a `/`-joined path. `/` for the root.
    pub fn to_path_string(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut out = String::with_capacity(self.segments.iter().map(|s| s.len() + 1).sum());
        for s in &self.segments {
            out.push('/');
            out.push_str(s);
        }
        out
    }

    /// Slice of the remaining segments starting at `offset`, used to build
    /// the `remaining` path after a tail-wildcard match consumes a prefix.
    pub fn suffix(&self, offset: usize) -> NormalizedPath {
        NormalizedPath::from_segments(self.segments[offset.min(self.segments.len())..].to_vec())
    }
}

/// Percent-decode a single path segment. Malformed escapes are passed through
/// byte-for-byte rather than rejected — the router does not adjudicate wire
/// validity, only segment equality.
fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| segment.to_string())
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Parse a registration-time route pattern into a `PathPattern`.
///
/// Percent-decoding is never applied to pattern segments: `/:name` and `/*`
/// are syntax, not literal text to decode.
pub fn parse_pattern(raw: &str) -> Result<PathPattern> {
    pattern::parse(raw).map_err(|_| RelicError::TailNotFinal {
        pattern: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_repeated_and_surrounding_slashes() {
        let p = NormalizedPath::parse("//users//42/");
        assert_eq!(p.segments(), &["users", "42"]);
    }

    #[test]
    fn root_path_has_no_segments() {
        assert!(NormalizedPath::parse("/").is_root());
        assert!(NormalizedPath::parse("").is_root());
    }

    #[test]
    fn percent_decodes_literal_segments() {
        let p = NormalizedPath::parse("/hello%20world/a%2Fb");
        assert_eq!(p.segments(), &["hello world", "a/b"]);
    }

    #[test]
    fn equality_is_segment_wise() {
        assert_eq!(NormalizedPath::parse("/a/b"), NormalizedPath::parse("/a/b/"));
        assert_ne!(NormalizedPath::parse("/a/b"), NormalizedPath::parse("/a/c"));
    }

    #[test]
    fn suffix_slices_from_offset() {
        let p = NormalizedPath::parse("/a/b/c/d");
        assert_eq!(p.suffix(2).to_path_string(), "/c/d");
        assert_eq!(p.suffix(4).to_path_string(), "/");
    }
}
