//! Path-segment glob matching for namespace listings.
//!
//! Patterns are matched against full relative paths. Within one path
//! segment:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `*` | any run of characters except `/` |
//! | `{a,b,c}` | any one of the listed alternatives |
//! | anything else | itself |
//!
//! ```text
//! projects/p1/brains/*/resource.*         → every brain of p1
//! projects/p1/brains/b1/sessions/{s1,s2}/* → files of two sessions
//! ```

use globset::{GlobBuilder, GlobMatcher};

use super::{NamespaceError, NamespaceResult};

const META_CHARS: [char; 5] = ['*', '?', '[', '{', '}'];

/// Compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pattern: String,
    matcher: GlobMatcher,
}

impl PathPattern {
    /// Compile a pattern. `*` never crosses a `/`.
    pub fn new(pattern: &str) -> NamespaceResult<Self> {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .backslash_escape(false)
            .build()
            .map_err(|e| NamespaceError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            pattern: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    /// Anchored match against a relative path.
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }

    /// Leading directory segments free of wildcards.
    ///
    /// Listing under this prefix is enough to see every possible match.
    pub fn literal_prefix(&self) -> String {
        let segments: Vec<&str> = self.pattern.split('/').collect();
        let literal: Vec<&str> = segments
            .iter()
            .take(segments.len().saturating_sub(1))
            .take_while(|segment| !segment.contains(META_CHARS))
            .copied()
            .collect();
        literal.join("/")
    }

    /// Returns true if only the final segment can contain wildcards.
    ///
    /// Such a pattern only matches direct children of
    /// [`literal_prefix`](Self::literal_prefix).
    pub fn has_literal_directory(&self) -> bool {
        match self.pattern.rsplit_once('/') {
            Some((directory, _)) => !directory.contains(META_CHARS),
            None => true,
        }
    }

    /// Get the original pattern string.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// Returns true if `segment` contains glob syntax.
pub fn is_pattern(segment: &str) -> bool {
    segment.contains(META_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_stays_within_segment() {
        let p = PathPattern::new("projects/*/resource.*").unwrap();
        assert!(p.matches("projects/p1/resource.0000000000000001"));
        assert!(!p.matches("projects/p1/brains/b1/resource.0000000000000001"));
    }

    #[test]
    fn test_brace_alternation() {
        let p = PathPattern::new("sessions/{s1,s2}/resource.*").unwrap();
        assert!(p.matches("sessions/s1/resource.1"));
        assert!(p.matches("sessions/s2/resource.1"));
        assert!(!p.matches("sessions/s3/resource.1"));
    }

    #[test]
    fn test_match_is_anchored() {
        let p = PathPattern::new("projects/p1/resource.*").unwrap();
        assert!(!p.matches("x/projects/p1/resource.1"));
        assert!(!p.matches("projects/p10/resource.1"));
    }

    #[test]
    fn test_literal_prefix() {
        let p = PathPattern::new("projects/p1/brains/*/resource.*").unwrap();
        assert_eq!(p.literal_prefix(), "projects/p1/brains");

        let p = PathPattern::new("projects/p1/brains/b1/resource.*").unwrap();
        assert_eq!(p.literal_prefix(), "projects/p1/brains/b1");

        let p = PathPattern::new("*/p1/resource.*").unwrap();
        assert_eq!(p.literal_prefix(), "");
    }

    #[test]
    fn test_literal_directory() {
        let p = PathPattern::new("projects/p1/brains/b1/resource.*").unwrap();
        assert!(p.has_literal_directory());
        assert!(PathPattern::new("resource.*").unwrap().has_literal_directory());

        let p = PathPattern::new("projects/p1/brains/*/resource.*").unwrap();
        assert!(!p.has_literal_directory());
        let p = PathPattern::new("projects/{p1,p2}/resource.*").unwrap();
        assert!(!p.has_literal_directory());
    }

    #[test]
    fn test_unclosed_brace_is_rejected() {
        let err = PathPattern::new("projects/{p1,p2/resource.*").unwrap_err();
        assert!(matches!(err, NamespaceError::InvalidPattern { .. }));
    }

    #[test]
    fn test_is_pattern() {
        assert!(is_pattern("*"));
        assert!(is_pattern("{a,b}"));
        assert!(!is_pattern("brain-1"));
    }
}
