//! Glob masks over office, project, and application identifiers.
//!
//! A [`Mask`] is the single matching predicate used everywhere a wildcard
//! scope appears: revoker-right grants, lock catalogs, and rights catalogs.
//! `*` matches any run of characters (including none), `?` matches exactly
//! one character, and everything else is literal. Matching is
//! case-insensitive and anchored at both ends.
//!
//! The in-memory path calls [`Mask::matches`]; the SQL path binds
//! [`Mask::to_sql_like`] into an `ILIKE ... ESCAPE '\'` clause. Both are
//! derived from the same pattern so they agree.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Matches any run of characters.
pub const MULTI_WILDCARD: char = '*';

/// Matches exactly one character.
pub const SINGLE_WILDCARD: char = '?';

/// Returns `true` if `value` contains either wildcard character.
pub fn contains_wildcard(value: &str) -> bool {
    value.contains(|c: char| c == MULTI_WILDCARD || c == SINGLE_WILDCARD)
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct Mask {
    pattern: String,
    /// `None` when the pattern consists only of `*` and matches everything.
    regex: Option<Regex>,
}

impl Mask {
    /// Compile a mask. A blank pattern is treated as `*`.
    pub fn new(pattern: &str) -> Result<Self, CoreError> {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern.chars().all(|c| c == MULTI_WILDCARD) {
            return Ok(Self::any());
        }

        let mut source = String::with_capacity(pattern.len() + 8);
        source.push_str("(?is)^");
        for c in pattern.chars() {
            match c {
                MULTI_WILDCARD => source.push_str(".*"),
                SINGLE_WILDCARD => source.push('.'),
                other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        source.push('$');

        let regex = Regex::new(&source)
            .map_err(|e| CoreError::InvalidArgument(format!("invalid mask '{pattern}': {e}")))?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex: Some(regex),
        })
    }

    /// The mask that matches every value.
    pub fn any() -> Self {
        Self {
            pattern: MULTI_WILDCARD.to_string(),
            regex: None,
        }
    }

    /// Compile an optional mask; `None` and blank strings mean [`Mask::any`].
    pub fn optional(pattern: Option<&str>) -> Result<Self, CoreError> {
        match pattern {
            Some(p) => Self::new(p),
            None => Ok(Self::any()),
        }
    }

    /// The pattern as written (trimmed).
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Returns `true` if this mask matches every value.
    pub fn is_any(&self) -> bool {
        self.regex.is_none()
    }

    /// Returns `true` if the pattern contains a wildcard.
    pub fn is_wildcard(&self) -> bool {
        contains_wildcard(&self.pattern)
    }

    /// Test a concrete value against the mask.
    pub fn matches(&self, value: &str) -> bool {
        match &self.regex {
            Some(re) => re.is_match(value),
            None => true,
        }
    }

    /// Translate to a PostgreSQL `LIKE` pattern using `\` as the escape
    /// character. Use with `ILIKE` for case-insensitive matching.
    pub fn to_sql_like(&self) -> String {
        let mut like = String::with_capacity(self.pattern.len() + 4);
        for c in self.pattern.chars() {
            match c {
                MULTI_WILDCARD => like.push('%'),
                SINGLE_WILDCARD => like.push('_'),
                '%' | '_' | '\\' => {
                    like.push('\\');
                    like.push(c);
                }
                other => like.push(other),
            }
        }
        like
    }
}

impl Default for Mask {
    fn default() -> Self {
        Self::any()
    }
}

impl PartialEq for Mask {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for Mask {}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl Serialize for Mask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.pattern)
    }
}

impl<'de> Deserialize<'de> for Mask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        Mask::new(&pattern).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Catalog filters
// ---------------------------------------------------------------------------

/// Office / project / application masks for catalog listings.
///
/// For lock catalogs the masks apply to the lock's identifiers. For rights
/// catalogs they apply to the grant's owning office and its stored project
/// and application masks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFilter {
    pub office: Mask,
    pub project: Mask,
    pub application: Mask,
}

impl CatalogFilter {
    /// Build a filter from optional raw masks, argument order matching the
    /// catalog operations (`project`, `application`, `office`).
    pub fn new(
        project: Option<&str>,
        application: Option<&str>,
        office: Option<&str>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            office: Mask::optional(office)?,
            project: Mask::optional(project)?,
            application: Mask::optional(application)?,
        })
    }

    /// Returns `true` if all three masks match.
    pub fn matches(&self, office: &str, project: &str, application: &str) -> bool {
        self.office.matches(office)
            && self.project.matches(project)
            && self.application.matches(application)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(p: &str) -> Mask {
        Mask::new(p).unwrap()
    }

    #[test]
    fn blank_and_star_match_everything() {
        assert!(mask("").is_any());
        assert!(mask("  ").is_any());
        assert!(mask("*").is_any());
        assert!(mask("***").is_any());
        assert!(mask("*").matches(""));
        assert!(mask("*").matches("anything at all"));
    }

    #[test]
    fn literal_mask_is_case_insensitive_and_anchored() {
        let m = mask("lockRelease");
        assert!(m.matches("lockRelease"));
        assert!(m.matches("LOCKRELEASE"));
        assert!(!m.matches("lockRelease2"));
        assert!(!m.matches("xlockRelease"));
        assert!(!m.is_wildcard());
    }

    #[test]
    fn star_matches_runs() {
        let m = mask("lock*");
        assert!(m.matches("lock"));
        assert!(m.matches("lockRelease"));
        assert!(!m.matches("unlock"));

        let m = mask("*_release");
        assert!(m.matches("test_release"));
        assert!(!m.matches("test_releases"));
    }

    #[test]
    fn question_mark_matches_exactly_one() {
        let m = mask("SP?");
        assert!(m.matches("SPK"));
        assert!(m.matches("spa"));
        assert!(!m.matches("SP"));
        assert!(!m.matches("SPKX"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let m = mask("a.b+(c)");
        assert!(m.matches("a.b+(c)"));
        assert!(!m.matches("axb+(c)"));
        assert!(!m.matches("a.bb(c)"));
    }

    #[test]
    fn sql_like_translation() {
        assert_eq!(mask("lock*").to_sql_like(), "lock%");
        assert_eq!(mask("SP?").to_sql_like(), "SP_");
        assert_eq!(mask("*").to_sql_like(), "%");
        assert_eq!(mask("test_release").to_sql_like(), "test\\_release");
        assert_eq!(mask("100%").to_sql_like(), "100\\%");
        assert_eq!(mask("a\\b").to_sql_like(), "a\\\\b");
    }

    #[test]
    fn optional_none_is_any() {
        assert!(Mask::optional(None).unwrap().is_any());
        assert_eq!(Mask::optional(Some("SPK")).unwrap().as_str(), "SPK");
    }

    #[test]
    fn mask_serializes_as_pattern_string() {
        let json = serde_json::to_string(&mask("lock*")).unwrap();
        assert_eq!(json, r#""lock*""#);
        let back: Mask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mask("lock*"));
    }

    #[test]
    fn catalog_filter_combines_masks() {
        let filter = CatalogFilter::new(Some("lock*"), Some("test_*"), Some("SPK")).unwrap();
        assert!(filter.matches("SPK", "lockRelease", "test_release"));
        assert!(!filter.matches("SWT", "lockRelease", "test_release"));
        assert!(!filter.matches("SPK", "other", "test_release"));
        assert!(!filter.matches("SPK", "lockRelease", "prod"));
    }

    #[test]
    fn default_filter_matches_everything() {
        let filter = CatalogFilter::default();
        assert!(filter.matches("SPK", "p", "a"));
    }

    #[test]
    fn contains_wildcard_detects_both_characters() {
        assert!(contains_wildcard("a*"));
        assert!(contains_wildcard("a?"));
        assert!(!contains_wildcard("abc"));
    }
}
