//! Creation deny policy.
//!
//! Deny lists are ordered shell-style globs matched against a base name only.
//! Matching is a pure predicate: the first hit wins and order has no other
//! effect.

use glob::{MatchOptions, Pattern};
use thiserror::Error;

/// A deny pattern that does not compile.
#[derive(Debug, Error)]
#[error("malformed deny pattern {pattern:?}: {source}")]
pub struct DenyError {
    pub pattern: String,
    #[source]
    pub source: glob::PatternError,
}

/// Separator handling is strict so that `*` never spans a `/`. Base names
/// have none, but the options keep the match honest if one slips through.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Returns true if any pattern matches `base_name`.
///
/// Patterns are compiled at the point of matching, so a malformed pattern in
/// a freshly reloaded config shows up as an error on the first request that
/// reaches it rather than as a silent non-match.
pub fn matches<S: AsRef<str>>(patterns: &[S], base_name: &str) -> Result<bool, DenyError> {
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let compiled = Pattern::new(pattern).map_err(|source| DenyError {
            pattern: pattern.to_string(),
            source,
        })?;
        if compiled.matches_with(base_name, MATCH_OPTIONS) {
            return Ok(true);
        }
    }
    Ok(false)
}
