//! Search candidates reported by search backends.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::coordinate::Coordinate;

/// One candidate package reported by a search backend.
///
/// Equality and hashing use `(group, name)` only: backends report the same
/// package at different or placeholder versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Candidate coordinate; the version may be the latest placeholder.
    pub coordinate: Coordinate,
    /// Label of the backend or repository that reported it.
    pub source: String,
}

impl SearchResult {
    /// Create a new candidate.
    pub fn new(coordinate: Coordinate, source: impl Into<String>) -> Self {
        Self {
            coordinate,
            source: source.into(),
        }
    }

    /// Deduplication key: `group:name`.
    pub fn key(&self) -> String {
        self.coordinate.key()
    }
}

impl PartialEq for SearchResult {
    fn eq(&self, other: &Self) -> bool {
        self.coordinate.group() == other.coordinate.group()
            && self.coordinate.name() == other.coordinate.name()
    }
}

impl Eq for SearchResult {}

impl Hash for SearchResult {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.coordinate.group().hash(state);
        self.coordinate.name().hash(state);
    }
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.coordinate, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{Version, VersionSpec};
    use std::collections::HashSet;

    #[test]
    fn test_identity_ignores_version_and_source() {
        let a = SearchResult::new(
            Coordinate::new("g", "foo", VersionSpec::Exact(Version::new("1.0"))),
            "local",
        );
        let b = SearchResult::new(Coordinate::new("g", "foo", VersionSpec::Latest), "central");
        let c = SearchResult::new(Coordinate::new("g", "bar", VersionSpec::Latest), "central");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<SearchResult> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
