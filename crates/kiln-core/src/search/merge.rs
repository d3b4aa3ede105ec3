//! Order-independent merging of search results.
//!
//! One result is kept per `group:name`. Candidates whose version mentions
//! snapshot, javadoc or source builds are dropped. Among the rest, concrete
//! parseable versions beat the latest placeholder, which beats unparseable
//! versions; then the higher version wins; then the lower source label.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use kiln_schema::{SearchResult, VersionSpec};

const REJECTED_MARKERS: [&str; 3] = ["snapshot", "javadoc", "source"];

/// Whether a candidate may take part in the merge at all.
pub fn is_acceptable(result: &SearchResult) -> bool {
    let version = result.coordinate.version().to_string().to_lowercase();
    !REJECTED_MARKERS.iter().any(|m| version.contains(m))
}

fn rank(result: &SearchResult) -> u8 {
    match result.coordinate.version() {
        VersionSpec::Exact(v) if v.is_parseable() => 2,
        VersionSpec::Latest => 1,
        _ => 0,
    }
}

/// Total order over candidates for one key; the greatest is kept.
fn compare(a: &SearchResult, b: &SearchResult) -> Ordering {
    rank(a)
        .cmp(&rank(b))
        .then_with(|| match (a.coordinate.version(), b.coordinate.version()) {
            (VersionSpec::Exact(x), VersionSpec::Exact(y)) => x.cmp(y),
            _ => Ordering::Equal,
        })
        .then_with(|| b.source.cmp(&a.source))
        .then_with(|| b.coordinate.to_string().cmp(&a.coordinate.to_string()))
}

/// Running merged view of results from several backends.
#[derive(Debug, Clone, Default)]
pub struct MergedResults {
    by_key: BTreeMap<String, SearchResult>,
}

impl MergedResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `results` into the view.
    pub fn merge(&mut self, results: impl IntoIterator<Item = SearchResult>) {
        for candidate in results.into_iter().filter(is_acceptable) {
            match self.by_key.get(&candidate.key()) {
                Some(kept) if compare(&candidate, kept) != Ordering::Greater => {}
                _ => {
                    self.by_key.insert(candidate.key(), candidate);
                }
            }
        }
    }

    /// Merged results ordered by `group:name`.
    pub fn results(&self) -> Vec<SearchResult> {
        self.by_key.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_key.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_schema::Coordinate;

    fn result(coordinate: &str, source: &str) -> SearchResult {
        SearchResult::new(coordinate.parse::<Coordinate>().unwrap(), source)
    }

    fn merged(batches: &[Vec<SearchResult>]) -> Vec<String> {
        let mut m = MergedResults::new();
        for batch in batches {
            m.merge(batch.clone());
        }
        m.results()
            .iter()
            .map(|r| format!("{} @{}", r.coordinate, r.source))
            .collect()
    }

    #[test]
    fn test_snapshot_rejected_highest_wins() {
        let local = vec![result("group.a:foo:1.0", "local")];
        let public = vec![
            result("group.a:foo:2.0-SNAPSHOT", "central"),
            result("group.a:foo:1.9", "central"),
        ];
        assert_eq!(merged(&[local, public]), ["group.a:foo:1.9 @central"]);
    }

    #[test]
    fn test_every_arrival_order_agrees() {
        let batches = [
            vec![result("g:a:1.0", "local"), result("g:b:LATEST", "local")],
            vec![result("g:a:1.0", "corp"), result("g:b:0.5", "central")],
            vec![result("g:a:1.0-sources", "x"), result("g:b:weird", "z")],
        ];
        let expected = merged(&batches);
        assert_eq!(expected, ["g:a:1.0 @corp", "g:b:0.5 @central"]);

        for order in [[0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
            let shuffled: Vec<_> = order.iter().map(|&i| batches[i].clone()).collect();
            assert_eq!(merged(&shuffled), expected);
        }
    }

    #[test]
    fn test_placeholder_beats_unparseable() {
        let batches = [vec![result("g:a:weird", "a")], vec![result("g:a:LATEST", "b")]];
        assert_eq!(merged(&batches), ["g:a:LATEST @b"]);
    }

    #[test]
    fn test_javadoc_only_candidates_vanish() {
        assert!(merged(&[vec![result("g:a:1.0-javadoc", "a")]]).is_empty());
    }
}
