//! Version listings and installed-artifact records.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::coordinate::Coordinate;
use crate::version::Version;

/// Separator used when persisting lists of paths or type names.
pub const PATH_LIST_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// A version found in a specific repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredVersion {
    /// The version.
    pub version: Version,
    /// Identifier of the repository that listed it.
    pub repository: String,
}

/// Discovered versions, newest first, each tagged with its repository.
pub type VersionSet = [DiscoveredVersion];

/// Discovered versions of one coordinate, ordered newest first.
///
/// When several repositories list the same version, the first repository
/// (in registry order) is kept so callers can re-target it for resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRangeResult {
    versions: Vec<DiscoveredVersion>,
}

impl VersionRangeResult {
    /// An empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a version found in `repository`, keeping newest-first order.
    /// Versions already present keep their first repository.
    pub fn insert(&mut self, version: Version, repository: &str) {
        if self.versions.iter().any(|d| d.version == version) {
            return;
        }
        let pos = self
            .versions
            .iter()
            .position(|d| d.version < version)
            .unwrap_or(self.versions.len());
        self.versions.insert(
            pos,
            DiscoveredVersion {
                version,
                repository: repository.to_string(),
            },
        );
    }

    /// Versions with their repository, newest first.
    pub fn entries(&self) -> &VersionSet {
        &self.versions
    }

    /// Repository that supplied `version`.
    pub fn repository_for(&self, version: &Version) -> Option<&str> {
        self.versions
            .iter()
            .find(|d| &d.version == version)
            .map(|d| d.repository.as_str())
    }

    /// Newest version that is not a snapshot.
    pub fn latest_release(&self) -> Option<&DiscoveredVersion> {
        self.versions.iter().find(|d| !d.version.is_snapshot())
    }

    /// Number of versions.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether no versions were found.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Type names the user opted out of for one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionFilter(BTreeSet<String>);

impl ExclusionFilter {
    /// An empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `type_name` is excluded.
    pub fn contains(&self, type_name: &str) -> bool {
        self.0.contains(type_name)
    }

    /// Exclude `type_name`. Returns `false` if it was already excluded.
    pub fn insert(&mut self, type_name: impl Into<String>) -> bool {
        self.0.insert(type_name.into())
    }

    /// Stop excluding `type_name`. Returns `true` if it was excluded.
    pub fn remove(&mut self, type_name: &str) -> bool {
        self.0.remove(type_name)
    }

    /// Excluded names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of excluded names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is excluded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Union with another filter.
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).cloned().collect())
    }
}

impl<S: Into<String>> FromIterator<S> for ExclusionFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// A package installed into the shared cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArtifact {
    /// The coordinate, pinned to the installed version.
    pub coordinate: Coordinate,
    /// Installed primary archive.
    pub path: PathBuf,
    /// Installed secondary variants keyed by classifier.
    #[serde(default)]
    pub classified: BTreeMap<String, PathBuf>,
    /// Installed dependency archives, excluding the artifact itself.
    #[serde(default)]
    pub dependencies: Vec<PathBuf>,
    /// Types the user opted out of.
    #[serde(default)]
    pub filter: ExclusionFilter,
}

impl ResolvedArtifact {
    /// A freshly installed artifact without dependencies or filter.
    pub fn new(coordinate: Coordinate, path: PathBuf) -> Self {
        Self {
            coordinate,
            path,
            classified: BTreeMap::new(),
            dependencies: Vec::new(),
            filter: ExclusionFilter::new(),
        }
    }

    /// The primary archive followed by its dependencies.
    pub fn class_path(&self) -> Vec<PathBuf> {
        std::iter::once(self.path.clone())
            .chain(self.dependencies.iter().cloned())
            .collect()
    }
}

/// Persisted artifact record: `path`, `dependencies`, `filter`.
///
/// List fields are joined with [`PATH_LIST_SEPARATOR`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Installed primary archive.
    pub path: String,
    /// Joined dependency archive paths.
    #[serde(default)]
    pub dependencies: String,
    /// Joined excluded type names.
    #[serde(default)]
    pub filter: String,
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items
        .collect::<Vec<_>>()
        .join(&PATH_LIST_SEPARATOR.to_string())
}

fn split(joined: &str) -> impl Iterator<Item = &str> {
    joined.split(PATH_LIST_SEPARATOR).filter(|s| !s.is_empty())
}

impl From<&ResolvedArtifact> for ArtifactRecord {
    fn from(artifact: &ResolvedArtifact) -> Self {
        Self {
            path: artifact.path.to_string_lossy().into_owned(),
            dependencies: join(artifact.dependencies.iter().filter_map(|p| p.to_str())),
            filter: join(artifact.filter.iter()),
        }
    }
}

impl ArtifactRecord {
    /// Rebuild the artifact stored under `coordinate`.
    ///
    /// The record does not carry classifier variants, so `classified` comes
    /// back empty; stores fill it from the installed files.
    pub fn to_artifact(&self, coordinate: Coordinate) -> ResolvedArtifact {
        ResolvedArtifact {
            coordinate,
            path: PathBuf::from(&self.path),
            classified: BTreeMap::new(),
            dependencies: split(&self.dependencies).map(PathBuf::from).collect(),
            filter: split(&self.filter).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionSpec;

    #[test]
    fn test_range_result_orders_and_keeps_first_repo() {
        let mut result = VersionRangeResult::new();
        result.insert(Version::new("1.0"), "local");
        result.insert(Version::new("3.2"), "central");
        result.insert(Version::new("2.0-SNAPSHOT"), "snapshots");
        result.insert(Version::new("3.2.0"), "corp");

        let versions: Vec<&str> = result.entries().iter().map(|d| d.version.as_str()).collect();
        assert_eq!(versions, vec!["3.2", "2.0-SNAPSHOT", "1.0"]);
        assert_eq!(result.repository_for(&Version::new("3.2")), Some("central"));
        assert_eq!(result.latest_release().unwrap().version, Version::new("3.2"));
    }

    #[test]
    fn test_record_round_trip() {
        let coordinate = Coordinate::new("org.x", "y", VersionSpec::Exact(Version::new("1.0")));
        let mut artifact = ResolvedArtifact::new(coordinate.clone(), PathBuf::from("/c/y-1.0.jar"));
        artifact.dependencies = vec![PathBuf::from("/c/a.jar"), PathBuf::from("/c/b.jar")];
        artifact.filter.insert("org.x.Hidden");
        artifact.filter.insert("org.x.Broken");

        let record = ArtifactRecord::from(&artifact);
        assert_eq!(record.dependencies, ["/c/a.jar", "/c/b.jar"].join(&PATH_LIST_SEPARATOR.to_string()));

        let back = record.to_artifact(coordinate);
        assert!(back.classified.is_empty());
        assert_eq!(back.dependencies, artifact.dependencies);
        assert_eq!(back.filter, artifact.filter);
        assert_eq!(back.class_path().len(), 3);
    }

    #[test]
    fn test_empty_record_lists() {
        let record = ArtifactRecord {
            path: "/c/y.jar".into(),
            ..ArtifactRecord::default()
        };
        let coordinate = Coordinate::new("org.x", "y", VersionSpec::Latest);
        let artifact = record.to_artifact(coordinate);
        assert!(artifact.dependencies.is_empty());
        assert!(artifact.filter.is_empty());
    }
}
