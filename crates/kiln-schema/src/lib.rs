//! Shared types and persisted record formats for kiln.

pub mod coordinate;
pub mod exploration;
pub mod repository;
pub mod resolution;
pub mod search;
pub mod version;

// Re-exports
pub use coordinate::{Coordinate, CoordinateError, is_path_segment};
pub use exploration::{EntryOutcome, ExplorationEntry, ExplorationReport};
pub use repository::{Credentials, Repository, RepositoryKind, RepositoryRecord, SnapshotPolicy};
pub use resolution::{
    ArtifactRecord, DiscoveredVersion, ExclusionFilter, PATH_LIST_SEPARATOR, ResolvedArtifact,
    VersionRangeResult, VersionSet,
};
pub use search::SearchResult;
pub use version::{LATEST, Version, VersionError, VersionRange, VersionSpec};
