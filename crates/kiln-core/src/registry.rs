//! Ordered view of the configured repositories.
//!
//! Presets come first, then user repositories in registration order.

use std::path::{Path, PathBuf};

use kiln_schema::{Repository, RepositoryKind, RepositoryRecord, SnapshotPolicy};
use thiserror::Error;

/// Identifier of the local-cache repository.
pub const LOCAL_ID: &str = "local";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Repository '{0}' is already registered")]
    Duplicate(String),
}

/// Build a `file://` URL for a local directory.
pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Repository presets followed by user-defined repositories.
#[derive(Debug, Clone)]
pub struct RepositoryRegistry {
    cache_root: PathBuf,
    presets: Vec<Repository>,
    user: Vec<Repository>,
}

impl RepositoryRegistry {
    /// Registry holding only the presets, with the local cache at `cache_root`.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        let cache_root = cache_root.into();
        let presets = vec![
            Repository::new(LOCAL_ID, RepositoryKind::LocalCache, file_url(&cache_root))
                .with_policy(SnapshotPolicy::Both),
            Repository::new(
                "central",
                RepositoryKind::PublicRegistry,
                "https://repo1.maven.org/maven2",
            ),
            Repository::new(
                "google",
                RepositoryKind::PublicRegistry,
                "https://maven.google.com",
            ),
            Repository::new(
                "sonatype-snapshots",
                RepositoryKind::PublicRegistry,
                "https://oss.sonatype.org/content/repositories/snapshots",
            )
            .with_policy(SnapshotPolicy::Snapshots),
        ];
        Self {
            cache_root,
            presets,
            user: Vec::new(),
        }
    }

    /// Registry with no presets besides the local cache.
    #[cfg(test)]
    pub fn local_only(cache_root: impl Into<PathBuf>) -> Self {
        let mut registry = Self::new(cache_root);
        registry.presets.truncate(1);
        registry
    }

    /// Registry with presets plus `records` from configuration.
    ///
    /// Records whose id collides with an earlier repository are skipped.
    pub fn with_records(
        cache_root: impl Into<PathBuf>,
        records: impl IntoIterator<Item = RepositoryRecord>,
    ) -> Self {
        let mut registry = Self::new(cache_root);
        for record in records {
            if let Err(e) = registry.add(record.into()) {
                tracing::warn!("Ignoring configured repository: {e}");
            }
        }
        registry
    }

    /// Register a user repository.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the id is already taken.
    pub fn add(&mut self, repository: Repository) -> Result<(), RegistryError> {
        if self.iter().any(|r| r.id == repository.id) {
            return Err(RegistryError::Duplicate(repository.id));
        }
        self.user.push(repository);
        Ok(())
    }

    /// Remove a user repository by id. Presets cannot be removed.
    pub fn remove(&mut self, id: &str) -> Option<Repository> {
        let idx = self.user.iter().position(|r| r.id == id)?;
        Some(self.user.remove(idx))
    }

    fn iter(&self) -> impl Iterator<Item = &Repository> {
        self.presets.iter().chain(self.user.iter())
    }

    /// Ordered repositories. With `release_only`, repositories whose id
    /// contains "snapshot" (any case) are left out.
    pub fn list(&self, release_only: bool) -> Vec<Repository> {
        self.iter()
            .filter(|r| !(release_only && r.is_snapshot_repository()))
            .cloned()
            .collect()
    }

    /// Repository with `id`, or a synthetic local-cache repository.
    pub fn resolve_by_id(&self, id: &str) -> Repository {
        self.iter().find(|r| r.id == id).cloned().unwrap_or_else(|| {
            tracing::debug!("Unknown repository '{id}', falling back to the local cache");
            self.local()
        })
    }

    /// The local-cache repository.
    pub fn local(&self) -> Repository {
        Repository::new(
            LOCAL_ID,
            RepositoryKind::LocalCache,
            file_url(&self.cache_root),
        )
        .with_policy(SnapshotPolicy::Both)
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// User repositories in persisted form.
    pub fn user_records(&self) -> Vec<RepositoryRecord> {
        self.user.iter().map(RepositoryRecord::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RepositoryRegistry {
        let mut registry = RepositoryRegistry::new("/cache");
        registry
            .add(Repository::new(
                "corp-releases",
                RepositoryKind::EnterpriseRegistry,
                "https://nexus.corp/releases",
            ))
            .unwrap();
        registry
            .add(Repository::new(
                "corp-SNAPSHOTS",
                RepositoryKind::EnterpriseRegistry,
                "https://nexus.corp/snapshots",
            ))
            .unwrap();
        registry
    }

    #[test]
    fn test_presets_first_then_registration_order() {
        let ids: Vec<_> = registry().list(false).into_iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            [
                "local",
                "central",
                "google",
                "sonatype-snapshots",
                "corp-releases",
                "corp-SNAPSHOTS"
            ]
        );
    }

    #[test]
    fn test_release_only_drops_snapshot_ids() {
        let ids: Vec<_> = registry().list(true).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["local", "central", "google", "corp-releases"]);
    }

    #[test]
    fn test_resolve_by_id_falls_back_to_local() {
        let registry = registry();
        assert_eq!(registry.resolve_by_id("google").kind, RepositoryKind::PublicRegistry);
        let fallback = registry.resolve_by_id("nope");
        assert_eq!(fallback.id, LOCAL_ID);
        assert_eq!(fallback.url, "file:///cache");
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = registry();
        let err = registry
            .add(Repository::new("central", RepositoryKind::PublicRegistry, "x"))
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("central".into()));
        assert_eq!(registry.user_records().len(), 2);
    }
}
