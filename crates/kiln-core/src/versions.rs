//! Version discovery across repositories.
//!
//! Public methods never fail: a lookup that could not complete is logged
//! and reported as an empty result. [`VersionResolver::resolve_versions`]
//! keeps the distinction for callers that need it.

use std::sync::Arc;

use kiln_schema::{Coordinate, DiscoveredVersion, Repository, Version, VersionRangeResult};

use crate::client::{ClientError, RepositoryClient};
use crate::outcome::Resolution;
use crate::registry::RepositoryRegistry;

/// Discovers the versions of a coordinate.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    client: RepositoryClient,
    registry: Arc<RepositoryRegistry>,
}

impl VersionResolver {
    pub fn new(client: RepositoryClient, registry: Arc<RepositoryRegistry>) -> Self {
        Self { client, registry }
    }

    pub fn client(&self) -> &RepositoryClient {
        &self.client
    }

    /// Versions matching the coordinate's range, newest first.
    ///
    /// Queries `target` alone, or every registered repository in order.
    /// A repository only contributes versions its snapshot policy serves.
    /// After a successful query the coordinate's cached listings are
    /// removed so the next query fetches fresh ones.
    pub async fn resolve_versions(
        &self,
        coordinate: &Coordinate,
        target: Option<&Repository>,
    ) -> Resolution<VersionRangeResult> {
        let repositories = match target {
            Some(r) => vec![r.clone()],
            None => self.registry.list(false),
        };
        let wanted = coordinate.version();

        let mut result = VersionRangeResult::new();
        let mut completed = false;
        let mut last_error: Option<ClientError> = None;

        for repository in &repositories {
            match self.client.list_versions(repository, coordinate).await {
                Resolution::Found(versions) => {
                    completed = true;
                    for v in versions {
                        if wanted.matches(&v) && repository.policy.allows(v.is_snapshot()) {
                            result.insert(v, &repository.id);
                        }
                    }
                }
                Resolution::NotFound => completed = true,
                Resolution::Failed(e) => {
                    tracing::warn!(
                        "Listing {} in {} failed: {e}",
                        coordinate.key(),
                        repository.id
                    );
                    last_error = Some(e);
                }
            }
        }

        if !result.is_empty() {
            self.clear_cached_listings(coordinate).await;
            tracing::debug!("{} has {} matching versions", coordinate, result.len());
            return Resolution::Found(result);
        }
        match last_error {
            Some(e) if !completed => Resolution::Failed(e),
            _ => Resolution::NotFound,
        }
    }

    async fn clear_cached_listings(&self, coordinate: &Coordinate) {
        let Ok(dir) = self.client.cache().metadata_dir(coordinate) else {
            return;
        };
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("maven-metadata") && name.ends_with(".xml") {
                if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                    tracing::debug!("Could not remove {}: {e}", entry.path().display());
                }
            }
        }
    }

    /// Matching versions across all repositories; empty when none or on failure.
    pub async fn find_versions(&self, coordinate: &Coordinate) -> VersionRangeResult {
        self.resolve_versions(coordinate, None)
            .await
            .or_log(&format!("Versions of {coordinate}"))
            .unwrap_or_default()
    }

    /// Matching versions in one repository; empty when none or on failure.
    pub async fn find_versions_in(
        &self,
        coordinate: &Coordinate,
        repository: &Repository,
    ) -> VersionRangeResult {
        self.resolve_versions(coordinate, Some(repository))
            .await
            .or_log(&format!("Versions of {coordinate} in {}", repository.id))
            .unwrap_or_default()
    }

    /// Newest matching release across all repositories. Snapshots never win.
    pub async fn find_latest_version(&self, coordinate: &Coordinate) -> Option<Version> {
        self.find_latest(coordinate, None).await.map(|d| d.version)
    }

    /// Newest matching release and the repository that listed it.
    pub async fn find_latest(
        &self,
        coordinate: &Coordinate,
        target: Option<&Repository>,
    ) -> Option<DiscoveredVersion> {
        let result = self
            .resolve_versions(coordinate, target)
            .await
            .or_log(&format!("Latest version of {coordinate}"))?;
        result.latest_release().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkSettings;
    use crate::layout::LocalRepository;
    use kiln_schema::{RepositoryKind, SnapshotPolicy};

    const LISTING: &str = "<metadata><versioning><versions>\
        <version>1.0</version><version>2.0-SNAPSHOT</version><version>1.9</version>\
        </versions></versioning></metadata>";

    fn resolver(cache: &std::path::Path) -> VersionResolver {
        let client =
            RepositoryClient::new(LocalRepository::new(cache), &NetworkSettings::default()).unwrap();
        VersionResolver::new(client, Arc::new(RepositoryRegistry::local_only(cache)))
    }

    fn coordinate(version: &str) -> Coordinate {
        format!("group.a:foo:{version}").parse().unwrap()
    }

    #[tokio::test]
    async fn test_latest_skips_snapshots_and_clears_listing() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/group/a/foo/maven-metadata.xml")
            .with_body(LISTING)
            .expect(2)
            .create_async()
            .await;
        let cache = tempfile::tempdir().unwrap();
        let resolver = resolver(cache.path());
        let repo = Repository::new("remote", RepositoryKind::PublicRegistry, server.url())
            .with_policy(SnapshotPolicy::Both);

        let latest = resolver
            .find_latest(&coordinate("[0,)"), Some(&repo))
            .await
            .unwrap();
        assert_eq!(latest.version, Version::new("1.9"));
        assert_eq!(latest.repository, "remote");

        let listing = resolver.client().cache().metadata_path(&coordinate("[0,)"), "remote").unwrap();
        assert!(!listing.exists());

        // Listing was removed, so the second query goes back to the server
        let all = resolver.find_versions_in(&coordinate("[0,)"), &repo).await;
        assert_eq!(all.len(), 3);
        assert_eq!(all.entries()[0].version, Version::new("2.0-SNAPSHOT"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_latest_version_from_installed_cache() {
        let cache = tempfile::tempdir().unwrap();
        let local = LocalRepository::new(cache.path());
        let src = cache.path().join("src.jar");
        std::fs::write(&src, b"jar").unwrap();
        for v in ["1.0", "1.2", "2.0-SNAPSHOT", "3.0"] {
            local.install(&coordinate("1.0"), &Version::new(v), &src).unwrap();
        }

        let resolver = resolver(cache.path());
        assert_eq!(
            resolver.find_latest_version(&coordinate("[1.0,3.0)")).await,
            Some(Version::new("1.2"))
        );
        assert_eq!(
            resolver.find_latest_version(&coordinate("[0,)")).await,
            Some(Version::new("3.0"))
        );
        let missing: Coordinate = "group.a:bar:[0,)".parse().unwrap();
        assert_eq!(resolver.find_latest_version(&missing).await, None);
    }

    #[tokio::test]
    async fn test_release_policy_filters_snapshots() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/group/a/foo/maven-metadata.xml")
            .with_body(LISTING)
            .create_async()
            .await;
        let cache = tempfile::tempdir().unwrap();
        let repo = Repository::new("remote", RepositoryKind::PublicRegistry, server.url());
        let found = resolver(cache.path())
            .find_versions_in(&coordinate("[1.5,)"), &repo)
            .await;
        let versions: Vec<_> = found.entries().iter().map(|d| d.version.as_str()).collect();
        assert_eq!(versions, ["1.9"]);
    }

    #[tokio::test]
    async fn test_unreachable_repository_is_failure_internally() {
        let cache = tempfile::tempdir().unwrap();
        let repo = Repository::new("dead", RepositoryKind::PublicRegistry, "http://127.0.0.1:9");
        let resolver = resolver(cache.path());
        assert!(
            resolver
                .resolve_versions(&coordinate("[0,)"), Some(&repo))
                .await
                .is_failed()
        );
        assert!(resolver.find_versions_in(&coordinate("[0,)"), &repo).await.is_empty());
        assert_eq!(resolver.find_latest(&coordinate("[0,)"), Some(&repo)).await, None);
    }
}
