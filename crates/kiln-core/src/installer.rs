//! Two-phase artifact installation.
//!
//! Artifacts resolve into a private scratch cache first. Only files that
//! resolved completely are promoted into the shared cache, and the returned
//! path is looked up in the shared cache afterwards. The scratch cache is
//! removed on every exit path.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_schema::{Coordinate, Repository, ResolvedArtifact, Version};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::client::RepositoryClient;
use crate::dependencies::DependencyResolver;
use crate::layout::{self, CHECKSUM_EXTENSIONS, LocalRepository};
use crate::outcome::Resolution;
use crate::registry::RepositoryRegistry;
use crate::reporter::{NullReporter, Reporter};
use crate::versions::VersionResolver;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("No release of {0} is available")]
    NoVersion(String),

    #[error("{0} was not installed into the shared cache")]
    NotInstalled(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// One resolved file waiting in the scratch cache.
struct Staged {
    coordinate: Coordinate,
    file: PathBuf,
    sidecars: Vec<(&'static str, PathBuf)>,
}

/// Installs artifacts into the shared cache.
#[derive(Clone)]
pub struct ArtifactInstaller {
    client: RepositoryClient,
    versions: VersionResolver,
    registry: Arc<RepositoryRegistry>,
    scratch_root: PathBuf,
    lock: Arc<Mutex<()>>,
    reporter: Arc<dyn Reporter>,
}

impl ArtifactInstaller {
    /// `client` must be bound to the shared cache.
    pub fn new(
        client: RepositoryClient,
        registry: Arc<RepositoryRegistry>,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            versions: VersionResolver::new(client.clone(), registry.clone()),
            client,
            registry,
            scratch_root: scratch_root.into(),
            lock: Arc::new(Mutex::new(())),
            reporter: Arc::new(NullReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn shared_cache(&self) -> &LocalRepository {
        self.client.cache()
    }

    /// Install `main` and its `classified` variants from `repository`, or
    /// from every registered repository in order when `None`.
    ///
    /// Returns the installed path of `main` in the shared cache.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::NoVersion`] if a range cannot be narrowed to a
    /// release and [`InstallError::NotInstalled`] if the main file did not
    /// land in the shared cache.
    pub async fn install(
        &self,
        repository: Option<&Repository>,
        main: &Coordinate,
        classified: &[Coordinate],
    ) -> Result<PathBuf, InstallError> {
        self.install_pinned(repository, main, classified)
            .await
            .map(|(_, path)| path)
    }

    async fn install_pinned(
        &self,
        repository: Option<&Repository>,
        main: &Coordinate,
        classified: &[Coordinate],
    ) -> Result<(Version, PathBuf), InstallError> {
        let _guard = self.lock.lock().await;
        self.reporter.section(&format!("Installing {main}"));

        let (version, target) = self.narrow(repository, main).await?;

        tokio::fs::create_dir_all(&self.scratch_root).await?;
        let scratch = tempfile::Builder::new()
            .prefix("install-")
            .tempdir_in(&self.scratch_root)?;

        let result = self
            .install_through(scratch.path(), target.as_ref(), main, classified, &version)
            .await;

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::warn!("Could not remove scratch cache {}: {e}", scratch_path.display());
        }
        result.map(|path| (version, path))
    }

    /// Pin `main` to a concrete version. Ranges and the latest placeholder
    /// narrow to the newest release. Without a given repository, the one
    /// that listed the chosen version becomes the target; a pinned version
    /// no repository lists is tried everywhere.
    async fn narrow(
        &self,
        repository: Option<&Repository>,
        main: &Coordinate,
    ) -> Result<(Version, Option<Repository>), InstallError> {
        if let Some(v) = main.version().exact() {
            if repository.is_some() {
                return Ok((v.clone(), repository.cloned()));
            }
            let listed = self.versions.find_versions(main).await;
            let target = listed.repository_for(v).map(|id| {
                self.reporter.info(&format!("{main} is listed by {id}"));
                self.registry.resolve_by_id(id)
            });
            return Ok((v.clone(), target));
        }
        let found = self
            .versions
            .find_latest(main, repository)
            .await
            .ok_or_else(|| InstallError::NoVersion(main.to_string()))?;
        tracing::info!("Narrowed {main} to {}", found.version);
        self.reporter.info(&format!("Narrowed {main} to {}", found.version));
        let target = match repository {
            Some(r) => r.clone(),
            None => self.registry.resolve_by_id(&found.repository),
        };
        Ok((found.version, Some(target)))
    }

    async fn install_through(
        &self,
        scratch: &Path,
        repository: Option<&Repository>,
        main: &Coordinate,
        classified: &[Coordinate],
        version: &Version,
    ) -> Result<PathBuf, InstallError> {
        let repositories = match repository {
            Some(r) => vec![r.clone()],
            None => self.registry.list(false),
        };

        // Resolve into the scratch cache.
        let scratch_repo = LocalRepository::new(scratch);
        let session = self.client.with_cache(scratch_repo.clone());
        let variants = std::iter::once(main).chain(classified.iter());
        let mut staged = Vec::new();
        for variant in variants {
            let coordinate = variant.pinned(version);
            match self
                .resolve_one(&session, &repositories, &coordinate, version, &scratch_repo)
                .await
            {
                Some(file) => {
                    let sidecars = CHECKSUM_EXTENSIONS
                        .into_iter()
                        .map(|ext| (ext, layout::sidecar_path(&file, ext)))
                        .filter(|(_, p)| p.is_file())
                        .collect();
                    staged.push(Staged {
                        coordinate,
                        file,
                        sidecars,
                    });
                }
                None => {
                    tracing::warn!("Could not resolve {coordinate}");
                    self.reporter.failed(&coordinate.to_string(), "not resolvable");
                }
            }
        }

        // Promote into the shared cache.
        let shared = self.client.cache().clone();
        for item in &staged {
            let (shared, coordinate, version, file) = (
                shared.clone(),
                item.coordinate.clone(),
                version.clone(),
                item.file.clone(),
            );
            let copied = tokio::task::spawn_blocking(move || {
                shared.install(&coordinate, &version, &file)
            })
            .await
            .map_err(|e| io::Error::other(e.to_string()))
            .and_then(|r| r);
            if let Err(e) = copied {
                tracing::warn!("Installing {} failed: {e}", item.coordinate);
            }
        }

        let main = main.pinned(version);
        let installed = shared
            .find(&main, version)
            .ok_or_else(|| InstallError::NotInstalled(main.to_string()))?;

        for item in &staged {
            let Some(dest) = shared.find(&item.coordinate, version) else {
                continue;
            };
            for (ext, sidecar) in &item.sidecars {
                let target = layout::sidecar_path(&dest, ext);
                if let Err(e) = tokio::fs::copy(sidecar, &target).await {
                    tracing::warn!("Copying {} failed: {e}", target.display());
                }
            }
        }

        self.reporter.installed(&main, &installed);
        Ok(installed)
    }

    async fn resolve_one(
        &self,
        session: &RepositoryClient,
        repositories: &[Repository],
        coordinate: &Coordinate,
        version: &Version,
        into: &LocalRepository,
    ) -> Option<PathBuf> {
        for repository in repositories {
            self.reporter.resolving(coordinate, &repository.id);
            match session.download(repository, coordinate, version, into).await {
                Resolution::Found(path) => return Some(path),
                Resolution::NotFound => {}
                Resolution::Failed(e) => {
                    tracing::warn!("Resolving {coordinate} from {} failed: {e}", repository.id);
                }
            }
        }
        None
    }

    /// Install `main` with its `classifiers` and collect its dependency
    /// closure into one [`ResolvedArtifact`].
    ///
    /// # Errors
    ///
    /// Fails as [`ArtifactInstaller::install`] does. Missing classified
    /// variants and dependencies are left out, not errors.
    pub async fn install_resolved(
        &self,
        repository: Option<&Repository>,
        main: &Coordinate,
        classifiers: &[&str],
        dependencies: &DependencyResolver,
    ) -> Result<ResolvedArtifact, InstallError> {
        let classified: Vec<_> = classifiers.iter().map(|c| main.with_classifier(*c)).collect();
        let (version, path) = self.install_pinned(repository, main, &classified).await?;

        let coordinate = main.pinned(&version);
        let mut artifact = ResolvedArtifact::new(coordinate.clone(), path);
        for variant in &classified {
            if let (Some(classifier), Some(file)) = (
                variant.classifier(),
                self.shared_cache().find(&variant.pinned(&version), &version),
            ) {
                artifact.classified.insert(classifier.to_string(), file);
            }
        }
        artifact.dependencies = dependencies.dependencies(&coordinate, repository).await;
        Ok(artifact)
    }
}
