//! Shared setup for commands: settings, registry, client and reporter.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use kiln_core::layout::LocalRepository;
use kiln_core::{
    ArtifactInstaller, DependencyResolver, JsonArtifactStore, NullReporter, Reporter,
    RepositoryClient, RepositoryRegistry, Settings, VersionResolver,
};
use kiln_schema::{Coordinate, Repository};

use crate::ui::ConsoleReporter;

/// Everything a command needs, built once from the configuration.
pub struct Context {
    pub config_path: PathBuf,
    pub settings: Settings,
    pub registry: Arc<RepositoryRegistry>,
    pub client: RepositoryClient,
    pub reporter: Arc<dyn Reporter>,
}

impl Context {
    pub fn load(config: Option<PathBuf>, quiet: bool) -> Result<Self> {
        let config_path = config.unwrap_or_else(kiln_core::paths::config_path);
        let settings = Settings::load(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;
        let registry = Arc::new(RepositoryRegistry::with_records(
            &settings.cache_dir,
            settings.repositories.clone(),
        ));
        let client = RepositoryClient::new(LocalRepository::new(&settings.cache_dir), &settings.network)
            .context("Failed to build HTTP client")?;
        let reporter: Arc<dyn Reporter> = if quiet {
            Arc::new(NullReporter)
        } else {
            Arc::new(ConsoleReporter::default())
        };
        Ok(Self {
            config_path,
            settings,
            registry,
            client,
            reporter,
        })
    }

    pub fn versions(&self) -> VersionResolver {
        VersionResolver::new(self.client.clone(), self.registry.clone())
    }

    pub fn dependencies(&self) -> DependencyResolver {
        DependencyResolver::new(self.client.clone(), self.registry.clone())
    }

    pub fn installer(&self) -> ArtifactInstaller {
        ArtifactInstaller::new(
            self.client.clone(),
            self.registry.clone(),
            &self.settings.scratch_dir,
        )
        .with_reporter(self.reporter.clone())
    }

    pub fn store(&self) -> JsonArtifactStore {
        JsonArtifactStore::new(kiln_core::paths::artifacts_path())
    }

    /// `None` resolves against every repository.
    pub fn repository(&self, id: Option<&str>) -> Option<Repository> {
        id.map(|id| self.registry.resolve_by_id(id))
    }
}

pub fn parse_coordinate(s: &str) -> Result<Coordinate> {
    s.parse()
        .with_context(|| format!("Invalid coordinate '{s}' (expected group:name:version)"))
}
