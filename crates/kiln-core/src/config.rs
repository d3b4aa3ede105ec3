//! User configuration (`~/.kiln/config.toml`).
//!
//! Every field has a default, so an absent or partial file is valid.
//! A few settings can be overridden from the environment:
//! `KILN_HOME`, `KILN_CACHE_DIR` and `KILN_SEARCH_WORKERS`.

use std::fs;
use std::path::{Path, PathBuf};

use kiln_schema::RepositoryRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML content could not be deserialized.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Settings could not be written back as TOML.
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range.
    #[error("Invalid setting {key}: {message}")]
    Invalid {
        key: &'static str,
        message: String,
    },
}

/// An enterprise registry to query during search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterpriseEndpoint {
    /// Label reported on results from this endpoint.
    pub label: String,
    /// Base URL of the registry.
    pub url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

/// Search fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Concurrent backend queries.
    pub workers: usize,
    /// Whether the shared cache is searched.
    pub local: bool,
    /// Public registry search endpoint; empty disables it.
    pub public_url: String,
    /// Rows requested from the public registry.
    pub rows: usize,
    /// Page size for enterprise registries.
    pub page_size: usize,
    /// Hard cap on results collected from one enterprise registry.
    pub max_results: usize,
    pub enterprise: Vec<EnterpriseEndpoint>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            workers: 5,
            local: true,
            public_url: "https://search.maven.org".to_string(),
            rows: 200,
            page_size: 200,
            max_results: 2000,
            enterprise: Vec::new(),
        }
    }
}

/// Archive exploration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerSettings {
    /// Per-type instantiation timeout in seconds.
    pub timeout_secs: u64,
    /// Type names (or package prefixes ending in `.`) counted as visual components.
    pub visual_types: Vec<String>,
    /// Package prefixes of restricted vendor components.
    pub restricted_prefixes: Vec<String>,
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            visual_types: [
                "javafx.scene.Node",
                "javafx.scene.Parent",
                "javafx.scene.Group",
                "javafx.scene.SubScene",
                "javafx.scene.control.",
                "javafx.scene.layout.",
                "javafx.scene.shape.",
                "javafx.scene.text.",
                "javafx.scene.chart.",
                "javafx.scene.canvas.",
                "javafx.scene.image.ImageView",
                "javafx.scene.media.MediaView",
                "javafx.scene.web.WebView",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            restricted_prefixes: vec!["com.gluonhq.charm.glisten.".to_string()],
        }
    }
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// How long cached version listings are trusted, in seconds.
    pub metadata_ttl_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            metadata_ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Shared package cache.
    pub cache_dir: PathBuf,
    /// Root for per-install scratch caches.
    pub scratch_dir: PathBuf,
    /// User-defined repositories, after the presets.
    pub repositories: Vec<RepositoryRecord>,
    pub search: SearchSettings,
    pub explorer: ExplorerSettings,
    pub network: NetworkSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: crate::paths::cache_path(),
            scratch_dir: crate::paths::scratch_path(),
            repositories: Vec::new(),
            search: SearchSettings::default(),
            explorer: ExplorerSettings::default(),
            network: NetworkSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults if it does not exist, then
    /// apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if a setting is out of range.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut settings = if path.exists() {
            let content = fs::read_to_string(path)?;
            Self::from_toml(&content)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        settings.apply_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text without consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for [`Settings`].
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Write these settings to `path`, replacing it atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(dir) = std::env::var("KILN_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Ok(workers) = std::env::var("KILN_SEARCH_WORKERS") {
            self.search.workers = workers.parse().map_err(|e| ConfigError::Invalid {
                key: "KILN_SEARCH_WORKERS",
                message: format!("{e}"),
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.search.workers == 0 {
            return Err(ConfigError::Invalid {
                key: "search.workers",
                message: "must be at least 1".to_string(),
            });
        }
        if self.search.page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "search.page_size",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_schema::RepositoryKind;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            [search]
            workers = 3

            [[search.enterprise]]
            label = "corp"
            url = "https://nexus.corp"
            user = "ci"
            password = "token"

            [[repositories]]
            id = "corp-releases"
            type = "enterprise-registry"
            url = "https://nexus.corp/releases"
            "#,
        )
        .unwrap();

        assert_eq!(settings.search.workers, 3);
        assert_eq!(settings.search.max_results, 2000);
        assert_eq!(settings.search.enterprise[0].label, "corp");
        assert_eq!(settings.repositories[0].kind, RepositoryKind::EnterpriseRegistry);
        assert!(settings.repositories[0].user.is_empty());
        assert_eq!(settings.explorer.timeout_secs, 10);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.search.page_size, 200);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[search]\nworkers = 0\n").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(ConfigError::Invalid { key: "search.workers", .. })
        ));
    }
}
