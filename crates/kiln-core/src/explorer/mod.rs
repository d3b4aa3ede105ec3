//! Binary archive exploration.
//!
//! [`BinaryExplorer::explore`] probes every top-level type of an archive or
//! class directory inside a shared [`LoadingContext`], one entry at a time.
//! Each probe runs on the blocking pool under a timeout, so a panicking or
//! hanging entry becomes an error entry and the rest of the archive is still
//! explored.

pub mod classfile;
pub mod context;
pub mod probe;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kiln_schema::{ExplorationEntry, ExplorationReport};
use thiserror::Error;

use crate::config::ExplorerSettings;

pub use classfile::{ClassFile, ClassFileError};
pub use context::{LoadingContext, list_classes};
pub use probe::{ClassFileProbe, InstanceKind, Instantiator, ProbeFailure};

#[derive(Error, Debug)]
pub enum ExploreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Malformed class file: {0}")]
    ClassFile(#[from] ClassFileError),

    #[error("Type not found: {0}")]
    NotFound(String),

    #[error("Loading context is closed")]
    Closed,
}

pub struct BinaryExplorer {
    instantiator: Arc<dyn Instantiator>,
    timeout: Duration,
    restricted_prefixes: Vec<String>,
}

impl std::fmt::Debug for BinaryExplorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryExplorer")
            .field("timeout", &self.timeout)
            .field("restricted_prefixes", &self.restricted_prefixes)
            .finish_non_exhaustive()
    }
}

impl BinaryExplorer {
    pub fn new(
        instantiator: Arc<dyn Instantiator>,
        timeout: Duration,
        restricted_prefixes: Vec<String>,
    ) -> Self {
        Self {
            instantiator,
            timeout,
            restricted_prefixes,
        }
    }

    /// Explorer using [`ClassFileProbe`] and the configured timeout.
    pub fn from_settings(settings: &ExplorerSettings) -> Self {
        Self::new(
            Arc::new(ClassFileProbe::from_settings(settings)),
            Duration::from_secs(settings.timeout_secs.max(1)),
            settings.restricted_prefixes.clone(),
        )
    }

    /// Top-level type names in `path`, sorted. Nested types are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is neither a readable archive nor a directory.
    pub fn discover(path: &Path) -> Result<Vec<String>, ExploreError> {
        Ok(list_classes(path)?
            .into_iter()
            .filter(|name| !name.contains('$') && !name.ends_with("package-info"))
            .collect())
    }

    fn is_restricted(&self, type_name: &str) -> bool {
        self.restricted_prefixes
            .iter()
            .any(|p| type_name.starts_with(p.as_str()))
    }

    /// Probe every top-level type of `path` inside `ctx`.
    ///
    /// An unreadable archive yields a report carrying only the failure.
    pub async fn explore(&self, path: &Path, ctx: Arc<LoadingContext>) -> ExplorationReport {
        let discovered = {
            let path = path.to_path_buf();
            tokio::task::spawn_blocking(move || Self::discover(&path)).await
        };
        let names = match discovered {
            Ok(Ok(names)) => names,
            Ok(Err(e)) => {
                tracing::warn!("Cannot read {}: {e}", path.display());
                return ExplorationReport::failed(path, e.to_string());
            }
            Err(e) => return ExplorationReport::failed(path, e.to_string()),
        };

        tracing::debug!("Exploring {} types in {}", names.len(), path.display());
        let mut report = ExplorationReport::new(path);
        for name in names {
            let entry = self.probe(&ctx, name).await;
            if entry.is_ok() && self.is_restricted(&entry.type_name) {
                report.restricted = true;
            }
            report.entries.push(entry);
        }

        tracing::info!(
            "Explored {}: {} visual, {} errors",
            path.display(),
            report.visual_components().count(),
            report.errors().count()
        );
        report
    }

    async fn probe(&self, ctx: &Arc<LoadingContext>, name: String) -> ExplorationEntry {
        let instantiator = self.instantiator.clone();
        let task = {
            let ctx = ctx.clone();
            let name = name.clone();
            tokio::task::spawn_blocking(move || instantiator.instantiate(&ctx, &name))
        };

        // A timed-out probe keeps its blocking thread until it returns.
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(kind))) => ExplorationEntry::ok(name, kind == InstanceKind::Visual),
            Ok(Ok(Err(failure))) => {
                tracing::debug!("{failure}");
                ExplorationEntry::error(name, failure.to_string())
            }
            Ok(Err(join)) if join.is_panic() => {
                let payload = join.into_panic();
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::warn!("Probe of {name} panicked: {msg}");
                ExplorationEntry::error(name, format!("panicked: {msg}"))
            }
            Ok(Err(join)) => ExplorationEntry::error(name, join.to_string()),
            Err(_) => {
                tracing::warn!("Probe of {name} timed out after {:?}", self.timeout);
                ExplorationEntry::error(name, format!("timed out after {:?}", self.timeout))
            }
        }
    }
}
