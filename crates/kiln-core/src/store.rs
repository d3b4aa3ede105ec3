//! Persisted artifact records.
//!
//! Records are keyed by coordinate string and hold the installed path, the
//! dependency list and the exclusion filter of one artifact. Classifier
//! variants are not recorded; they are picked up again from the files next
//! to the installed archive whenever a record is loaded.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use kiln_schema::{ArtifactRecord, Coordinate, ResolvedArtifact};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed artifact store {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Cannot encode artifact store: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Cannot replace {path}: {source}")]
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
    },
}

/// Storage of [`ArtifactRecord`]s by coordinate.
pub trait ArtifactStore: Send + Sync {
    /// The record stored under `coordinate`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load(&self, coordinate: &Coordinate) -> Result<Option<ResolvedArtifact>, StoreError>;

    /// Store `artifact`, replacing any record under the same coordinate.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    fn save(&self, artifact: &ResolvedArtifact) -> Result<(), StoreError>;

    /// Returns `true` if a record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    fn remove(&self, coordinate: &Coordinate) -> Result<bool, StoreError>;

    /// Every stored artifact, sorted by coordinate.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list(&self) -> Result<Vec<ResolvedArtifact>, StoreError>;
}

/// A single JSON file of records.
#[derive(Debug, Clone)]
pub struct JsonArtifactStore {
    path: PathBuf,
}

impl JsonArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, ArtifactRecord>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn restore(&self, record: &ArtifactRecord, coordinate: Coordinate) -> ResolvedArtifact {
        let mut artifact = record.to_artifact(coordinate);
        artifact.classified = variants_beside(&artifact.path);
        artifact
    }

    fn write(&self, records: &BTreeMap<String, ArtifactRecord>) -> Result<(), StoreError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), records)?;
        tmp.persist(&self.path).map_err(|source| StoreError::Persist {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}

impl ArtifactStore for JsonArtifactStore {
    fn load(&self, coordinate: &Coordinate) -> Result<Option<ResolvedArtifact>, StoreError> {
        Ok(self
            .read()?
            .get(&coordinate.to_string())
            .map(|record| self.restore(record, coordinate.clone())))
    }

    fn save(&self, artifact: &ResolvedArtifact) -> Result<(), StoreError> {
        let mut records = self.read()?;
        records.insert(artifact.coordinate.to_string(), ArtifactRecord::from(artifact));
        self.write(&records)?;
        tracing::debug!("Stored {} in {}", artifact.coordinate, self.path.display());
        Ok(())
    }

    fn remove(&self, coordinate: &Coordinate) -> Result<bool, StoreError> {
        let mut records = self.read()?;
        if records.remove(&coordinate.to_string()).is_none() {
            return Ok(false);
        }
        self.write(&records)?;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<ResolvedArtifact>, StoreError> {
        Ok(self
            .read()?
            .iter()
            .filter_map(|(key, record)| match key.parse::<Coordinate>() {
                Ok(coordinate) => Some(self.restore(record, coordinate)),
                Err(e) => {
                    tracing::warn!("Skipping stored record {key}: {e}");
                    None
                }
            })
            .collect())
    }
}

/// Installed `name-version-classifier.ext` files next to the primary
/// `name-version.ext` archive, keyed by classifier.
fn variants_beside(main: &Path) -> BTreeMap<String, PathBuf> {
    let mut found = BTreeMap::new();
    let (Some(dir), Some(stem), Some(ext)) = (
        main.parent(),
        main.file_stem().and_then(|s| s.to_str()),
        main.extension().and_then(|s| s.to_str()),
    ) else {
        return found;
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return found;
    };
    let prefix = format!("{stem}-");
    let suffix = format!(".{ext}");
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(classifier) = name
            .to_str()
            .and_then(|n| n.strip_prefix(&prefix))
            .and_then(|n| n.strip_suffix(&suffix))
        else {
            continue;
        };
        if !classifier.is_empty() && entry.path().is_file() {
            found.insert(classifier.to_string(), entry.path());
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_schema::{Version, VersionSpec};

    fn artifact(name: &str) -> ResolvedArtifact {
        let coordinate = Coordinate::new("org.acme", name, VersionSpec::Exact(Version::new("1.0")));
        let mut artifact = ResolvedArtifact::new(coordinate, PathBuf::from(format!("/c/{name}-1.0.jar")));
        artifact.dependencies = vec![PathBuf::from("/c/dep-2.0.jar")];
        artifact.filter.insert("org.acme.Hidden");
        artifact
    }

    #[test]
    fn test_save_load_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonArtifactStore::new(dir.path().join("state/artifacts.json"));
        let gauges = artifact("gauges");

        assert!(store.load(&gauges.coordinate).unwrap().is_none());
        store.save(&gauges).unwrap();
        store.save(&artifact("dials")).unwrap();

        let loaded = store.load(&gauges.coordinate).unwrap().unwrap();
        assert_eq!(loaded.path, gauges.path);
        assert_eq!(loaded.dependencies, gauges.dependencies);
        assert!(loaded.filter.contains("org.acme.Hidden"));

        let names: Vec<_> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|a| a.coordinate.name().to_string())
            .collect();
        assert_eq!(names, ["dials", "gauges"]);

        assert!(store.remove(&gauges.coordinate).unwrap());
        assert!(!store.remove(&gauges.coordinate).unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_loaded_artifact_keeps_installed_variants() {
        let dir = tempfile::tempdir().unwrap();
        let version_dir = dir.path().join("cache/org/acme/gauges/1.0");
        fs::create_dir_all(&version_dir).unwrap();
        for file in [
            "gauges-1.0.jar",
            "gauges-1.0-sources.jar",
            "gauges-1.0-javadoc.jar",
            "gauges-1.0.jar.sha256",
            "gauges-1.0.pom",
        ] {
            fs::write(version_dir.join(file), b"x").unwrap();
        }

        let coordinate = Coordinate::new("org.acme", "gauges", VersionSpec::Exact(Version::new("1.0")));
        let mut gauges = ResolvedArtifact::new(coordinate.clone(), version_dir.join("gauges-1.0.jar"));
        gauges.classified.insert("sources".into(), version_dir.join("gauges-1.0-sources.jar"));
        gauges.classified.insert("javadoc".into(), version_dir.join("gauges-1.0-javadoc.jar"));

        let store = JsonArtifactStore::new(dir.path().join("artifacts.json"));
        store.save(&gauges).unwrap();

        let loaded = store.load(&coordinate).unwrap().unwrap();
        assert_eq!(loaded.classified, gauges.classified);
        assert_eq!(store.list().unwrap()[0].classified, gauges.classified);
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifacts.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonArtifactStore::new(&path);
        assert!(matches!(store.list(), Err(StoreError::Parse { .. })));
    }
}
