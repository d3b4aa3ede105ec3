use std::path::{Path, PathBuf};

use async_trait::async_trait;
use kiln_schema::{Coordinate, SearchResult, Version, VersionSpec};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::{SearchBackend, SearchError};

/// Searches the shared cache for primary archives.
#[derive(Debug, Clone)]
pub struct LocalCacheSearch {
    root: PathBuf,
    label: String,
}

impl LocalCacheSearch {
    pub fn new(root: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            label: label.into(),
        }
    }
}

/// Interpret `file` as `root/group/dirs/name/version/name-version.jar`.
fn coordinate_of(root: &Path, file: &Path) -> Option<Coordinate> {
    let version_dir = file.parent()?;
    let name_dir = version_dir.parent()?;
    let version = version_dir.file_name()?.to_str()?;
    let name = name_dir.file_name()?.to_str()?;
    if file.file_name()?.to_str()? != format!("{name}-{version}.jar") {
        return None;
    }
    let group_dir = name_dir.parent()?.strip_prefix(root).ok()?;
    let group = group_dir
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?
        .join(".");
    if group.is_empty() {
        return None;
    }
    Some(Coordinate::new(
        group,
        name,
        VersionSpec::Exact(Version::new(version)),
    ))
}

fn scan(
    root: &Path,
    query: &str,
    label: &str,
    cancel: &CancellationToken,
) -> Result<Vec<SearchResult>, SearchError> {
    let needle = query.to_lowercase();
    let mut results = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("Skipping unreadable cache entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(coordinate) = coordinate_of(root, entry.path()) else {
            continue;
        };
        if coordinate.key().to_lowercase().contains(&needle) {
            results.push(SearchResult::new(coordinate, label));
        }
    }
    Ok(results)
}

#[async_trait]
impl SearchBackend for LocalCacheSearch {
    fn label(&self) -> &str {
        &self.label
    }

    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let (root, query, label, cancel) = (
            self.root.clone(),
            query.to_string(),
            self.label.clone(),
            cancel.clone(),
        );
        tokio::task::spawn_blocking(move || scan(&root, &query, &label, &cancel))
            .await
            .map_err(|e| SearchError::Io(std::io::Error::other(e.to_string())))?
    }
}
