//! Repository transport: HTTP(S) and local directories in the repository layout.
//!
//! A [`RepositoryClient`] is bound to one [`LocalRepository`], the cache it
//! resolves into. The installer rebinds it to a scratch cache for the
//! duration of one install.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use futures::StreamExt;
use kiln_schema::{Coordinate, Repository, RepositoryKind, Version, VersionSpec};
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::config::NetworkSettings;
use crate::layout::{self, CHECKSUM_EXTENSIONS, LocalRepository};
use crate::metadata;
use crate::outcome::Resolution;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unsupported repository URL: {0}")]
    UnsupportedUrl(String),

    #[error("Hash mismatch for {file}: expected {expected}, got {actual}")]
    HashMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Where a repository's files come from.
enum Source<'a> {
    Dir(PathBuf),
    Http(&'a str),
}

fn source(repository: &Repository) -> Result<Source<'_>, ClientError> {
    if let Some(path) = repository.url.strip_prefix("file://") {
        return Ok(Source::Dir(PathBuf::from(path)));
    }
    if repository.kind == RepositoryKind::LocalCache {
        return Ok(Source::Dir(PathBuf::from(&repository.url)));
    }
    if repository.url.starts_with("http://") || repository.url.starts_with("https://") {
        return Ok(Source::Http(repository.url.trim_end_matches('/')));
    }
    Err(ClientError::UnsupportedUrl(repository.url.clone()))
}

async fn blocking<T, F>(f: F) -> Result<T, ClientError>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| io::Error::other(e.to_string()))?
        .map_err(ClientError::from)
}

/// SHA-256 of a file on disk, hex encoded.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// First token of a checksum side-car (`<hex>  <file name>` or just `<hex>`).
fn checksum_token(content: &[u8]) -> Option<String> {
    String::from_utf8_lossy(content)
        .split_whitespace()
        .next()
        .map(str::to_ascii_lowercase)
}

/// A downloaded file that is not yet visible at its destination.
///
/// A staged file is deleted when dropped, so any early return before
/// [`Fetched::persist`] leaves the destination untouched.
enum Fetched {
    /// The repository is the destination itself; nothing to move.
    InPlace { sha256: String },
    Staged { tmp: tempfile::TempPath, sha256: String },
}

impl Fetched {
    fn sha256(&self) -> &str {
        match self {
            Self::InPlace { sha256 } | Self::Staged { sha256, .. } => sha256,
        }
    }

    fn persist(self, dest: &Path) -> io::Result<()> {
        match self {
            Self::InPlace { .. } => Ok(()),
            Self::Staged { tmp, .. } => tmp.persist(dest).map_err(|e| e.error),
        }
    }
}

/// Fetches listings, archives and descriptors from repositories.
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    http: Client,
    cache: LocalRepository,
    metadata_ttl: Duration,
}

impl RepositoryClient {
    /// Client resolving into `cache`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(cache: LocalRepository, settings: &NetworkSettings) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            cache,
            metadata_ttl: Duration::from_secs(settings.metadata_ttl_secs),
        })
    }

    /// Same transport, resolving into a different cache.
    pub fn with_cache(&self, cache: LocalRepository) -> Self {
        Self {
            http: self.http.clone(),
            cache,
            metadata_ttl: self.metadata_ttl,
        }
    }

    pub fn cache(&self) -> &LocalRepository {
        &self.cache
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    fn request(&self, repository: &Repository, url: &str) -> reqwest::RequestBuilder {
        let req = self.http.get(url);
        match &repository.credentials {
            Some(c) => req.basic_auth(&c.user, Some(&c.password)),
            None => req,
        }
    }

    /// Fetch `rel` from `repository` into memory. `None` when absent.
    async fn fetch_bytes(
        &self,
        repository: &Repository,
        rel: &str,
    ) -> Result<Option<Bytes>, ClientError> {
        match source(repository)? {
            Source::Dir(root) => match tokio::fs::read(root.join(rel)).await {
                Ok(data) => Ok(Some(Bytes::from(data))),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            },
            Source::Http(base) => {
                let url = format!("{base}/{rel}");
                let resp = self.request(repository, &url).send().await?;
                match resp.status() {
                    StatusCode::NOT_FOUND => Ok(None),
                    s if s.is_success() => Ok(Some(resp.bytes().await?)),
                    s => Err(ClientError::Status {
                        url,
                        status: s.as_u16(),
                    }),
                }
            }
        }
    }

    /// Fetch `rel` from `repository` into a temporary file next to `dest`.
    /// Nothing is moved into place until the caller calls [`Fetched::persist`].
    /// `None` when absent.
    async fn fetch_file(
        &self,
        repository: &Repository,
        rel: &str,
        dest: &Path,
    ) -> Result<Option<Fetched>, ClientError> {
        let dir = dest
            .parent()
            .ok_or_else(|| ClientError::UnsupportedUrl(dest.display().to_string()))?
            .to_path_buf();

        match source(repository)? {
            Source::Dir(root) => {
                let src = root.join(rel);
                if !src.is_file() {
                    return Ok(None);
                }
                if src == dest {
                    let dest = dest.to_path_buf();
                    return blocking(move || sha256_file(&dest))
                        .await
                        .map(|sha256| Some(Fetched::InPlace { sha256 }));
                }
                blocking(move || {
                    std::fs::create_dir_all(&dir)?;
                    let mut tmp = tempfile::Builder::new().prefix(".part-").tempfile_in(&dir)?;
                    let mut reader = std::fs::File::open(&src)?;
                    io::copy(&mut reader, tmp.as_file_mut())?;
                    let sha256 = sha256_file(tmp.path())?;
                    Ok(Some(Fetched::Staged {
                        tmp: tmp.into_temp_path(),
                        sha256,
                    }))
                })
                .await
            }
            Source::Http(base) => {
                let url = format!("{base}/{rel}");
                let resp = self.request(repository, &url).send().await?;
                match resp.status() {
                    StatusCode::NOT_FOUND => return Ok(None),
                    s if !s.is_success() => {
                        return Err(ClientError::Status {
                            url,
                            status: s.as_u16(),
                        });
                    }
                    _ => {}
                }

                tokio::fs::create_dir_all(&dir).await?;
                let tmp = tempfile::Builder::new()
                    .prefix(".part-")
                    .tempfile_in(&dir)?
                    .into_temp_path();
                let mut file = tokio::fs::File::create(&tmp).await?;
                let mut stream = resp.bytes_stream();
                let mut hasher = Sha256::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    file.write_all(&chunk).await?;
                    hasher.update(&chunk);
                }
                file.flush().await?;
                drop(file);
                Ok(Some(Fetched::Staged {
                    tmp,
                    sha256: hex::encode(hasher.finalize()),
                }))
            }
        }
    }

    /// Versions of `coordinate` published by `repository`, in listing order.
    ///
    /// Remote listings are cached in the bound cache as
    /// `maven-metadata-<repo-id>.xml` and reused while younger than the TTL.
    pub async fn list_versions(
        &self,
        repository: &Repository,
        coordinate: &Coordinate,
    ) -> Resolution<Vec<Version>> {
        let versions = match self.try_list_versions(repository, coordinate).await {
            Ok(v) => v,
            Err(e) => return Resolution::Failed(e),
        };
        if versions.is_empty() {
            Resolution::NotFound
        } else {
            Resolution::Found(versions)
        }
    }

    async fn try_list_versions(
        &self,
        repository: &Repository,
        coordinate: &Coordinate,
    ) -> Result<Vec<Version>, ClientError> {
        let cached = self.cache.metadata_path(coordinate, &repository.id)?;
        let metadata_rel = layout::metadata_url_path(coordinate);

        if let Source::Dir(root) = source(repository)? {
            if let Some(xml) = self.fetch_bytes(repository, &metadata_rel).await? {
                return Ok(metadata::parse_metadata(&String::from_utf8_lossy(&xml))?.versions);
            }
            let local = LocalRepository::new(root);
            let coordinate = coordinate.clone();
            return blocking(move || local.versions(&coordinate)).await;
        }

        if self.is_fresh(&cached) {
            tracing::debug!("Using cached listing {}", cached.display());
            let xml = tokio::fs::read_to_string(&cached).await?;
            return Ok(metadata::parse_metadata(&xml)?.versions);
        }

        if let Some(xml) = self.fetch_bytes(repository, &metadata_rel).await? {
            if let Some(dir) = cached.parent() {
                tokio::fs::create_dir_all(dir).await?;
            }
            tokio::fs::write(&cached, &xml).await?;
            return Ok(metadata::parse_metadata(&String::from_utf8_lossy(&xml))?.versions);
        }

        // No listing published; some servers still expose a browsable index.
        let index_rel = format!(
            "{}/{}/",
            coordinate.group().replace('.', "/"),
            coordinate.name()
        );
        match self.fetch_bytes(repository, &index_rel).await? {
            Some(html) => Ok(metadata::parse_directory_listing(
                &String::from_utf8_lossy(&html),
            )?),
            None => Ok(Vec::new()),
        }
    }

    fn is_fresh(&self, path: &Path) -> bool {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age < self.metadata_ttl)
    }

    /// Download `coordinate` at `version` from `repository` into `into`.
    ///
    /// Checksum side-cars are fetched when published. A published SHA-256
    /// that does not match removes the download and fails.
    pub async fn download(
        &self,
        repository: &Repository,
        coordinate: &Coordinate,
        version: &Version,
        into: &LocalRepository,
    ) -> Resolution<PathBuf> {
        match self.try_download(repository, coordinate, version, into).await {
            Ok(found) => Resolution::from(Ok(found)),
            Err(e) => Resolution::Failed(e),
        }
    }

    async fn try_download(
        &self,
        repository: &Repository,
        coordinate: &Coordinate,
        version: &Version,
        into: &LocalRepository,
    ) -> Result<Option<PathBuf>, ClientError> {
        let dest = into.path_of(coordinate, version)?;
        let rel = layout::url_path(coordinate, version);
        let Some(fetched) = self.fetch_file(repository, &rel, &dest).await? else {
            return Ok(None);
        };

        // Side-cars are read before anything lands at `dest`; a failure here
        // drops the staged file.
        let mut sidecars = Vec::new();
        let mut expected = None;
        for ext in CHECKSUM_EXTENSIONS {
            let Some(content) = self.fetch_bytes(repository, &format!("{rel}.{ext}")).await?
            else {
                continue;
            };
            if ext == "sha256" {
                expected = checksum_token(&content);
            }
            sidecars.push((ext, content));
        }

        if let Some(expected) = expected
            && expected != fetched.sha256()
        {
            let actual = fetched.sha256().to_string();
            if let Fetched::InPlace { .. } = fetched {
                tokio::fs::remove_file(&dest).await.ok();
                for ext in CHECKSUM_EXTENSIONS {
                    tokio::fs::remove_file(layout::sidecar_path(&dest, ext))
                        .await
                        .ok();
                }
            }
            return Err(ClientError::HashMismatch {
                file: dest.display().to_string(),
                expected,
                actual,
            });
        }

        for (ext, content) in &sidecars {
            tokio::fs::write(layout::sidecar_path(&dest, ext), content).await?;
        }
        fetched.persist(&dest)?;

        tracing::debug!("Fetched {} from {}", dest.display(), repository.id);
        Ok(Some(dest))
    }

    /// Fetch the descriptor (`.pom`) of `coordinate` at `version` into `into`.
    pub async fn fetch_descriptor(
        &self,
        repository: &Repository,
        coordinate: &Coordinate,
        version: &Version,
        into: &LocalRepository,
    ) -> Resolution<PathBuf> {
        let pom = Coordinate::new(
            coordinate.group(),
            coordinate.name(),
            VersionSpec::Exact(version.clone()),
        )
        .with_extension("pom");
        self.download(repository, &pom, version, into).await
    }
}
