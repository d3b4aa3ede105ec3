//! Configured package repositories and their persisted form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of source a repository is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepositoryKind {
    /// The on-disk package cache shared by all resolutions.
    LocalCache,
    /// A public package registry.
    PublicRegistry,
    /// A private or enterprise registry, usually behind credentials.
    EnterpriseRegistry,
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LocalCache => "local-cache",
            Self::PublicRegistry => "public-registry",
            Self::EnterpriseRegistry => "enterprise-registry",
        };
        f.write_str(s)
    }
}

/// Which version streams a repository serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotPolicy {
    /// Release versions only (default).
    #[default]
    Releases,
    /// Snapshot versions only.
    Snapshots,
    /// Both releases and snapshots.
    Both,
}

impl SnapshotPolicy {
    /// Whether a version with the given snapshot-ness is served.
    pub fn allows(self, snapshot: bool) -> bool {
        match self {
            Self::Releases => !snapshot,
            Self::Snapshots => snapshot,
            Self::Both => true,
        }
    }
}

/// Basic credentials for a repository.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credentials {
    /// User name.
    pub user: String,
    /// Password or token.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A configured repository. Identity is [`Repository::id`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    /// Unique identifier (e.g. `central`).
    pub id: String,
    /// Kind of source.
    pub kind: RepositoryKind,
    /// Base URL (`https://...` or `file://...`).
    pub url: String,
    /// Optional basic credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    /// Which version streams are served.
    #[serde(default)]
    pub policy: SnapshotPolicy,
}

impl Repository {
    /// Create a repository without credentials.
    pub fn new(id: impl Into<String>, kind: RepositoryKind, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            url: url.into(),
            credentials: None,
            policy: SnapshotPolicy::default(),
        }
    }

    /// Builder-style credentials.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    /// Builder-style snapshot policy.
    pub fn with_policy(mut self, policy: SnapshotPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Whether the identifier marks a snapshot repository.
    pub fn is_snapshot_repository(&self) -> bool {
        self.id.to_lowercase().contains("snapshot")
    }
}

impl PartialEq for Repository {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Repository {}

impl std::hash::Hash for Repository {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.url)
    }
}

/// Persisted repository record: `id, type, url, user, password`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// Repository identifier.
    pub id: String,
    /// Repository kind.
    #[serde(rename = "type")]
    pub kind: RepositoryKind,
    /// Base URL.
    pub url: String,
    /// User name, empty when anonymous.
    #[serde(default)]
    pub user: String,
    /// Password, empty when anonymous.
    #[serde(default)]
    pub password: String,
}

impl From<&Repository> for RepositoryRecord {
    fn from(repo: &Repository) -> Self {
        let (user, password) = repo
            .credentials
            .as_ref()
            .map(|c| (c.user.clone(), c.password.clone()))
            .unwrap_or_default();
        Self {
            id: repo.id.clone(),
            kind: repo.kind,
            url: repo.url.clone(),
            user,
            password,
        }
    }
}

impl From<RepositoryRecord> for Repository {
    fn from(record: RepositoryRecord) -> Self {
        let policy = if record.id.to_lowercase().contains("snapshot") {
            SnapshotPolicy::Snapshots
        } else {
            SnapshotPolicy::Releases
        };
        let repo = Repository::new(record.id, record.kind, record.url).with_policy(policy);
        if record.user.is_empty() {
            repo
        } else {
            repo.with_credentials(record.user, record.password)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_id() {
        let a = Repository::new("corp", RepositoryKind::EnterpriseRegistry, "https://a");
        let b = Repository::new("corp", RepositoryKind::PublicRegistry, "https://b");
        assert_eq!(a, b);
    }

    #[test]
    fn test_record_round_trip() {
        let repo = Repository::new("corp", RepositoryKind::EnterpriseRegistry, "https://nexus")
            .with_credentials("alice", "s3cret");
        let record = RepositoryRecord::from(&repo);
        assert_eq!(record.user, "alice");

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"type\":\"enterprise-registry\""));

        let back = Repository::from(record);
        assert_eq!(back.credentials, repo.credentials);
        assert_eq!(back.policy, SnapshotPolicy::Releases);
    }

    #[test]
    fn test_snapshot_record_gets_snapshot_policy() {
        let record = RepositoryRecord {
            id: "corp-Snapshots".into(),
            kind: RepositoryKind::EnterpriseRegistry,
            url: "https://nexus/snapshots".into(),
            user: String::new(),
            password: String::new(),
        };
        let repo = Repository::from(record);
        assert!(repo.is_snapshot_repository());
        assert_eq!(repo.policy, SnapshotPolicy::Snapshots);
        assert!(repo.credentials.is_none());
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let c = Credentials {
            user: "u".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{c:?}").contains("hunter2"));
    }
}
