pub mod client;
pub mod config;
pub mod dependencies;
pub mod explorer;
pub mod import;
pub mod installer;
pub mod layout;
pub mod metadata;
pub mod outcome;
pub mod paths;
pub mod pom;
pub mod registry;
pub mod search;
pub mod store;
pub mod versions;

pub mod reporter;

pub use client::{ClientError, RepositoryClient};
pub use config::Settings;
pub use dependencies::DependencyResolver;
pub use explorer::{BinaryExplorer, LoadingContext};
pub use import::{ImportSelection, ImportSession};
pub use installer::{ArtifactInstaller, InstallError};
pub use outcome::Resolution;
pub use registry::RepositoryRegistry;
pub use reporter::{NullReporter, Reporter};
pub use search::{SearchAggregator, SearchBackend};
pub use store::{ArtifactStore, JsonArtifactStore};
pub use versions::VersionResolver;

/// User Agent string for registry requests
pub const USER_AGENT: &str = concat!("kiln-core/", env!("CARGO_PKG_VERSION"));
