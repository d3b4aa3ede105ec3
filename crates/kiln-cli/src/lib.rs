//! kiln - resolve, install, search and explore Maven-style packages
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Thin driver over `kiln-core`.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.kiln/
//! ├── config.toml     # Settings and user repositories
//! ├── repository/     # Shared package cache
//! ├── tmp/            # Scratch caches of in-flight installs
//! └── artifacts.json  # Installed artifact records
//! ```

pub mod cmd;
pub mod context;
pub mod ui;

pub use kiln_core::USER_AGENT;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "kiln")]
#[command(author, version, about = "kiln - resolve, install, search and explore packages")]
pub struct Cli {
    /// Configuration file (defaults to ~/.kiln/config.toml)
    #[arg(long, global = true, env = "KILN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Search every configured source for group:name matches
    Search {
        /// Free-text query
        query: String,
        /// Stop waiting after this many seconds and show partial results
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
    /// List versions of a coordinate (group:name:range)
    Versions {
        /// Coordinate, e.g. org.acme:gauges:[1.0,2.0)
        coordinate: String,
        /// Only query this repository
        #[arg(long)]
        repo: Option<String>,
    },
    /// Install a package into the shared cache
    Install {
        /// Coordinate, e.g. org.acme:gauges:1.2 or org.acme:gauges:LATEST
        coordinate: String,
        /// Only resolve against this repository
        #[arg(long)]
        repo: Option<String>,
        /// Also install these classified variants
        #[arg(long = "classifier", default_values = ["sources", "javadoc"])]
        classifiers: Vec<String>,
    },
    /// Show the dependency closure of a coordinate
    Deps {
        /// Coordinate
        coordinate: String,
        /// Only resolve against this repository
        #[arg(long)]
        repo: Option<String>,
        /// Show the graph with depths instead of installed paths
        #[arg(long)]
        tree: bool,
    },
    /// Probe the types inside archives or class directories
    Explore {
        /// Archives and directories, explored in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Reconcile with the exclusion filter of this installed artifact
        #[arg(long)]
        artifact: Option<String>,
        /// Uncheck these type names before committing the filter
        #[arg(long = "exclude")]
        exclude: Vec<String>,
    },
    /// Manage repositories
    Repos {
        #[command(subcommand)]
        command: RepoCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum RepoCommands {
    /// List repositories in resolution order
    List {
        /// Leave out snapshot repositories
        #[arg(long)]
        releases: bool,
    },
    /// Add a user repository
    Add {
        /// Repository id
        id: String,
        /// Base URL
        url: String,
        /// Repository kind
        #[arg(long, value_enum, default_value_t = KindArg::Enterprise)]
        kind: KindArg,
        /// User name for basic authentication
        #[arg(long, requires = "password")]
        user: Option<String>,
        /// Password for basic authentication
        #[arg(long, env = "KILN_REPO_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Remove a user repository
    Remove {
        /// Repository id
        id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Public,
    Enterprise,
}

impl From<KindArg> for kiln_schema::RepositoryKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Public => Self::PublicRegistry,
            KindArg::Enterprise => Self::EnterpriseRegistry,
        }
    }
}
