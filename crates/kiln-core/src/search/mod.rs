//! Multi-source coordinate search.
//!
//! Each [`SearchBackend`] answers a free-text query on its own; the
//! [`SearchAggregator`] fans a query out to all of them and merges.

pub mod aggregator;
pub mod enterprise;
pub mod local;
pub mod merge;
pub mod registry;

use std::sync::Arc;

use async_trait::async_trait;
use kiln_schema::SearchResult;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;

pub use aggregator::{SearchAggregator, SearchPhase, SearchSession, SearchSnapshot};
pub use enterprise::EnterpriseSearch;
pub use local::LocalCacheSearch;
pub use merge::MergedResults;
pub use registry::RegistrySearch;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{backend} answered {status}")]
    Status { backend: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Search cancelled")]
    Cancelled,
}

/// A source of candidate coordinates.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Label reported on results and in logs.
    fn label(&self) -> &str;

    /// Candidates whose `group:name` matches `query`. Versions may be the
    /// latest placeholder. `cancel` is checked between I/O steps.
    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, SearchError>;
}

impl std::fmt::Debug for dyn SearchBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SearchBackend({})", self.label())
    }
}

/// Backends configured by `settings`: the shared cache, the public
/// registry, then each enterprise registry.
pub fn backends_from_settings(
    settings: &Settings,
    client: &reqwest::Client,
) -> Vec<Arc<dyn SearchBackend>> {
    let mut backends: Vec<Arc<dyn SearchBackend>> = Vec::new();
    let search = &settings.search;
    if search.local {
        backends.push(Arc::new(LocalCacheSearch::new(&settings.cache_dir, "local")));
    }
    if !search.public_url.is_empty() {
        backends.push(Arc::new(RegistrySearch::new(
            client.clone(),
            &search.public_url,
            "central",
            search.rows,
        )));
    }
    for endpoint in &search.enterprise {
        backends.push(Arc::new(EnterpriseSearch::new(
            client.clone(),
            endpoint.clone(),
            search.page_size,
            search.max_results,
        )));
    }
    backends
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnterpriseEndpoint;

    #[test]
    fn test_backends_follow_settings() {
        let mut settings = Settings::default();
        settings.search.enterprise.push(EnterpriseEndpoint {
            label: "corp".into(),
            url: "https://nexus.corp".into(),
            user: String::new(),
            password: String::new(),
        });
        let labels: Vec<_> = backends_from_settings(&settings, &reqwest::Client::new())
            .iter()
            .map(|b| b.label().to_string())
            .collect();
        assert_eq!(labels, ["local", "central", "corp"]);

        settings.search.local = false;
        settings.search.public_url.clear();
        assert_eq!(backends_from_settings(&settings, &reqwest::Client::new()).len(), 1);
    }
}
