//! Enterprise registry search with pagination.
//!
//! `GET {base}/service/local/lucene/search?q=<query>&from=<n>&count=<page>`
//! answers `{"totalCount": N, "data": [...]}`. Pages are requested until
//! the total is reached, a page comes back empty, or the result cap is hit.

use std::collections::HashSet;

use async_trait::async_trait;
use kiln_schema::{Coordinate, SearchResult, Version, VersionSpec};
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{SearchBackend, SearchError};
use crate::config::EnterpriseEndpoint;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page {
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    data: Vec<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    group_id: String,
    artifact_id: String,
    version: Option<String>,
    latest_release: Option<String>,
}

impl Item {
    fn version(&self) -> VersionSpec {
        self.latest_release
            .as_deref()
            .or(self.version.as_deref())
            .filter(|v| !v.is_empty())
            .map_or(VersionSpec::Latest, |v| VersionSpec::Exact(Version::new(v)))
    }
}

/// Searches one enterprise registry.
#[derive(Debug, Clone)]
pub struct EnterpriseSearch {
    client: Client,
    endpoint: EnterpriseEndpoint,
    page_size: usize,
    max_results: usize,
}

impl EnterpriseSearch {
    pub fn new(client: Client, endpoint: EnterpriseEndpoint, page_size: usize, max_results: usize) -> Self {
        Self {
            client,
            endpoint,
            page_size: page_size.max(1),
            max_results,
        }
    }

    async fn page(&self, query: &str, from: usize) -> Result<Page, SearchError> {
        let url = format!(
            "{}/service/local/lucene/search",
            self.endpoint.url.trim_end_matches('/')
        );
        let (from, count) = (from.to_string(), self.page_size.to_string());
        let mut req = self
            .client
            .get(&url)
            .query(&[("q", query), ("from", from.as_str()), ("count", count.as_str())])
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT);
        if !self.endpoint.user.is_empty() {
            req = req.basic_auth(&self.endpoint.user, Some(&self.endpoint.password));
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(SearchError::Status {
                backend: self.endpoint.label.clone(),
                status: resp.status().as_u16(),
            });
        }
        Ok(serde_json::from_slice(&resp.bytes().await?)?)
    }
}

#[async_trait]
impl SearchBackend for EnterpriseSearch {
    fn label(&self) -> &str {
        &self.endpoint.label
    }

    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, SearchError> {
        // Pagination state lives in this call only.
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        let mut from = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled);
            }
            let page = self.page(query, from).await?;
            let fetched = page.data.len();
            for item in page.data {
                if results.len() >= self.max_results {
                    break;
                }
                let version = item.version();
                if !seen.insert((item.group_id.clone(), item.artifact_id.clone())) {
                    continue;
                }
                match Coordinate::try_new(item.group_id, item.artifact_id, version) {
                    Ok(coordinate) => {
                        results.push(SearchResult::new(coordinate, self.endpoint.label.clone()));
                    }
                    Err(e) => tracing::debug!("{} dropped a result: {e}", self.endpoint.label),
                }
            }
            from += fetched;
            tracing::debug!(
                "{}: {from} of {} fetched, {} kept",
                self.endpoint.label,
                page.total_count,
                results.len()
            );
            if fetched == 0 || from >= page.total_count || results.len() >= self.max_results {
                break;
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn endpoint(url: String) -> EnterpriseEndpoint {
        EnterpriseEndpoint {
            label: "corp".into(),
            url,
            user: "ci".into(),
            password: "token".into(),
        }
    }

    fn item(group: &str, name: &str, version: &str) -> String {
        format!(r#"{{"groupId":"{group}","artifactId":"{name}","version":"{version}"}}"#)
    }

    async fn serve_page(server: &mut mockito::Server, from: &str, total: usize, items: &[String]) -> mockito::Mock {
        server
            .mock("GET", "/service/local/lucene/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "foo".into()),
                Matcher::UrlEncoded("from".into(), from.into()),
                Matcher::UrlEncoded("count".into(), "2".into()),
            ]))
            .match_header("authorization", "Basic Y2k6dG9rZW4=")
            .with_body(format!(r#"{{"totalCount":{total},"data":[{}]}}"#, items.join(",")))
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_pages_until_total_dedup_across_pages() {
        let mut server = mockito::Server::new_async().await;
        let p0 = serve_page(&mut server, "0", 5, &[item("g", "a", "1.0"), item("g", "b", "1.0")]).await;
        let p1 = serve_page(&mut server, "2", 5, &[item("g", "a", "1.1"), item("g", "c", "2.0")]).await;
        let p2 = serve_page(&mut server, "4", 5, &[item("g", "d", "3.0")]).await;

        let backend = EnterpriseSearch::new(Client::new(), endpoint(server.url()), 2, 2000);
        let results = backend.search("foo", &CancellationToken::new()).await.unwrap();
        let keys: Vec<_> = results.iter().map(SearchResult::key).collect();
        assert_eq!(keys, ["g:a", "g:b", "g:c", "g:d"]);
        // First page wins for duplicates
        assert_eq!(results[0].coordinate.to_string(), "g:a:1.0");
        for m in [p0, p1, p2] {
            m.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_stops_at_cap() {
        let mut server = mockito::Server::new_async().await;
        serve_page(&mut server, "0", 100, &[item("g", "a", "1"), item("g", "b", "1")]).await;
        let second = serve_page(&mut server, "2", 100, &[item("g", "c", "1"), item("g", "d", "1")]).await;
        let never = server
            .mock("GET", "/service/local/lucene/search")
            .match_query(Matcher::UrlEncoded("from".into(), "4".into()))
            .expect(0)
            .create_async()
            .await;

        let backend = EnterpriseSearch::new(Client::new(), endpoint(server.url()), 2, 3);
        let results = backend.search("foo", &CancellationToken::new()).await.unwrap();
        assert_eq!(results.len(), 3);
        second.assert_async().await;
        never.assert_async().await;
    }

    #[tokio::test]
    async fn test_drops_results_with_unsafe_names() {
        let mut server = mockito::Server::new_async().await;
        serve_page(
            &mut server,
            "0",
            3,
            &[item("g", "..", "1.0"), item("g..x", "a", "1.0"), item("g", "ok", "1.0")],
        )
        .await;
        let backend = EnterpriseSearch::new(Client::new(), endpoint(server.url()), 2, 2000);
        let results = backend.search("foo", &CancellationToken::new()).await.unwrap();
        let keys: Vec<_> = results.iter().map(SearchResult::key).collect();
        assert_eq!(keys, ["g:ok"]);
    }

    #[tokio::test]
    async fn test_independent_calls_restart_paging() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/service/local/lucene/search")
            .match_query(Matcher::UrlEncoded("from".into(), "0".into()))
            .with_body(format!(r#"{{"totalCount":1,"data":[{}]}}"#, item("g", "a", "1")))
            .expect(2)
            .create_async()
            .await;
        let backend = EnterpriseSearch::new(Client::new(), endpoint(server.url()), 2, 2000);
        assert_eq!(backend.search("foo", &CancellationToken::new()).await.unwrap().len(), 1);
        assert_eq!(backend.search("foo", &CancellationToken::new()).await.unwrap().len(), 1);
        first.assert_async().await;
    }
}
