//! Public registry text search.
//!
//! `GET {base}/solrsearch/select?q=<query>&rows=<n>&wt=json`

use async_trait::async_trait;
use kiln_schema::{Coordinate, SearchResult, Version, VersionSpec};
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{SearchBackend, SearchError};

#[derive(Debug, Deserialize)]
struct SelectResponse {
    response: SelectBody,
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    #[serde(default)]
    docs: Vec<Doc>,
}

#[derive(Debug, Deserialize)]
struct Doc {
    g: String,
    a: String,
    #[serde(rename = "latestVersion")]
    latest_version: Option<String>,
    #[serde(rename = "repositoryId")]
    repository_id: Option<String>,
}

/// Searches a public registry's text index.
#[derive(Debug, Clone)]
pub struct RegistrySearch {
    client: Client,
    base_url: String,
    label: String,
    rows: usize,
}

impl RegistrySearch {
    pub fn new(client: Client, base_url: impl Into<String>, label: impl Into<String>, rows: usize) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            label: label.into(),
            rows,
        }
    }

    fn to_result(&self, doc: Doc) -> Option<SearchResult> {
        let version = doc
            .latest_version
            .filter(|v| !v.is_empty())
            .map_or(VersionSpec::Latest, |v| VersionSpec::Exact(Version::new(&v)));
        let source = doc.repository_id.unwrap_or_else(|| self.label.clone());
        match Coordinate::try_new(doc.g, doc.a, version) {
            Ok(coordinate) => Some(SearchResult::new(coordinate, source)),
            Err(e) => {
                tracing::debug!("{} dropped a result: {e}", self.label);
                None
            }
        }
    }
}

#[async_trait]
impl SearchBackend for RegistrySearch {
    fn label(&self) -> &str {
        &self.label
    }

    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        let url = format!("{}/solrsearch/select", self.base_url);
        let rows = self.rows.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[("q", query), ("rows", rows.as_str()), ("wt", "json")])
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SearchError::Status {
                backend: self.label.clone(),
                status: resp.status().as_u16(),
            });
        }
        let body: SelectResponse = serde_json::from_slice(&resp.bytes().await?)?;
        tracing::debug!("{} returned {} docs", self.label, body.response.docs.len());
        Ok(body
            .response
            .docs
            .into_iter()
            .filter_map(|d| self.to_result(d))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_parses_docs() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/solrsearch/select")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "foo bar".into()),
                Matcher::UrlEncoded("rows".into(), "20".into()),
                Matcher::UrlEncoded("wt".into(), "json".into()),
            ]))
            .with_body(
                r#"{"responseHeader":{"status":0},"response":{"numFound":2,"start":0,"docs":[
                    {"id":"group.a:foo","g":"group.a","a":"foo","latestVersion":"1.9","repositoryId":"central"},
                    {"id":"group.b:foo","g":"group.b","a":"foo"},
                    {"id":"group.c:..","g":"group.c","a":"..","latestVersion":"1.0"},
                    {"id":"group.d:bar","g":"group.d","a":"bar","latestVersion":"../../x"}
                ]}}"#,
            )
            .create_async()
            .await;

        let backend = RegistrySearch::new(Client::new(), server.url(), "public", 20);
        let results = backend.search("foo bar", &CancellationToken::new()).await.unwrap();
        mock.assert_async().await;

        // Names that would leave their cache directory are dropped
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].coordinate.to_string(), "group.a:foo:1.9");
        assert_eq!(results[0].source, "central");
        assert!(results[1].coordinate.version().is_latest());
        assert_eq!(results[1].source, "public");
    }

    #[tokio::test]
    async fn test_malformed_body_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/solrsearch/select")
            .match_query(Matcher::Any)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;
        let backend = RegistrySearch::new(Client::new(), server.url(), "public", 20);
        assert!(matches!(
            backend.search("foo", &CancellationToken::new()).await,
            Err(SearchError::Parse(_))
        ));
    }
}
