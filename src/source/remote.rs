//! HTTP client for the project search and metrics endpoints.

use crate::metrics::ProjectMetrics;
use crate::models::ProjectDescriptor;
use crate::source::FetchError;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};

/// Client for a metrics API rooted at `base_url`.
#[derive(Debug, Clone)]
pub struct RemoteSource {
    base_url: String,
    timeout_seconds: u64,
    http_client: reqwest::Client,
}

impl RemoteSource {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(concat!("ecopulse/", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!("Using metrics API at {}", base_url);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_seconds,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Search for repositories matching `query`.
    pub async fn search_projects(&self, query: &str, limit: usize) -> Result<Vec<ProjectDescriptor>, FetchError> {
        let url = format!("{}/api/search", self.base_url);
        let limit = limit.to_string();
        let request = self
            .http_client
            .get(&url)
            .query(&[("q", query), ("limit", limit.as_str())]);

        let projects: Vec<ProjectDescriptor> = self.get_json(&url, request, query).await?;
        debug!("Search '{}' returned {} projects", query, projects.len());

        Ok(projects.into_iter().map(ProjectDescriptor::normalized).collect())
    }

    /// Fetch the metric table of one repository.
    pub async fn fetch_metrics(&self, full_name: &str) -> Result<ProjectMetrics, FetchError> {
        let url = format!("{}/api/metrics", self.base_url);
        let request = self.http_client.get(&url).query(&[("repo", full_name)]);

        self.get_json(&url, request, full_name).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
        subject: &str,
    ) -> Result<T, FetchError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    seconds: self.timeout_seconds,
                }
            } else if e.is_connect() {
                FetchError::Connect(self.base_url.clone())
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(subject.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| FetchError::Parse {
            what: format!("response for {}", subject),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> RemoteSource {
        RemoteSource::new(&server.uri(), 5).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let source = RemoteSource::new("http://localhost:8080/", 5).unwrap();
        assert_eq!(source.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_unreachable_host_is_connect_error() {
        // Port 9 (discard) on localhost is closed on any sane test machine.
        let source = RemoteSource::new("http://127.0.0.1:9", 2).unwrap();
        let err = tokio_test::block_on(source.fetch_metrics("org/repo")).unwrap_err();
        assert!(matches!(err, FetchError::Connect(_) | FetchError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_search_sends_query_and_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("q", "agents"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"full_name": "org/one", "language": "Rust"},
                {"full_name": "org/two"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let projects = source_for(&server).search_projects("agents", 2).await.unwrap();

        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].org_name, "org");
        assert_eq!(projects[0].repo_name, "one");
        assert_eq!(projects[0].language.as_deref(), Some("Rust"));
        assert_eq!(projects[1].full_name, "org/two");
    }

    #[tokio::test]
    async fn test_fetch_metrics_sends_repo() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/metrics"))
            .and(query_param("repo", "org/one"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "stars": {"2024-01": 10, "2024-02": 12}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let metrics = source_for(&server).fetch_metrics("org/one").await.unwrap();
        assert!(metrics.names().eq(["stars"]));
    }

    #[tokio::test]
    async fn test_missing_repository_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/metrics"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = source_for(&server).fetch_metrics("org/gone").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(ref name) if name == "org/gone"));
    }

    #[tokio::test]
    async fn test_server_error_is_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = source_for(&server).search_projects("llm", 5).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/metrics"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = source_for(&server).fetch_metrics("org/one").await.unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
    }
}
