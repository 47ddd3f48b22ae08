//! Project list and metric data sources.
//!
//! Projects come from a JSON file, the search endpoint, or discovery in a
//! local data directory, in that order of preference. Metrics are read from
//! the data directory when present and fetched over HTTP otherwise.

pub mod local;
pub mod remote;

pub use local::{load_projects_file, LocalSource};
pub use remote::RemoteSource;

use crate::config::SourceConfig;
use crate::metrics::ProjectMetrics;
use crate::models::ProjectDescriptor;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while loading projects or metrics.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no data for {0}")]
    NotFound(String),

    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("cannot connect to {0}")]
    Connect(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid repository name '{0}', expected owner/repo")]
    InvalidName(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("no project source configured")]
    NoSource,
}

/// The configured combination of project and metric sources.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub projects_file: Option<PathBuf>,
    pub local: Option<LocalSource>,
    pub remote: Option<RemoteSource>,
    pub query: String,
    pub limit: usize,
}

impl TryFrom<&SourceConfig> for Sources {
    type Error = FetchError;

    fn try_from(config: &SourceConfig) -> Result<Self, Self::Error> {
        let remote = match config.api_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Some(RemoteSource::new(url, config.timeout_seconds)?),
            _ => None,
        };

        Ok(Self {
            projects_file: config.projects_file.clone(),
            local: config.data_dir.as_ref().map(LocalSource::new),
            remote,
            query: config.query.clone(),
            limit: config.limit,
        })
    }
}

impl Sources {
    /// Short description for report metadata.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref file) = self.projects_file {
            parts.push(format!("projects file {}", file.display()));
        }
        if let Some(ref local) = self.local {
            parts.push(format!("data dir {}", local.data_dir().display()));
        }
        if let Some(ref remote) = self.remote {
            parts.push(format!("API {} (query '{}')", remote.base_url(), self.query));
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Load the project list. This is the only fatal step of a run.
    pub async fn load_projects(&self) -> Result<Vec<ProjectDescriptor>, FetchError> {
        let projects = if let Some(ref file) = self.projects_file {
            let file = file.clone();
            tokio::task::spawn_blocking(move || load_projects_file(&file)).await??
        } else if let Some(ref remote) = self.remote {
            // The limit is a search parameter; curated lists and discovery
            // are taken whole.
            let mut found = remote.search_projects(&self.query, self.limit).await?;
            found.truncate(self.limit.max(1));
            found
        } else if let Some(ref local) = self.local {
            let local = local.clone();
            tokio::task::spawn_blocking(move || local.discover_projects()).await??
        } else {
            return Err(FetchError::NoSource);
        };

        let mut seen = std::collections::HashSet::new();
        let projects: Vec<ProjectDescriptor> = projects
            .into_iter()
            .filter(|p| seen.insert(p.full_name.clone()))
            .collect();

        info!("Loaded {} projects", projects.len());
        Ok(projects)
    }

    /// Metrics for one project: the data directory first, then the API.
    pub async fn fetch_metrics(&self, full_name: &str) -> Result<ProjectMetrics, FetchError> {
        if let Some(ref local) = self.local {
            let local = local.clone();
            let name = full_name.to_string();
            match tokio::task::spawn_blocking(move || local.load_metrics(&name)).await? {
                Ok(metrics) => return Ok(metrics),
                Err(FetchError::NotFound(_)) if self.remote.is_some() => {
                    debug!("{} not in data dir, trying API", full_name);
                }
                Err(e) => return Err(e),
            }
        }

        match self.remote {
            Some(ref remote) => remote.fetch_metrics(full_name).await,
            None => Err(FetchError::NotFound(full_name.to_string())),
        }
    }

    /// Fetch metrics for every project with at most `concurrency` requests
    /// in flight. The result is index-aligned with `projects`; a failed
    /// fetch is `None`.
    pub async fn fetch_all(
        &self,
        projects: &[ProjectDescriptor],
        concurrency: usize,
        show_progress: bool,
    ) -> Vec<Option<ProjectMetrics>> {
        let progress = if show_progress {
            let pb = ProgressBar::new(projects.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let results: Vec<Option<ProjectMetrics>> = stream::iter(projects)
            .map(|project| {
                let progress = progress.clone();
                async move {
                    progress.set_message(project.full_name.clone());
                    let result = match self.fetch_metrics(&project.full_name).await {
                        Ok(metrics) => {
                            if metrics.is_empty() {
                                debug!("{} has no metric data", project.full_name);
                            }
                            Some(metrics)
                        }
                        Err(e) => {
                            warn!("Failed to fetch metrics for {}: {}", project.full_name, e);
                            None
                        }
                    };
                    progress.inc(1);
                    result
                }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

        progress.finish_and_clear();

        let failed = results.iter().filter(|r| r.is_none()).count();
        if failed > 0 {
            warn!("{} of {} metric fetches failed", failed, projects.len());
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn local_sources(dir: &TempDir) -> Sources {
        Sources {
            local: Some(LocalSource::new(dir.path())),
            limit: 50,
            ..Default::default()
        }
    }

    #[test]
    fn test_from_config() {
        let config = SourceConfig {
            api_url: Some("http://localhost:8080/".to_string()),
            data_dir: Some(PathBuf::from("./data")),
            ..Default::default()
        };
        let sources = Sources::try_from(&config).unwrap();

        assert!(sources.local.is_some());
        assert_eq!(sources.remote.as_ref().map(|r| r.base_url()), Some("http://localhost:8080"));
        assert_eq!(sources.query, "llm");
        assert_eq!(
            sources.describe(),
            "data dir ./data, API http://localhost:8080 (query 'llm')"
        );
    }

    #[test]
    fn test_no_source_is_error() {
        let sources = Sources::default();
        let err = tokio_test::block_on(sources.load_projects()).unwrap_err();
        assert!(matches!(err, FetchError::NoSource));
        assert_eq!(sources.describe(), "none");
    }

    #[test]
    fn test_projects_file_preferred_and_deduplicated() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("data/x")).unwrap();
        fs::write(tmp.path().join("data/x/y.json"), "{}").unwrap();
        fs::write(
            tmp.path().join("projects.json"),
            r#"[{"full_name": "a/b"}, {"full_name": "c/d"}, {"full_name": "a/b"}]"#,
        )
        .unwrap();

        let sources = Sources {
            projects_file: Some(tmp.path().join("projects.json")),
            local: Some(LocalSource::new(tmp.path().join("data"))),
            limit: 50,
            ..Default::default()
        };

        let projects = tokio_test::block_on(sources.load_projects()).unwrap();
        let names: Vec<_> = projects.iter().map(|p| p.full_name.as_str()).collect();
        assert_eq!(names, vec!["a/b", "c/d"]);
    }

    #[test]
    fn test_limit_does_not_truncate_discovery() {
        let tmp = TempDir::new().unwrap();
        for repo in ["a", "b", "c"] {
            fs::create_dir_all(tmp.path().join("org")).unwrap();
            fs::write(tmp.path().join(format!("org/{}.json", repo)), "{}").unwrap();
        }
        let sources = Sources {
            limit: 2,
            ..local_sources(&tmp)
        };

        let projects = tokio_test::block_on(sources.load_projects()).unwrap();
        assert_eq!(projects.len(), 3);
    }

    #[test]
    fn test_limit_does_not_truncate_projects_file() {
        let tmp = TempDir::new().unwrap();
        let entries: Vec<String> = (0..60)
            .map(|i| format!(r#"{{"full_name": "org/repo{}"}}"#, i))
            .collect();
        fs::write(tmp.path().join("projects.json"), format!("[{}]", entries.join(","))).unwrap();

        let sources = Sources {
            projects_file: Some(tmp.path().join("projects.json")),
            limit: 50,
            ..Default::default()
        };

        let projects = tokio_test::block_on(sources.load_projects()).unwrap();
        assert_eq!(projects.len(), 60);
    }

    #[tokio::test]
    async fn test_fetch_metrics_falls_back_to_api() {
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("org")).unwrap();
        fs::write(tmp.path().join("org/local.json"), r#"{"forks": {"2024-01": 3}}"#).unwrap();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/metrics"))
            .and(query_param("repo", "org/remote"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"stars": {"2024-01": 7}}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sources = Sources {
            remote: Some(RemoteSource::new(&server.uri(), 5).unwrap()),
            ..local_sources(&tmp)
        };

        let local = sources.fetch_metrics("org/local").await.unwrap();
        assert!(local.names().eq(["forks"]));

        let remote = sources.fetch_metrics("org/remote").await.unwrap();
        assert!(remote.names().eq(["stars"]));
    }

    #[tokio::test]
    async fn test_limit_caps_search_results() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"full_name": "a/one"}, {"full_name": "a/two"}, {"full_name": "a/three"}]"#,
            ))
            .mount(&server)
            .await;

        let sources = Sources {
            remote: Some(RemoteSource::new(&server.uri(), 5).unwrap()),
            query: "llm".to_string(),
            limit: 2,
            ..Default::default()
        };

        let projects = sources.load_projects().await.unwrap();
        let names: Vec<_> = projects.iter().map(|p| p.full_name.as_str()).collect();
        assert_eq!(names, vec!["a/one", "a/two"]);
    }

    #[test]
    fn test_fetch_all_preserves_order_and_failures() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("org")).unwrap();
        fs::write(tmp.path().join("org/one.json"), r#"{"stars": {"2024-01": 5}}"#).unwrap();
        fs::write(tmp.path().join("org/three.json"), r#"{"forks": {"2024-01": 2}}"#).unwrap();

        let sources = local_sources(&tmp);
        let projects: Vec<_> = ["org/one", "org/two", "org/three"]
            .iter()
            .map(|n| ProjectDescriptor::from_full_name(n).unwrap())
            .collect();

        let results = tokio_test::block_on(sources.fetch_all(&projects, 2, false));
        assert_eq!(results.len(), 3);
        assert!(results[0].as_ref().unwrap().names().eq(["stars"]));
        assert!(results[1].is_none());
        assert!(results[2].as_ref().unwrap().names().eq(["forks"]));
    }
}
