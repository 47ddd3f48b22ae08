//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.ecopulse.toml` files.

use crate::metrics::Granularity;
use crate::models::RankField;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".ecopulse.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Where projects and metrics come from.
    #[serde(default)]
    pub source: SourceConfig,

    /// Scoring and aggregation settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of concurrent metric fetches.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_output() -> String {
    "ecopulse_report.md".to_string()
}

fn default_concurrency() -> usize {
    4
}

/// Project list and metric source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the search/metrics API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Local metrics directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// JSON file with the project list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects_file: Option<PathBuf>,

    /// Search query sent to the API.
    #[serde(default = "default_query")]
    pub query: String,

    /// Maximum number of projects requested from the search endpoint.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            data_dir: None,
            projects_file: None,
            query: default_query(),
            limit: default_limit(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl SourceConfig {
    /// True when some project source is configured.
    pub fn has_source(&self) -> bool {
        self.api_url.as_deref().is_some_and(|u| !u.trim().is_empty())
            || self.data_dir.is_some()
            || self.projects_file.is_some()
    }
}

fn default_query() -> String {
    "llm".to_string()
}

fn default_limit() -> usize {
    50
}

fn default_timeout() -> u64 {
    30
}

/// Scoring and aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Which time keys feed the calculators.
    #[serde(default)]
    pub granularity: Granularity,

    /// Size of the top/bottom rankings.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Field the rankings are ordered by.
    #[serde(default)]
    pub rank_by: RankField,

    /// Maximum entries in the high-risk and fast-growing lists.
    #[serde(default = "default_list_cap")]
    pub list_cap: usize,

    /// Activity window for the innovation index.
    #[serde(default = "default_active_within_days")]
    pub active_within_days: i64,

    /// Extra keyword rules, checked before the built-in categories.
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            top_n: default_top_n(),
            rank_by: RankField::default(),
            list_cap: default_list_cap(),
            active_within_days: default_active_within_days(),
            categories: BTreeMap::new(),
        }
    }
}

fn default_top_n() -> usize {
    10
}

fn default_list_cap() -> usize {
    20
}

fn default_active_within_days() -> i64 {
    365
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include per-project tables in the Markdown report.
    #[serde(default = "default_true")]
    pub include_projects: bool,

    /// Maximum project rows in the Markdown report.
    #[serde(default = "default_max_project_rows")]
    pub max_project_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_projects: true,
            max_project_rows: default_max_project_rows(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_project_rows() -> usize {
    100
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings. Only values
    /// the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref api_url) = args.api_url {
            self.source.api_url = Some(api_url.clone());
        }
        if let Some(ref data_dir) = args.data_dir {
            self.source.data_dir = Some(data_dir.clone());
        }
        if let Some(ref projects) = args.projects {
            self.source.projects_file = Some(projects.clone());
        }
        if let Some(ref query) = args.query {
            self.source.query = query.clone();
        }
        if let Some(limit) = args.limit {
            self.source.limit = limit;
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }

        if let Some(granularity) = args.granularity {
            self.analysis.granularity = granularity;
        }
        if let Some(rank_by) = args.rank_by {
            self.analysis.rank_by = rank_by;
        }
        if let Some(top) = args.top {
            self.analysis.top_n = top;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check the merged configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.source.has_source() {
            return Err(
                "No project source: pass --api-url, --data-dir or --projects, or set one in [source]"
                    .to_string(),
            );
        }

        if let Some(ref url) = self.source.api_url {
            if !url.trim().is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.general.concurrency == 0 {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.source.limit == 0 {
            return Err("Limit must be at least 1".to_string());
        }

        if self.source.timeout_seconds == 0 {
            return Err("Timeout must be at least 1 second".to_string());
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
