//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::metrics::Granularity;
use crate::models::{FilterState, RankField, RiskLevel};
use clap::Parser;
use std::path::PathBuf;

/// EcoPulse - health, growth and risk analytics for open-source ecosystems
///
/// Loads a set of GitHub repositories with their time-series metrics,
/// scores every project and writes an ecosystem report.
///
/// Examples:
///   ecopulse --data-dir ./data
///   ecopulse --api-url http://localhost:8080 --query llm --limit 100
///   ecopulse --projects projects.json --data-dir ./data --format json -o report.json
///   ecopulse --data-dir ./data --fail-on high
///   ecopulse --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Base URL of the search/metrics API
    #[arg(long, value_name = "URL", env = "ECOPULSE_API_URL")]
    pub api_url: Option<String>,

    /// Local metrics directory ({owner}/{repo}.json or {owner}/{repo}/{metric}.json)
    #[arg(long, value_name = "DIR", env = "ECOPULSE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// JSON file with the project list
    ///
    /// Takes precedence over the API search and over data directory discovery.
    #[arg(long, value_name = "FILE")]
    pub projects: Option<PathBuf>,

    /// Search query used to find projects through the API
    #[arg(long, value_name = "QUERY")]
    pub query: Option<String>,

    /// Maximum number of projects returned by the API search
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .ecopulse.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of concurrent metric fetches
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Which time keys to score (monthly, all)
    #[arg(long, value_name = "GRANULARITY")]
    pub granularity: Option<Granularity>,

    /// Field used for the top/bottom rankings
    #[arg(long, value_name = "FIELD")]
    pub rank_by: Option<RankField>,

    /// Size of the top/bottom rankings
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Only report projects in this language
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Only report projects in this category
    #[arg(long, value_name = "CATEGORY")]
    pub category: Option<String>,

    /// Only report projects with at least this many stars
    #[arg(long, value_name = "STARS")]
    pub min_stars: Option<f64>,

    /// Only report projects at or above this risk level
    #[arg(long, value_name = "LEVEL")]
    pub min_risk: Option<RiskThreshold>,

    /// Fail if some project is at or above this risk level
    ///
    /// Useful for CI pipelines. Exit code 2 when the threshold is reached.
    /// Values: high, medium, low
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<RiskThreshold>,

    /// Re-run the analysis every SECS seconds until interrupted
    #[arg(long, value_name = "SECS")]
    pub watch: Option<u64>,

    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Generate a default .ecopulse.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON export document
    Json,
}

/// Risk level for --fail-on and --min-risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum RiskThreshold {
    Low,
    Medium,
    High,
}

impl From<RiskThreshold> for RiskLevel {
    fn from(level: RiskThreshold) -> Self {
        match level {
            RiskThreshold::Low => RiskLevel::Low,
            RiskThreshold::Medium => RiskLevel::Medium,
            RiskThreshold::High => RiskLevel::High,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    ///
    /// Checks that need the config file (such as "is any source set") run
    /// on the merged [`Config`](crate::config::Config) instead.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.limit == Some(0) {
            return Err("Limit must be at least 1".to_string());
        }

        if self.top == Some(0) {
            return Err("Top must be at least 1".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.watch == Some(0) {
            return Err("Watch interval must be at least 1 second".to_string());
        }

        if let Some(min) = self.min_stars {
            if !min.is_finite() || min < 0.0 {
                return Err("Minimum stars must be a non-negative number".to_string());
            }
        }

        if let Some(ref dir) = self.data_dir {
            if !dir.is_dir() {
                return Err(format!("Data directory does not exist: {}", dir.display()));
            }
        }

        if let Some(ref file) = self.projects {
            if !file.is_file() {
                return Err(format!("Projects file does not exist: {}", file.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings. `--quiet` wins
    /// over a config file that asks for verbose output.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Filters requested on the command line. `query` is recorded for the
    /// report but does not filter.
    pub fn filter_state(&self, query: Option<String>) -> FilterState {
        FilterState {
            query,
            language: self.language.clone(),
            category: self.category.clone(),
            min_stars: self.min_stars,
            min_risk: self.min_risk.map(RiskLevel::from),
        }
    }
}
