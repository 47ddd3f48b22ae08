//! Data models for ecosystem analytics.
//!
//! This module contains the core data structures shared by the sources,
//! the calculators, the aggregator and the report writers.

use crate::metrics::Granularity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A repository as returned by the project search source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    /// `owner/repo`; the identity key.
    pub full_name: String,
    #[serde(default)]
    pub repo_name: String,
    #[serde(default)]
    pub org_name: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Last push or update reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProjectDescriptor {
    /// Creates a bare descriptor from `owner/repo`.
    pub fn from_full_name(full_name: &str) -> Option<Self> {
        let (org, repo) = split_full_name(full_name)?;
        Some(Self {
            full_name: format!("{}/{}", org, repo),
            repo_name: repo.to_string(),
            org_name: org.to_string(),
            language: None,
            description: None,
            topics: Vec::new(),
            updated_at: None,
        })
    }

    /// Fills `repo_name` and `org_name` from `full_name` when the source
    /// left them out.
    pub fn normalized(mut self) -> Self {
        if let Some((org, repo)) = split_full_name(&self.full_name) {
            if self.org_name.is_empty() {
                self.org_name = org.to_string();
            }
            if self.repo_name.is_empty() {
                self.repo_name = repo.to_string();
            }
        }
        self
    }

    /// Language, or "Unknown".
    pub fn language_or_unknown(&self) -> &str {
        self.language
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or("Unknown")
    }
}

/// Split `owner/repo` into its two non-empty parts.
pub fn split_full_name(full_name: &str) -> Option<(&str, &str)> {
    let (org, repo) = full_name.trim().split_once('/')?;
    if org.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((org, repo))
}

/// Coarse project risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

impl RiskLevel {
    /// Returns an emoji representation of the risk level.
    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Low => "🟢",
            RiskLevel::Medium => "🟡",
            RiskLevel::High => "🔴",
        }
    }
}

/// Direction of star growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Stable,
    Declining,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Rising => write!(f, "Rising"),
            Trend::Stable => write!(f, "Stable"),
            Trend::Declining => write!(f, "Declining"),
        }
    }
}

impl Trend {
    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Rising => "↑",
            Trend::Stable => "→",
            Trend::Declining => "↓",
        }
    }
}

/// Field used to order top/bottom project slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RankField {
    #[default]
    Stars,
    Health,
    Growth,
    Momentum,
    #[value(name = "openrank")]
    OpenRank,
}

impl fmt::Display for RankField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankField::Stars => write!(f, "Stars"),
            RankField::Health => write!(f, "Health"),
            RankField::Growth => write!(f, "Growth"),
            RankField::Momentum => write!(f, "Momentum"),
            RankField::OpenRank => write!(f, "OpenRank"),
        }
    }
}

/// Derived analytics for one project. Rebuilt on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectAnalysis {
    /// `owner/repo`.
    pub name: String,
    pub language: String,
    pub category: String,
    /// 0-100.
    pub health_score: f64,
    /// Percent change of stars between the two latest points.
    pub growth_rate: f64,
    pub risk_level: RiskLevel,
    pub risk_score: u32,
    /// 0-100.
    pub momentum: f64,
    pub trend: Trend,
    pub stars: Option<f64>,
    pub forks: Option<f64>,
    pub contributors: Option<f64>,
    pub issues: Option<f64>,
    pub pull_requests: Option<f64>,
    pub openrank: Option<f64>,
    pub days_since_activity: Option<i64>,
    /// Metrics with no data, as opposed to metrics reporting zero.
    #[serde(default)]
    pub missing_metrics: Vec<String>,
}

impl ProjectAnalysis {
    /// Value used when ranking by `field`. Missing values rank as 0.
    pub fn rank_value(&self, field: RankField) -> f64 {
        match field {
            RankField::Stars => self.stars.unwrap_or(0.0),
            RankField::Health => self.health_score,
            RankField::Growth => self.growth_rate,
            RankField::Momentum => self.momentum,
            RankField::OpenRank => self.openrank.unwrap_or(0.0),
        }
    }

    /// Issues opened per pull request, with at least one PR in the divisor.
    pub fn issue_pr_ratio(&self) -> Option<f64> {
        let issues = self.issues?;
        Some(issues / self.pull_requests.unwrap_or(0.0).max(1.0))
    }
}

/// Means over the successfully analyzed projects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Averages {
    pub health_score: f64,
    pub growth_rate: f64,
    pub momentum: f64,
    pub openrank: f64,
}

/// Count of projects whose health score falls in `[min, max)`; the last
/// bucket includes 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthBucket {
    pub label: String,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskDistribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl RiskDistribution {
    pub fn record(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendDistribution {
    pub rising: usize,
    pub stable: usize,
    pub declining: usize,
}

impl TrendDistribution {
    pub fn record(&mut self, trend: Trend) {
        match trend {
            Trend::Rising => self.rising += 1,
            Trend::Stable => self.stable += 1,
            Trend::Declining => self.declining += 1,
        }
    }
}

/// A project name with the value it was ranked by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedProject {
    pub name: String,
    pub value: f64,
}

/// Share of projects (0-100) crossing sustainability thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sustainability {
    /// Health > 60, more than 5 contributors and not high risk.
    pub overall: f64,
    /// Issues per PR at most 5.
    pub governance: f64,
    /// At least 10 contributors.
    pub community: f64,
    /// Health > 60.
    pub technical: f64,
}

/// Ecosystem-wide rollup of all project analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcosystemSummary {
    pub total_projects: usize,
    pub analyzed_projects: usize,
    pub failed_projects: usize,
    pub averages: Averages,
    pub health_buckets: Vec<HealthBucket>,
    pub risk_distribution: RiskDistribution,
    pub trend_distribution: TrendDistribution,
    pub language_distribution: BTreeMap<String, usize>,
    pub category_distribution: BTreeMap<String, usize>,
    pub rank_field: RankField,
    pub top_projects: Vec<RankedProject>,
    pub bottom_projects: Vec<RankedProject>,
    pub high_risk_projects: Vec<String>,
    pub fast_growing_projects: Vec<String>,
    /// 0-100.
    pub innovation_index: f64,
    pub sustainability: Sustainability,
}

/// Filters applied to analyses before aggregation. Exported with the
/// summary so a reader knows which slice it describes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_stars: Option<f64>,
    /// Keep only projects at or above this risk level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_risk: Option<RiskLevel>,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.language.is_none()
            && self.category.is_none()
            && self.min_stars.is_none()
            && self.min_risk.is_none()
    }

    /// Whether `analysis` passes every active filter. Language and category
    /// compare case-insensitively.
    pub fn matches(&self, analysis: &ProjectAnalysis) -> bool {
        if let Some(ref language) = self.language {
            if !analysis.language.eq_ignore_ascii_case(language) {
                return false;
            }
        }
        if let Some(ref category) = self.category {
            if !analysis.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(min) = self.min_stars {
            if analysis.stars.unwrap_or(0.0) < min {
                return false;
            }
        }
        if let Some(level) = self.min_risk {
            if analysis.risk_level < level {
                return false;
            }
        }
        true
    }
}

/// Metadata about one analytics run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub tool_version: String,
    /// Human-readable description of where data came from.
    pub source: String,
    pub granularity: Granularity,
    pub duration_seconds: f64,
}

/// The complete analytics report; also the JSON export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    #[serde(default)]
    pub filters: FilterState,
    pub summary: EcosystemSummary,
    pub projects: Vec<ProjectAnalysis>,
}
