//! Per-project metric time series and their normalization.
//!
//! A project's metrics arrive as a table of named series. This module
//! resolves metric names to a closed set of [`MetricKind`]s, applies one
//! explicit [`Granularity`] to every read, and reduces each series to the
//! latest and previous values the calculators work with.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// The metrics the calculators understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Stars,
    Forks,
    Contributors,
    Issues,
    PullRequests,
    OpenRank,
    Attention,
    Activity,
    IssueResponseTime,
}

impl MetricKind {
    pub const ALL: [MetricKind; 9] = [
        MetricKind::Stars,
        MetricKind::Forks,
        MetricKind::Contributors,
        MetricKind::Issues,
        MetricKind::PullRequests,
        MetricKind::OpenRank,
        MetricKind::Attention,
        MetricKind::Activity,
        MetricKind::IssueResponseTime,
    ];

    /// Canonical series name.
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Stars => "stars",
            MetricKind::Forks => "forks",
            MetricKind::Contributors => "contributors",
            MetricKind::Issues => "issues",
            MetricKind::PullRequests => "pull_requests",
            MetricKind::OpenRank => "openrank",
            MetricKind::Attention => "attention",
            MetricKind::Activity => "activity",
            MetricKind::IssueResponseTime => "issue_response_time",
        }
    }

    /// Resolve a series name, including the aliases used by OpenDigger-style
    /// exports, to a metric kind.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.trim().to_lowercase().replace('-', "_").as_str() {
            "stars" | "stargazers" => MetricKind::Stars,
            "forks" | "technical_fork" => MetricKind::Forks,
            "contributors" | "participants" | "new_contributors" => MetricKind::Contributors,
            "issues" | "issues_new" | "issues_opened" => MetricKind::Issues,
            "pull_requests" | "change_requests" | "prs" => MetricKind::PullRequests,
            "openrank" => MetricKind::OpenRank,
            "attention" => MetricKind::Attention,
            "activity" => MetricKind::Activity,
            "issue_response_time" => MetricKind::IssueResponseTime,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which period keys a run reads from each series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Only `YYYY-MM` keys.
    #[default]
    Monthly,
    /// Every key, in key order.
    All,
}

impl Granularity {
    pub fn accepts(&self, key: &str) -> bool {
        match self {
            Granularity::Monthly => is_monthly_key(key),
            Granularity::All => true,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Monthly => write!(f, "monthly"),
            Granularity::All => write!(f, "all"),
        }
    }
}

/// Returns true for keys shaped exactly like `YYYY-MM` with a valid month.
pub fn is_monthly_key(key: &str) -> bool {
    let bytes = key.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return false;
    }
    if !bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit) {
        return false;
    }
    matches!(key[5..].parse::<u32>(), Ok(1..=12))
}

/// Parse a period key into the first day it covers.
///
/// Understands `YYYY-MM-DD`, `YYYY-MM` and `YYYY`; anything else is `None`.
pub fn period_start(key: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(key, "%Y-%m-%d") {
        return Some(date);
    }
    if is_monthly_key(key) {
        return NaiveDate::parse_from_str(&format!("{}-01", key), "%Y-%m-%d").ok();
    }
    if key.len() == 4 {
        let year = key.parse::<i32>().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }
    None
}

/// Parse a period key into the last day it covers: the day itself, the last
/// day of the month, or December 31.
pub fn period_end(key: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(key, "%Y-%m-%d") {
        return Some(date);
    }
    let start = period_start(key)?;
    let next = if is_monthly_key(key) {
        start.checked_add_months(chrono::Months::new(1))?
    } else {
        start.checked_add_months(chrono::Months::new(12))?
    };
    next.pred_opt()
}

/// A single observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub time: String,
    pub value: f64,
}

/// Series as they appear on the wire: either a list of points or a map of
/// period key to value.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSeries {
    Points(Vec<MetricPoint>),
    Keyed(BTreeMap<String, Value>),
}

/// One metric's observations, sorted by period key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSeries", into = "Vec<MetricPoint>")]
pub struct MetricSeries {
    points: Vec<MetricPoint>,
}

impl From<RawSeries> for MetricSeries {
    fn from(raw: RawSeries) -> Self {
        match raw {
            RawSeries::Points(points) => Self::new(points),
            RawSeries::Keyed(map) => Self::new(
                map.into_iter()
                    .filter_map(|(time, value)| numeric_value(&value).map(|value| MetricPoint { time, value }))
                    .collect(),
            ),
        }
    }
}

impl From<MetricSeries> for Vec<MetricPoint> {
    fn from(series: MetricSeries) -> Self {
        series.points
    }
}

/// Plain numbers are taken as-is; aggregate objects (e.g. response-time
/// summaries) contribute their `avg`.
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::Object(map) => map.get("avg").and_then(numeric_value),
        _ => None,
    }
}

impl MetricSeries {
    pub fn new(mut points: Vec<MetricPoint>) -> Self {
        points.retain(|p| p.value.is_finite());
        points.sort_by(|a, b| a.time.cmp(&b.time));
        Self { points }
    }

    /// Build a series of consecutive months starting at `start` (`YYYY-MM`).
    pub fn monthly(start: &str, values: &[f64]) -> Self {
        let first = period_start(start);
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let time = first
                    .and_then(|d| d.checked_add_months(chrono::Months::new(i as u32)))
                    .map(|d| d.format("%Y-%m").to_string())
                    .unwrap_or_else(|| format!("{}+{}", start, i));
                MetricPoint { time, value }
            })
            .collect();
        Self::new(points)
    }

    pub fn points(&self) -> &[MetricPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Values accepted by `granularity`, oldest first.
    pub fn values(&self, granularity: Granularity) -> Vec<f64> {
        self.points
            .iter()
            .filter(|p| granularity.accepts(&p.time))
            .map(|p| p.value)
            .collect()
    }

    /// The last `n` accepted values, oldest first.
    pub fn window(&self, n: usize, granularity: Granularity) -> Vec<f64> {
        let values = self.values(granularity);
        let skip = values.len().saturating_sub(n);
        values[skip..].to_vec()
    }

    /// Latest value and, when at least two points exist, the one before it.
    pub fn latest_and_previous(&self, granularity: Granularity) -> Reading {
        let tail = self.window(2, granularity);
        match tail.as_slice() {
            [previous, latest] => Reading {
                latest: Some(*latest),
                previous: Some(*previous),
            },
            [latest] => Reading {
                latest: Some(*latest),
                previous: None,
            },
            _ => Reading::default(),
        }
    }

    /// Most recent accepted period key.
    pub fn last_period(&self, granularity: Granularity) -> Option<&str> {
        self.points
            .iter()
            .rev()
            .find(|p| granularity.accepts(&p.time))
            .map(|p| p.time.as_str())
    }
}

/// Latest and previous value of one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading {
    pub latest: Option<f64>,
    pub previous: Option<f64>,
}

impl Reading {
    /// Percent change from previous to latest. `None` without two points;
    /// a zero previous value yields 0.
    pub fn change_pct(&self) -> Option<f64> {
        let (latest, previous) = (self.latest?, self.previous?);
        if previous == 0.0 {
            return Some(0.0);
        }
        Some((latest - previous) / previous * 100.0)
    }
}

/// The metric table for one project, keyed by series name as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectMetrics {
    series: BTreeMap<String, MetricSeries>,
}

impl ProjectMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, series: MetricSeries) {
        self.series.insert(name.into(), series);
    }

    #[allow(dead_code)] // Builder for fixtures and tests
    pub fn with(mut self, name: impl Into<String>, series: MetricSeries) -> Self {
        self.insert(name, series);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(MetricSeries::is_empty)
    }

    #[allow(dead_code)] // Inspection helper for tests
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Find the series for `kind`. The canonical name wins over aliases;
    /// among aliases the first non-empty one in name order is used.
    pub fn series(&self, kind: MetricKind) -> Option<&MetricSeries> {
        if let Some(series) = self.series.get(kind.name()).filter(|s| !s.is_empty()) {
            return Some(series);
        }
        self.series
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .find(|(name, _)| MetricKind::from_name(name) == Some(kind))
            .map(|(_, s)| s)
    }
}

/// Latest/previous readings for every known metric of one project.
#[derive(Debug, Clone, Default)]
pub struct MetricSnapshot {
    readings: HashMap<MetricKind, Reading>,
    last_period: Option<String>,
}

impl MetricSnapshot {
    pub fn from_metrics(metrics: &ProjectMetrics, granularity: Granularity) -> Self {
        let mut readings = HashMap::new();
        let mut last_period: Option<String> = None;

        for kind in MetricKind::ALL {
            let Some(series) = metrics.series(kind) else {
                continue;
            };
            let reading = series.latest_and_previous(granularity);
            if reading.latest.is_some() {
                readings.insert(kind, reading);
            }
            if let Some(period) = series.last_period(granularity) {
                if last_period.as_deref().map_or(true, |p| period > p) {
                    last_period = Some(period.to_string());
                }
            }
        }

        Self {
            readings,
            last_period,
        }
    }

    pub fn reading(&self, kind: MetricKind) -> Reading {
        self.readings.get(&kind).copied().unwrap_or_default()
    }

    pub fn latest(&self, kind: MetricKind) -> Option<f64> {
        self.reading(kind).latest
    }

    /// Metrics with no usable data, in declaration order.
    pub fn missing(&self) -> Vec<MetricKind> {
        MetricKind::ALL
            .into_iter()
            .filter(|k| !self.readings.contains_key(k))
            .collect()
    }

    pub fn has_any(&self) -> bool {
        !self.readings.is_empty()
    }

    pub fn last_period(&self) -> Option<&str> {
        self.last_period.as_deref()
    }
}

/// Whole days between the end of `period` and `now`, never negative.
/// A period that has not finished yet counts as 0.
pub fn days_since_period(period: &str, now: DateTime<Utc>) -> Option<i64> {
    let end = period_end(period)?;
    Some((now.date_naive() - end).num_days().max(0))
}
