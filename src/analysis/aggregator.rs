//! Ecosystem aggregation and statistics.
//!
//! This module folds per-project analyses into an [`EcosystemSummary`] and
//! provides the grouping, ranking and filtering helpers the report uses.

use crate::analysis::scores;
use crate::config::AnalysisConfig;
use crate::models::{
    Averages, EcosystemSummary, FilterState, HealthBucket, ProjectAnalysis, RankField,
    RankedProject, RiskDistribution, RiskLevel, TrendDistribution,
};
use std::collections::{BTreeMap, HashMap};

/// Growth above this percentage puts a project on the fast-growing list.
pub const FAST_GROWTH_THRESHOLD: f64 = 10.0;

/// Knobs for [`summarize`].
#[derive(Debug, Clone)]
pub struct SummaryOptions {
    pub rank_by: RankField,
    pub top_n: usize,
    /// Cap for the high-risk and fast-growing lists.
    pub list_cap: usize,
    /// Window for "recently active" in the innovation index.
    pub active_within_days: i64,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            rank_by: RankField::Stars,
            top_n: 10,
            list_cap: 20,
            active_within_days: 365,
        }
    }
}

impl From<&AnalysisConfig> for SummaryOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            rank_by: config.rank_by,
            top_n: config.top_n,
            list_cap: config.list_cap,
            active_within_days: config.active_within_days,
        }
    }
}

/// Build the ecosystem summary. `None` entries are projects whose metrics
/// could not be fetched; they are counted as failed and excluded from every
/// statistic.
pub fn summarize(records: &[Option<ProjectAnalysis>], options: &SummaryOptions) -> EcosystemSummary {
    let valid = valid_records(records);

    let mut risk_distribution = RiskDistribution::default();
    let mut trend_distribution = TrendDistribution::default();
    for record in &valid {
        risk_distribution.record(record.risk_level);
        trend_distribution.record(record.trend);
    }

    EcosystemSummary {
        total_projects: records.len(),
        analyzed_projects: valid.len(),
        failed_projects: records.len() - valid.len(),
        averages: averages(&valid),
        health_buckets: health_buckets(&valid),
        risk_distribution,
        trend_distribution,
        language_distribution: language_distribution(&valid),
        category_distribution: category_distribution(&valid),
        rank_field: options.rank_by,
        top_projects: top_projects(&valid, options.rank_by, options.top_n),
        bottom_projects: bottom_projects(&valid, options.rank_by, options.top_n),
        high_risk_projects: high_risk_projects(&valid, options.list_cap),
        fast_growing_projects: fast_growing_projects(&valid, options.list_cap),
        innovation_index: scores::innovation_index(&valid, options.active_within_days),
        sustainability: scores::sustainability(&valid),
    }
}

/// The non-null records, in input order.
pub fn valid_records(records: &[Option<ProjectAnalysis>]) -> Vec<&ProjectAnalysis> {
    records.iter().flatten().collect()
}

/// Arithmetic means; each field averages only the records that have it.
pub fn averages(records: &[&ProjectAnalysis]) -> Averages {
    Averages {
        health_score: mean(records.iter().map(|r| r.health_score)),
        growth_rate: mean(records.iter().map(|r| r.growth_rate)),
        momentum: mean(records.iter().map(|r| r.momentum)),
        openrank: mean(records.iter().filter_map(|r| r.openrank)),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Health score histogram in five 20-point buckets.
pub fn health_buckets(records: &[&ProjectAnalysis]) -> Vec<HealthBucket> {
    let mut buckets: Vec<HealthBucket> = (0..5)
        .map(|i| {
            let min = i as f64 * 20.0;
            HealthBucket {
                label: format!("{}-{}", i * 20, (i + 1) * 20),
                min,
                max: min + 20.0,
                count: 0,
            }
        })
        .collect();

    for record in records {
        let index = ((record.health_score / 20.0).floor().max(0.0) as usize).min(4);
        buckets[index].count += 1;
    }

    buckets
}

/// Compute language distribution.
pub fn language_distribution(records: &[&ProjectAnalysis]) -> BTreeMap<String, usize> {
    let mut dist: BTreeMap<String, usize> = BTreeMap::new();

    for record in records {
        *dist.entry(record.language.clone()).or_default() += 1;
    }

    dist
}

/// Compute category distribution.
pub fn category_distribution(records: &[&ProjectAnalysis]) -> BTreeMap<String, usize> {
    let mut dist: BTreeMap<String, usize> = BTreeMap::new();

    for record in records {
        *dist.entry(record.category.clone()).or_default() += 1;
    }

    dist
}

/// Group projects by category.
pub fn group_by_category<'a>(records: &[&'a ProjectAnalysis]) -> HashMap<String, Vec<&'a ProjectAnalysis>> {
    let mut grouped: HashMap<String, Vec<&ProjectAnalysis>> = HashMap::new();

    for record in records {
        grouped.entry(record.category.clone()).or_default().push(*record);
    }

    grouped
}

/// Group projects by language.
pub fn group_by_language<'a>(records: &[&'a ProjectAnalysis]) -> HashMap<String, Vec<&'a ProjectAnalysis>> {
    let mut grouped: HashMap<String, Vec<&ProjectAnalysis>> = HashMap::new();

    for record in records {
        grouped.entry(record.language.clone()).or_default().push(*record);
    }

    grouped
}

/// Sort by `field`, highest first. The sort is stable, so ties keep input
/// order.
pub fn sort_by_field(records: &mut [&ProjectAnalysis], field: RankField) {
    records.sort_by(|a, b| {
        b.rank_value(field)
            .partial_cmp(&a.rank_value(field))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// The `n` highest-ranked projects by `field`.
pub fn top_projects(records: &[&ProjectAnalysis], field: RankField, n: usize) -> Vec<RankedProject> {
    let mut sorted = records.to_vec();
    sort_by_field(&mut sorted, field);
    sorted.truncate(n);
    ranked(&sorted, field)
}

/// The `n` lowest-ranked projects by `field`, lowest first. Ties keep input
/// order.
pub fn bottom_projects(records: &[&ProjectAnalysis], field: RankField, n: usize) -> Vec<RankedProject> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| {
        a.rank_value(field)
            .partial_cmp(&b.rank_value(field))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(n);
    ranked(&sorted, field)
}

fn ranked(records: &[&ProjectAnalysis], field: RankField) -> Vec<RankedProject> {
    records
        .iter()
        .map(|r| RankedProject {
            name: r.name.clone(),
            value: r.rank_value(field),
        })
        .collect()
}

/// High-risk projects in input order, at most `cap`.
pub fn high_risk_projects(records: &[&ProjectAnalysis], cap: usize) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.risk_level == RiskLevel::High)
        .take(cap)
        .map(|r| r.name.clone())
        .collect()
}

/// Projects growing faster than [`FAST_GROWTH_THRESHOLD`], in input order,
/// at most `cap`.
pub fn fast_growing_projects(records: &[&ProjectAnalysis], cap: usize) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.growth_rate > FAST_GROWTH_THRESHOLD)
        .take(cap)
        .map(|r| r.name.clone())
        .collect()
}

/// Apply `filters` to analyzed projects. Failed (`None`) entries are kept so
/// the summary still reports them.
pub fn apply_filters(records: Vec<Option<ProjectAnalysis>>, filters: &FilterState) -> Vec<Option<ProjectAnalysis>> {
    if filters.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| r.as_ref().map_or(true, |a| filters.matches(a)))
        .collect()
}

/// Generate a text summary of ecosystem statistics.
pub fn generate_summary_text(summary: &EcosystemSummary) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "Projects: {} analyzed, {} failed",
        summary.analyzed_projects, summary.failed_projects
    ));
    lines.push(format!("Average health: {:.1}", summary.averages.health_score));
    lines.push(format!("Average growth: {:.1}%", summary.averages.growth_rate));
    lines.push(format!(
        "- {} High risk: {}",
        RiskLevel::High.emoji(),
        summary.risk_distribution.high
    ));
    lines.push(format!(
        "- {} Medium risk: {}",
        RiskLevel::Medium.emoji(),
        summary.risk_distribution.medium
    ));
    lines.push(format!(
        "- {} Low risk: {}",
        RiskLevel::Low.emoji(),
        summary.risk_distribution.low
    ));

    if !summary.category_distribution.is_empty() {
        lines.push(String::new());
        lines.push("By Category:".to_string());

        let mut categories: Vec<_> = summary.category_distribution.iter().collect();
        categories.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

        for (category, count) in categories {
            lines.push(format!("- {}: {}", category, count));
        }
    }

    lines.join("\n")
}
