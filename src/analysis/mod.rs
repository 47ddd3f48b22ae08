//! Project analysis and ecosystem aggregation.
//!
//! [`analyze_project`] turns one descriptor plus its metric table into a
//! [`ProjectAnalysis`]; the aggregator folds those into an
//! [`EcosystemSummary`](crate::models::EcosystemSummary).

pub mod aggregator;
pub mod classify;
pub mod scores;

pub use aggregator::*;
pub use classify::CategoryRules;

use crate::metrics::{days_since_period, Granularity, MetricKind, MetricSnapshot, ProjectMetrics};
use crate::models::{ProjectAnalysis, ProjectDescriptor};
use chrono::{DateTime, Utc};
use scores::{HealthInputs, RiskSignals};
use tracing::debug;

/// Everything the per-project calculators need besides the project itself.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub granularity: Granularity,
    /// Reference time for recency and staleness.
    pub now: DateTime<Utc>,
    pub categories: CategoryRules,
}

impl ScoringContext {
    pub fn new(granularity: Granularity, now: DateTime<Utc>) -> Self {
        Self {
            granularity,
            now,
            categories: CategoryRules::default(),
        }
    }

    pub fn with_categories(mut self, categories: CategoryRules) -> Self {
        self.categories = categories;
        self
    }
}

/// Analyze a single project.
pub fn analyze_project(
    project: &ProjectDescriptor,
    metrics: &ProjectMetrics,
    ctx: &ScoringContext,
) -> ProjectAnalysis {
    let snapshot = MetricSnapshot::from_metrics(metrics, ctx.granularity);
    if !snapshot.has_any() {
        debug!("{}: no {} data in any known metric", project.full_name, ctx.granularity);
    }

    let days_since_activity = days_since_activity(project, &snapshot, ctx.now);

    let stars = snapshot.latest(MetricKind::Stars);
    let forks = snapshot.latest(MetricKind::Forks);
    let contributors = snapshot.latest(MetricKind::Contributors);
    let issues = snapshot.latest(MetricKind::Issues);
    let pull_requests = snapshot.latest(MetricKind::PullRequests);

    let health_score = scores::health_score(&HealthInputs {
        star_growth_pct: snapshot.reading(MetricKind::Stars).change_pct(),
        contributors,
        issue_response_days: snapshot.latest(MetricKind::IssueResponseTime),
        attention: snapshot.latest(MetricKind::Attention),
        forks,
        days_since_update: days_since_activity,
    });

    let growth_rate = metrics
        .series(MetricKind::Stars)
        .map(|s| scores::growth_rate(s, ctx.granularity))
        .unwrap_or(0.0);

    let risk_score = scores::risk_score(&RiskSignals {
        health_score,
        issues,
        pull_requests,
        contributors,
        days_since_activity,
    });

    let analysis = ProjectAnalysis {
        name: project.full_name.clone(),
        language: project.language_or_unknown().to_string(),
        category: ctx.categories.classify(project),
        health_score,
        growth_rate,
        risk_level: scores::risk_level(risk_score),
        risk_score,
        momentum: scores::momentum(stars, contributors, pull_requests),
        trend: scores::trend(growth_rate),
        stars,
        forks,
        contributors,
        issues,
        pull_requests,
        openrank: snapshot.latest(MetricKind::OpenRank),
        days_since_activity,
        missing_metrics: snapshot
            .missing()
            .into_iter()
            .map(|k| k.name().to_string())
            .collect(),
    };

    debug!(
        "{}: health {:.1}, growth {:.1}%, risk {} ({})",
        analysis.name, analysis.health_score, analysis.growth_rate, analysis.risk_level, analysis.risk_score
    );

    analysis
}

/// Analyze every project. `metrics[i]` belongs to `projects[i]`; a `None`
/// entry (failed fetch) stays `None`.
pub fn analyze_all(
    projects: &[ProjectDescriptor],
    metrics: &[Option<ProjectMetrics>],
    ctx: &ScoringContext,
) -> Vec<Option<ProjectAnalysis>> {
    projects
        .iter()
        .zip(metrics)
        .map(|(project, metrics)| metrics.as_ref().map(|m| analyze_project(project, m, ctx)))
        .collect()
}

/// Days since the project was last active: the descriptor's update time,
/// else the newest period in any metric series.
fn days_since_activity(
    project: &ProjectDescriptor,
    snapshot: &MetricSnapshot,
    now: DateTime<Utc>,
) -> Option<i64> {
    if let Some(updated_at) = project.updated_at {
        return Some((now - updated_at).num_days().max(0));
    }
    snapshot
        .last_period()
        .and_then(|period| days_since_period(period, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricSeries;
    use crate::models::{RiskLevel, Trend};

    fn now() -> DateTime<Utc> {
        "2024-06-15T00:00:00Z".parse().unwrap()
    }

    fn descriptor(full_name: &str) -> ProjectDescriptor {
        ProjectDescriptor {
            language: Some("Python".to_string()),
            description: Some("Framework for building LLM agents".to_string()),
            ..ProjectDescriptor::from_full_name(full_name).unwrap()
        }
    }

    #[test]
    fn test_analyze_healthy_project() {
        let metrics = ProjectMetrics::new()
            .with("stars", MetricSeries::monthly("2024-04", &[1000.0, 1100.0, 1210.0]))
            .with("contributors", MetricSeries::monthly("2024-04", &[40.0, 45.0, 50.0]))
            .with("issues", MetricSeries::monthly("2024-04", &[30.0, 30.0, 30.0]))
            .with("pull_requests", MetricSeries::monthly("2024-04", &[20.0, 25.0, 30.0]))
            .with("openrank", MetricSeries::monthly("2024-04", &[10.0, 11.0, 12.5]));
        let ctx = ScoringContext::new(Granularity::Monthly, now());

        let analysis = analyze_project(&descriptor("org/agentkit"), &metrics, &ctx);

        assert_eq!(analysis.name, "org/agentkit");
        assert_eq!(analysis.language, "Python");
        assert_eq!(analysis.category, "Agent");
        assert!((analysis.growth_rate - 10.0).abs() < 1e-9);
        assert_eq!(analysis.trend, Trend::Rising);
        assert_eq!(analysis.stars, Some(1210.0));
        assert_eq!(analysis.openrank, Some(12.5));
        assert_eq!(analysis.days_since_activity, Some(0));
        assert_eq!(analysis.momentum, 100.0);
        assert_eq!(analysis.risk_level, RiskLevel::Low);
        assert!(analysis.missing_metrics.contains(&"forks".to_string()));
        assert!(!analysis.missing_metrics.contains(&"stars".to_string()));
    }

    #[test]
    fn test_analyze_empty_metrics() {
        let ctx = ScoringContext::new(Granularity::Monthly, now());
        let analysis = analyze_project(&descriptor("org/empty"), &ProjectMetrics::new(), &ctx);

        assert_eq!(analysis.health_score, 0.0);
        assert_eq!(analysis.growth_rate, 0.0);
        assert_eq!(analysis.momentum, 0.0);
        assert_eq!(analysis.days_since_activity, None);
        assert_eq!(analysis.missing_metrics.len(), MetricKind::ALL.len());
        // Health 0 puts it in the worst tier; nothing else is known.
        assert_eq!(analysis.risk_score, 3);
        assert_eq!(analysis.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_staleness_counts_from_end_of_last_period() {
        let metrics =
            ProjectMetrics::new().with("contributors", MetricSeries::monthly("2024-03", &[28.0, 29.0, 30.0]));
        let ctx = ScoringContext::new(Granularity::Monthly, now());

        let analysis = analyze_project(&descriptor("org/steady"), &metrics, &ctx);

        // Data through May, now mid-June: 15 days, not 45.
        assert_eq!(analysis.days_since_activity, Some(15));
        assert!(analysis.health_score >= 70.0);
        assert_eq!(analysis.risk_score, 0);
        assert_eq!(analysis.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_updated_at_overrides_series_period() {
        let metrics = ProjectMetrics::new().with("stars", MetricSeries::monthly("2023-01", &[5.0]));
        let mut project = descriptor("org/fresh");
        project.updated_at = Some("2024-06-10T12:00:00Z".parse().unwrap());
        let ctx = ScoringContext::new(Granularity::Monthly, now());

        let analysis = analyze_project(&project, &metrics, &ctx);
        assert_eq!(analysis.days_since_activity, Some(4));
    }

    #[test]
    fn test_analyze_all_keeps_failed_entries() {
        let projects = vec![descriptor("a/one"), descriptor("b/two")];
        let metrics = vec![None, Some(ProjectMetrics::new())];
        let ctx = ScoringContext::new(Granularity::Monthly, now());

        let results = analyze_all(&projects, &metrics, &ctx);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_none());
        assert_eq!(results[1].as_ref().map(|a| a.name.as_str()), Some("b/two"));
    }
}
