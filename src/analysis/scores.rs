//! Score calculators.
//!
//! Every function here is pure: no clock reads, no I/O, and no panics or
//! NaN results for any input. Absent inputs are `None` and are handled
//! per calculator as documented.

use crate::metrics::{Granularity, MetricSeries};
use crate::models::{ProjectAnalysis, RiskLevel, Sustainability, Trend};

const STAR_GROWTH_CAP: f64 = 25.0;
const CONTRIBUTOR_CAP: f64 = 20.0;
const RESPONSE_TIME_CAP: f64 = 15.0;
const ATTENTION_CAP: f64 = 15.0;
const FORK_CAP: f64 = 10.0;
const RECENCY_CAP: f64 = 15.0;

/// Recency is full credit up to this many days, then decays linearly.
const RECENCY_FRESH_DAYS: f64 = 7.0;
/// Recency credit reaches 0 here.
const RECENCY_STALE_DAYS: f64 = 180.0;

/// Risk score at which a project becomes medium risk.
pub const MEDIUM_RISK_THRESHOLD: u32 = 3;
/// Risk score at which a project becomes high risk.
pub const HIGH_RISK_THRESHOLD: u32 = 6;

/// Growth beyond ±5% counts as a trend.
const TREND_THRESHOLD: f64 = 5.0;

/// Inputs to the health score. `None` marks a factor without data.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HealthInputs {
    /// Latest-vs-previous change in stars, percent.
    pub star_growth_pct: Option<f64>,
    pub contributors: Option<f64>,
    /// Average days to first response on issues.
    pub issue_response_days: Option<f64>,
    pub attention: Option<f64>,
    pub forks: Option<f64>,
    pub days_since_update: Option<i64>,
}

impl HealthInputs {
    fn has_metric_factor(&self) -> bool {
        self.star_growth_pct.is_some()
            || self.contributors.is_some()
            || self.issue_response_days.is_some()
            || self.attention.is_some()
            || self.forks.is_some()
    }
}

/// Composite health score in 0..=100.
///
/// Each factor contributes up to its cap. Factors without data are left out
/// of both the sum and the divisor, so the result is the share of the
/// available points earned. Recency alone does not make a score: with no
/// metric-backed factor the result is 0.
pub fn health_score(inputs: &HealthInputs) -> f64 {
    if !inputs.has_metric_factor() {
        return 0.0;
    }

    let factors = [
        (
            inputs
                .star_growth_pct
                .map(|g| (g * 2.5).clamp(0.0, STAR_GROWTH_CAP)),
            STAR_GROWTH_CAP,
        ),
        (
            inputs
                .contributors
                .map(|c| (c * 0.4).clamp(0.0, CONTRIBUTOR_CAP)),
            CONTRIBUTOR_CAP,
        ),
        (
            inputs
                .issue_response_days
                .map(|d| (RESPONSE_TIME_CAP - d * 0.5).clamp(0.0, RESPONSE_TIME_CAP)),
            RESPONSE_TIME_CAP,
        ),
        (
            inputs
                .attention
                .map(|a| (a / 10.0).clamp(0.0, ATTENTION_CAP)),
            ATTENTION_CAP,
        ),
        (
            inputs.forks.map(|f| (f / 20.0).clamp(0.0, FORK_CAP)),
            FORK_CAP,
        ),
        (inputs.days_since_update.map(recency_points), RECENCY_CAP),
    ];

    let (earned, available) = factors
        .iter()
        .filter_map(|(points, cap)| points.map(|p| (p, *cap)))
        .fold((0.0, 0.0), |(earned, available), (p, cap)| {
            (earned + p, available + cap)
        });

    if available == 0.0 {
        return 0.0;
    }
    (earned / available * 100.0).clamp(0.0, 100.0)
}

fn recency_points(days: i64) -> f64 {
    let days = days.max(0) as f64;
    if days <= RECENCY_FRESH_DAYS {
        return RECENCY_CAP;
    }
    let remaining = (RECENCY_STALE_DAYS - days) / (RECENCY_STALE_DAYS - RECENCY_FRESH_DAYS);
    (remaining * RECENCY_CAP).clamp(0.0, RECENCY_CAP)
}

/// Star growth in percent over the last three points of a series: the
/// latest value against the one before it. Fewer than two points or a zero
/// denominator yield 0.
pub fn growth_rate(stars: &MetricSeries, granularity: Granularity) -> f64 {
    growth_rate_from_values(&stars.window(3, granularity))
}

/// [`growth_rate`] over raw values, oldest first.
pub fn growth_rate_from_values(values: &[f64]) -> f64 {
    let window = &values[values.len().saturating_sub(3)..];
    match window {
        [.., previous, latest] if *previous != 0.0 => {
            let rate = (latest - previous) / previous * 100.0;
            if rate.is_finite() {
                rate
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Signals feeding the additive risk score. `None` adds nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RiskSignals {
    pub health_score: f64,
    pub issues: Option<f64>,
    pub pull_requests: Option<f64>,
    pub contributors: Option<f64>,
    pub days_since_activity: Option<i64>,
}

/// Additive risk score over health tier, issue/PR ratio, contributor count
/// and staleness.
pub fn risk_score(signals: &RiskSignals) -> u32 {
    let mut score = match signals.health_score {
        h if h < 30.0 => 3,
        h if h < 50.0 => 2,
        h if h < 70.0 => 1,
        _ => 0,
    };

    if let Some(issues) = signals.issues {
        let prs = signals.pull_requests.unwrap_or(0.0).max(1.0);
        if issues / prs > 5.0 {
            score += 2;
        }
    }

    if let Some(contributors) = signals.contributors {
        if contributors <= 5.0 {
            score += 2;
        }
    }

    match signals.days_since_activity {
        Some(days) if days > 90 => score += 3,
        Some(days) if days > 30 => score += 1,
        _ => {}
    }

    score
}

pub fn risk_level(score: u32) -> RiskLevel {
    if score >= HIGH_RISK_THRESHOLD {
        RiskLevel::High
    } else if score >= MEDIUM_RISK_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Popularity velocity: `ln(stars + 1) * 10 + contributors * 5 + prs * 2`,
/// capped at 100. Absent values count as 0.
pub fn momentum(stars: Option<f64>, contributors: Option<f64>, pull_requests: Option<f64>) -> f64 {
    let stars = stars.unwrap_or(0.0).max(0.0);
    let contributors = contributors.unwrap_or(0.0).max(0.0);
    let prs = pull_requests.unwrap_or(0.0).max(0.0);

    let raw = (stars + 1.0).ln() * 10.0 + contributors * 5.0 + prs * 2.0;
    raw.clamp(0.0, 100.0)
}

pub fn trend(growth_rate: f64) -> Trend {
    if growth_rate > TREND_THRESHOLD {
        Trend::Rising
    } else if growth_rate < -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Momentum-weighted share (0-100) of projects active within
/// `active_within_days`. With zero total momentum this is the plain share.
pub fn innovation_index(records: &[&ProjectAnalysis], active_within_days: i64) -> f64 {
    if records.is_empty() {
        return 0.0;
    }

    let is_recent = |r: &ProjectAnalysis| {
        r.days_since_activity
            .is_some_and(|days| days <= active_within_days)
    };

    let total_momentum: f64 = records.iter().map(|r| r.momentum).sum();
    if total_momentum > 0.0 {
        let recent_momentum: f64 = records
            .iter()
            .filter(|r| is_recent(**r))
            .map(|r| r.momentum)
            .sum();
        return recent_momentum / total_momentum * 100.0;
    }

    let recent = records.iter().filter(|r| is_recent(**r)).count();
    share(recent, records.len())
}

/// Share of projects crossing each sustainability threshold.
pub fn sustainability(records: &[&ProjectAnalysis]) -> Sustainability {
    let total = records.len();
    let count = |pred: &dyn Fn(&ProjectAnalysis) -> bool| {
        records.iter().filter(|r| pred(**r)).count()
    };

    let healthy = |r: &ProjectAnalysis| r.health_score > 60.0;

    Sustainability {
        overall: share(
            count(&|r| {
                healthy(r)
                    && r.contributors.unwrap_or(0.0) > 5.0
                    && r.risk_level != RiskLevel::High
            }),
            total,
        ),
        governance: share(
            count(&|r| r.issue_pr_ratio().is_some_and(|ratio| ratio <= 5.0)),
            total,
        ),
        community: share(count(&|r| r.contributors.unwrap_or(0.0) >= 10.0), total),
        technical: share(count(&healthy), total),
    }
}

fn share(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(name: &str, health: f64, contributors: f64, momentum: f64, days: Option<i64>) -> ProjectAnalysis {
        ProjectAnalysis {
            name: name.to_string(),
            language: "Python".to_string(),
            category: "Other".to_string(),
            health_score: health,
            growth_rate: 0.0,
            risk_level: RiskLevel::Low,
            risk_score: 0,
            momentum,
            trend: Trend::Stable,
            stars: Some(10.0),
            forks: None,
            contributors: Some(contributors),
            issues: Some(4.0),
            pull_requests: Some(2.0),
            openrank: None,
            days_since_activity: days,
            missing_metrics: vec![],
        }
    }

    #[test]
    fn test_empty_inputs_score_zero() {
        assert_eq!(health_score(&HealthInputs::default()), 0.0);
        assert_eq!(growth_rate(&MetricSeries::default(), Granularity::Monthly), 0.0);
        assert_eq!(momentum(None, None, None), 0.0);
    }

    #[test]
    fn test_recency_alone_scores_zero() {
        let inputs = HealthInputs {
            days_since_update: Some(1),
            ..Default::default()
        };
        assert_eq!(health_score(&inputs), 0.0);
    }

    #[test]
    fn test_health_score_averages_present_factors_only() {
        // Contributors 50 -> 20/20, forks 100 -> 5/10: 25 of 30 points.
        let inputs = HealthInputs {
            contributors: Some(50.0),
            forks: Some(100.0),
            ..Default::default()
        };
        let score = health_score(&inputs);
        assert!((score - 25.0 / 30.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_health_score_full_marks() {
        let inputs = HealthInputs {
            star_growth_pct: Some(20.0),
            contributors: Some(100.0),
            issue_response_days: Some(0.0),
            attention: Some(500.0),
            forks: Some(1000.0),
            days_since_update: Some(2),
        };
        assert!((health_score(&inputs) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_health_score_negative_growth_and_slow_response() {
        let inputs = HealthInputs {
            star_growth_pct: Some(-40.0),
            issue_response_days: Some(60.0),
            ..Default::default()
        };
        assert_eq!(health_score(&inputs), 0.0);
    }

    #[test]
    fn test_recency_points_decay() {
        assert_eq!(recency_points(0), RECENCY_CAP);
        assert_eq!(recency_points(7), RECENCY_CAP);
        assert_eq!(recency_points(180), 0.0);
        assert_eq!(recency_points(400), 0.0);
        let mid = recency_points(93);
        assert!(mid > 0.0 && mid < RECENCY_CAP);
    }

    #[test]
    fn test_growth_rate_examples() {
        let rising = MetricSeries::monthly("2024-01", &[100.0, 110.0, 121.0]);
        let flat = MetricSeries::monthly("2024-01", &[100.0, 100.0, 100.0]);

        assert!((growth_rate(&rising, Granularity::Monthly) - 10.0).abs() < 1e-9);
        assert_eq!(growth_rate(&flat, Granularity::Monthly), 0.0);
    }

    #[test]
    fn test_growth_rate_uses_last_window() {
        assert!((growth_rate_from_values(&[1.0, 5.0, 100.0, 110.0, 121.0]) - 10.0).abs() < 1e-9);
        assert_eq!(growth_rate_from_values(&[42.0]), 0.0);
        assert_eq!(growth_rate_from_values(&[0.0, 10.0]), 0.0);
    }

    #[test]
    fn test_growth_rate_scale_invariant() {
        let base = [37.0, 52.0, 61.0];
        let expected = growth_rate_from_values(&base);
        for k in [0.001, 0.5, 3.0, 1000.0] {
            let scaled: Vec<f64> = base.iter().map(|v| v * k).collect();
            assert!((growth_rate_from_values(&scaled) - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_high_risk_example() {
        let signals = RiskSignals {
            health_score: 40.0,
            issues: Some(20.0),
            pull_requests: Some(2.0),
            contributors: Some(1.0),
            days_since_activity: Some(100),
        };
        let score = risk_score(&signals);
        assert_eq!(score, 9);
        assert_eq!(risk_level(score), RiskLevel::High);
    }

    #[test]
    fn test_risk_buckets() {
        assert_eq!(risk_level(0), RiskLevel::Low);
        assert_eq!(risk_level(2), RiskLevel::Low);
        assert_eq!(risk_level(3), RiskLevel::Medium);
        assert_eq!(risk_level(5), RiskLevel::Medium);
        assert_eq!(risk_level(6), RiskLevel::High);
    }

    #[test]
    fn test_risk_monotonic_in_contributors() {
        let mut previous = 0;
        for contributors in (0..=50).rev() {
            let signals = RiskSignals {
                health_score: 65.0,
                issues: Some(3.0),
                pull_requests: Some(1.0),
                contributors: Some(contributors as f64),
                days_since_activity: Some(40),
            };
            let score = risk_score(&signals);
            assert!(score >= previous, "risk dropped at {} contributors", contributors);
            previous = score;
        }
    }

    #[test]
    fn test_missing_signals_add_nothing() {
        let signals = RiskSignals {
            health_score: 80.0,
            ..Default::default()
        };
        assert_eq!(risk_score(&signals), 0);
    }

    #[test]
    fn test_momentum_formula_and_cap() {
        let m = momentum(Some(99.0), Some(2.0), Some(3.0));
        let expected = 100f64.ln() * 10.0 + 10.0 + 6.0;
        assert!((m - expected).abs() < 1e-9);

        assert_eq!(momentum(Some(1e9), Some(50.0), Some(50.0)), 100.0);
    }

    #[test]
    fn test_trend_thresholds() {
        assert_eq!(trend(10.0), Trend::Rising);
        assert_eq!(trend(5.0), Trend::Stable);
        assert_eq!(trend(-5.0), Trend::Stable);
        assert_eq!(trend(-12.0), Trend::Declining);
    }

    #[test]
    fn test_innovation_index_weights_by_momentum() {
        let a = analysis("a/a", 70.0, 10.0, 75.0, Some(30));
        let b = analysis("b/b", 70.0, 10.0, 25.0, Some(900));
        let index = innovation_index(&[&a, &b], 365);
        assert!((index - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_innovation_index_zero_momentum_falls_back_to_share() {
        let a = analysis("a/a", 70.0, 10.0, 0.0, Some(30));
        let b = analysis("b/b", 70.0, 10.0, 0.0, None);
        assert!((innovation_index(&[&a, &b], 365) - 50.0).abs() < 1e-9);
        assert_eq!(innovation_index(&[], 365), 0.0);
    }

    #[test]
    fn test_sustainability_breakdown() {
        let strong = analysis("a/a", 80.0, 12.0, 50.0, Some(1));
        let weak = analysis("b/b", 40.0, 3.0, 5.0, Some(200));
        let mut noisy = analysis("c/c", 65.0, 8.0, 20.0, Some(10));
        noisy.issues = Some(100.0);
        noisy.pull_requests = Some(2.0);

        let s = sustainability(&[&strong, &weak, &noisy]);

        assert!((s.overall - 200.0 / 3.0).abs() < 1e-9);
        assert!((s.governance - 200.0 / 3.0).abs() < 1e-9);
        assert!((s.community - 100.0 / 3.0).abs() < 1e-9);
        assert!((s.technical - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_sustainability_empty() {
        assert_eq!(sustainability(&[]), Sustainability::default());
    }
}
