//! Markdown report generation.
//!
//! This module renders an ecosystem [`Report`] as a Markdown document.

use crate::analysis::{group_by_category, group_by_language};
use crate::models::{
    EcosystemSummary, FilterState, ProjectAnalysis, RankedProject, Report, ReportMetadata,
    RiskLevel, Trend,
};
use crate::report::ReportOptions;
use std::collections::BTreeMap;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportOptions) -> String {
    let mut output = String::new();

    output.push_str("# EcoPulse Ecosystem Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata, &report.filters));
    output.push_str(&generate_table_of_contents(report, options));
    output.push_str(&generate_overview_section(&report.summary));
    output.push_str(&generate_risk_section(&report.summary));
    output.push_str(&generate_distribution_section(&report.summary, &report.projects));
    output.push_str(&generate_rankings_section(&report.summary));
    output.push_str(&generate_watchlist_section(&report.summary));

    if options.include_projects {
        output.push_str(&generate_projects_section(&report.projects, options.max_project_rows));
    }

    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata, filters: &FilterState) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    if let Some(ref query) = filters.query {
        section.push_str(&format!("- **Query:** `{}`\n", query));
    }
    section.push_str(&format!("- **Granularity:** {}\n", metadata.granularity));
    section.push_str(&format!("- **Duration:** {:.1}s\n", metadata.duration_seconds));

    if !filters.is_empty() {
        let mut active = Vec::new();
        if let Some(ref language) = filters.language {
            active.push(format!("language = {}", language));
        }
        if let Some(ref category) = filters.category {
            active.push(format!("category = {}", category));
        }
        if let Some(min) = filters.min_stars {
            active.push(format!("stars >= {}", min));
        }
        if let Some(level) = filters.min_risk {
            active.push(format!("risk >= {}", level));
        }
        section.push_str(&format!("- **Filters:** {}\n", active.join(", ")));
    }
    section.push('\n');

    section
}

fn generate_table_of_contents(report: &Report, options: &ReportOptions) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Overview](#overview)\n");
    toc.push_str("- [Risk](#risk)\n");
    toc.push_str("- [Distribution](#distribution)\n");
    toc.push_str("- [Rankings](#rankings)\n");
    toc.push_str("- [Watchlist](#watchlist)\n");
    if options.include_projects && !report.projects.is_empty() {
        toc.push_str("- [Projects](#projects)\n");
    }
    toc.push('\n');

    toc
}

fn generate_overview_section(summary: &EcosystemSummary) -> String {
    let mut section = String::new();

    section.push_str("## Overview\n\n");
    section.push_str("| Projects | Analyzed | Failed |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} |\n\n",
        summary.total_projects, summary.analyzed_projects, summary.failed_projects
    ));

    if summary.analyzed_projects == 0 {
        section.push_str("No project could be analyzed.\n\n");
        return section;
    }

    let averages = &summary.averages;
    section.push_str("### Averages\n\n");
    section.push_str("| Health | Growth | Momentum | OpenRank |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {:.1} | {:+.1}% | {:.1} | {:.2} |\n\n",
        averages.health_score, averages.growth_rate, averages.momentum, averages.openrank
    ));

    section.push_str(&format!(
        "- **Innovation index:** {:.1}\n",
        summary.innovation_index
    ));
    let s = &summary.sustainability;
    section.push_str(&format!(
        "- **Sustainability:** {:.1} (governance {:.1}, community {:.1}, technical {:.1})\n\n",
        s.overall, s.governance, s.community, s.technical
    ));

    section
}

fn generate_risk_section(summary: &EcosystemSummary) -> String {
    let mut section = String::new();
    let risk = &summary.risk_distribution;
    let trend = &summary.trend_distribution;

    section.push_str("## Risk\n\n");
    section.push_str(&format!(
        "| {} High | {} Medium | {} Low |\n",
        RiskLevel::High.emoji(),
        RiskLevel::Medium.emoji(),
        RiskLevel::Low.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!("| {} | {} | {} |\n\n", risk.high, risk.medium, risk.low));

    section.push_str("### Trend\n\n");
    section.push_str(&format!(
        "| {} Rising | {} Stable | {} Declining |\n",
        Trend::Rising.arrow(),
        Trend::Stable.arrow(),
        Trend::Declining.arrow(),
    ));
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} |\n\n",
        trend.rising, trend.stable, trend.declining
    ));

    if summary.analyzed_projects > 0 {
        section.push_str("### Health Distribution\n\n");
        section.push_str("| Health | Projects |\n");
        section.push_str("|:---|:---:|\n");
        for bucket in &summary.health_buckets {
            section.push_str(&format!("| {} | {} |\n", bucket.label, bucket.count));
        }
        section.push('\n');
    }

    section
}

fn generate_distribution_section(summary: &EcosystemSummary, projects: &[ProjectAnalysis]) -> String {
    let mut section = String::new();

    section.push_str("## Distribution\n\n");

    if !summary.language_distribution.is_empty() {
        section.push_str("### By Language\n\n");
        section.push_str(&language_table(&summary.language_distribution, projects));
    }

    if !summary.category_distribution.is_empty() {
        section.push_str("### By Category\n\n");
        section.push_str(&count_table("Category", &summary.category_distribution));
    }

    section
}

/// Two-column table sorted by count, largest first; ties alphabetical.
fn count_table(label: &str, counts: &BTreeMap<String, usize>) -> String {
    let mut table = String::new();

    table.push_str(&format!("| {} | Projects |\n", label));
    table.push_str("|:---|:---:|\n");

    let mut rows: Vec<_> = counts.iter().collect();
    rows.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

    for (name, count) in rows {
        table.push_str(&format!("| {} | {} |\n", name, count));
    }
    table.push('\n');

    table
}

/// Languages by project count, with the mean health of the listed projects.
fn language_table(counts: &BTreeMap<String, usize>, projects: &[ProjectAnalysis]) -> String {
    let grouped = group_by_language(&projects.iter().collect::<Vec<_>>());
    let mut table = String::new();

    table.push_str("| Language | Projects | Avg Health |\n");
    table.push_str("|:---|:---:|:---:|\n");

    let mut rows: Vec<_> = counts.iter().collect();
    rows.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

    for (language, count) in rows {
        let health = grouped
            .get(language)
            .filter(|members| !members.is_empty())
            .map(|members| {
                let total: f64 = members.iter().map(|p| p.health_score).sum();
                format!("{:.1}", total / members.len() as f64)
            })
            .unwrap_or_else(|| "n/a".to_string());
        table.push_str(&format!("| {} | {} | {} |\n", language, count, health));
    }
    table.push('\n');

    table
}

fn generate_rankings_section(summary: &EcosystemSummary) -> String {
    let mut section = String::new();

    section.push_str("## Rankings\n\n");

    if summary.top_projects.is_empty() {
        section.push_str("Nothing to rank.\n\n");
        return section;
    }

    section.push_str(&format!("### Top by {}\n\n", summary.rank_field));
    section.push_str(&ranked_table(&summary.top_projects, &summary.rank_field.to_string()));

    section.push_str(&format!("### Bottom by {}\n\n", summary.rank_field));
    section.push_str(&ranked_table(&summary.bottom_projects, &summary.rank_field.to_string()));

    section
}

fn ranked_table(projects: &[RankedProject], label: &str) -> String {
    let mut table = String::new();

    table.push_str(&format!("| # | Project | {} |\n", label));
    table.push_str("|:---:|:---|---:|\n");
    for (i, project) in projects.iter().enumerate() {
        table.push_str(&format!("| {} | `{}` | {:.1} |\n", i + 1, project.name, project.value));
    }
    table.push('\n');

    table
}

fn generate_watchlist_section(summary: &EcosystemSummary) -> String {
    let mut section = String::new();

    section.push_str("## Watchlist\n\n");

    section.push_str(&format!("### {} High Risk\n\n", RiskLevel::High.emoji()));
    if summary.high_risk_projects.is_empty() {
        section.push_str("No high-risk projects. 🎉\n\n");
    } else {
        for name in &summary.high_risk_projects {
            section.push_str(&format!("- `{}`\n", name));
        }
        section.push('\n');
    }

    section.push_str("### 🚀 Fast Growing\n\n");
    if summary.fast_growing_projects.is_empty() {
        section.push_str("No project grew faster than the threshold.\n\n");
    } else {
        for name in &summary.fast_growing_projects {
            section.push_str(&format!("- `{}`\n", name));
        }
        section.push('\n');
    }

    section
}

fn generate_projects_section(projects: &[ProjectAnalysis], max_rows: usize) -> String {
    if projects.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Projects\n\n");

    let grouped = group_by_category(&projects.iter().collect::<Vec<_>>());
    let mut categories: Vec<_> = grouped.into_iter().collect();
    categories.sort_by(|a, b| a.0.cmp(&b.0));

    let mut rows = 0;
    for (category, members) in categories {
        if rows >= max_rows {
            break;
        }

        section.push_str(&format!("### {}\n\n", category));
        section.push_str("| Project | Language | Stars | Health | Growth | Momentum | Risk |\n");
        section.push_str("|:---|:---|---:|---:|---:|---:|:---:|\n");

        for project in members.iter().take(max_rows - rows) {
            section.push_str(&project_row(project));
            rows += 1;
        }
        section.push('\n');
    }

    if projects.len() > rows {
        section.push_str(&format!(
            "*{} more projects omitted; see the JSON export for the full list.*\n\n",
            projects.len() - rows
        ));
    }

    section
}

fn project_row(project: &ProjectAnalysis) -> String {
    let stars = project
        .stars
        .map(|s| format!("{:.0}", s))
        .unwrap_or_else(|| "n/a".to_string());

    format!(
        "| `{}` | {} | {} | {:.1} | {} {:+.1}% | {:.1} | {} {} |\n",
        project.name,
        project.language,
        stars,
        project.health_score,
        project.trend.arrow(),
        project.growth_rate,
        project.momentum,
        project.risk_level.emoji(),
        project.risk_level,
    )
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by EcoPulse*\n");

    footer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{summarize, SummaryOptions};
    use crate::metrics::Granularity;
    use chrono::Utc;

    fn analysis(name: &str, category: &str, risk: RiskLevel) -> ProjectAnalysis {
        ProjectAnalysis {
            name: name.to_string(),
            language: "Python".to_string(),
            category: category.to_string(),
            health_score: 72.5,
            growth_rate: 12.0,
            risk_level: risk,
            risk_score: 0,
            momentum: 64.0,
            trend: Trend::Rising,
            stars: Some(1500.0),
            forks: Some(200.0),
            contributors: Some(30.0),
            issues: Some(12.0),
            pull_requests: Some(8.0),
            openrank: Some(4.2),
            days_since_activity: Some(3),
            missing_metrics: vec![],
        }
    }

    fn create_test_report() -> Report {
        let projects = vec![
            analysis("org/agent", "Agent", RiskLevel::Low),
            analysis("org/serve", "Inference & Serving", RiskLevel::High),
        ];
        let records: Vec<_> = projects.iter().cloned().map(Some).chain([None]).collect();

        Report {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                tool_version: "1.0.0".to_string(),
                source: "data dir ./data".to_string(),
                granularity: Granularity::Monthly,
                duration_seconds: 1.5,
            },
            filters: FilterState {
                query: Some("llm".to_string()),
                ..Default::default()
            },
            summary: summarize(&records, &SummaryOptions::default()),
            projects,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report, &ReportOptions::default());

        assert!(markdown.contains("# EcoPulse Ecosystem Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Overview"));
        assert!(markdown.contains("## Risk"));
        assert!(markdown.contains("## Projects"));
        assert!(markdown.contains("| 3 | 2 | 1 |"));
        assert!(markdown.contains("`org/serve`"));
        assert!(markdown.contains("### Inference & Serving"));
    }

    #[test]
    fn test_projects_section_optional() {
        let report = create_test_report();
        let options = ReportOptions {
            include_projects: false,
            ..Default::default()
        };
        let markdown = generate_markdown_report(&report, &options);

        assert!(!markdown.contains("## Projects"));
        assert!(!markdown.contains("(#projects)"));
    }

    #[test]
    fn test_project_rows_capped() {
        let report = create_test_report();
        let section = generate_projects_section(&report.projects, 1);

        assert!(section.contains("`org/agent`"));
        assert!(!section.contains("`org/serve`"));
        assert!(section.contains("1 more projects omitted"));
    }

    #[test]
    fn test_metadata_lists_filters() {
        let report = create_test_report();
        let filters = FilterState {
            language: Some("Rust".to_string()),
            min_risk: Some(RiskLevel::Medium),
            ..Default::default()
        };
        let section = generate_metadata_section(&report.metadata, &filters);

        assert!(section.contains("language = Rust"));
        assert!(section.contains("risk >= Medium"));
        assert!(section.contains("Granularity:** monthly"));
    }

    #[test]
    fn test_watchlist() {
        let report = create_test_report();
        let section = generate_watchlist_section(&report.summary);

        assert!(section.contains("- `org/serve`"));
        assert!(section.contains("Fast Growing"));
    }

    #[test]
    fn test_language_table_average_health() {
        let report = create_test_report();
        let section = generate_distribution_section(&report.summary, &report.projects);

        assert!(section.contains("| Python | 2 | 72.5 |"));
        assert!(section.contains("| Agent | 1 |"));
    }

    #[test]
    fn test_empty_report() {
        let mut report = create_test_report();
        report.projects.clear();
        report.summary = summarize(&[None], &SummaryOptions::default());

        let markdown = generate_markdown_report(&report, &ReportOptions::default());
        assert!(markdown.contains("No project could be analyzed."));
        assert!(markdown.contains("Nothing to rank."));
        assert!(!markdown.contains("## Projects"));
    }
}
