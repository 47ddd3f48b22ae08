//! Report rendering and export.

pub mod export;
pub mod generator;

pub use export::generate_json_report;
pub use generator::generate_markdown_report;

use crate::config::ReportConfig;

/// Rendering options for the Markdown report.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Include the per-project tables.
    pub include_projects: bool,
    /// Upper bound on rows across all project tables.
    pub max_project_rows: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_projects: true,
            max_project_rows: 100,
        }
    }
}

impl From<&ReportConfig> for ReportOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            include_projects: config.include_projects,
            max_project_rows: config.max_project_rows,
        }
    }
}
