//! JSON export of the full report document.

use crate::models::Report;
use anyhow::{Context, Result};

/// Serialize `report` as pretty-printed JSON.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}

/// Read back a document produced by [`generate_json_report`].
#[allow(dead_code)] // Consumers of the export; exercised by tests
pub fn parse_json_report(content: &str) -> Result<Report> {
    serde_json::from_str(content).context("Failed to parse report JSON")
}
