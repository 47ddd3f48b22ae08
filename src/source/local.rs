//! File-system backed project lists and metric tables.
//!
//! Two layouts are understood under the data directory:
//!
//! - `{owner}/{repo}.json`: the whole metric table in one object;
//! - `{owner}/{repo}/{metric}.json`: one series per file.

use crate::metrics::{MetricSeries, ProjectMetrics};
use crate::models::{split_full_name, ProjectDescriptor};
use crate::source::FetchError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Load a JSON array of project descriptors.
pub fn load_projects_file(path: &Path) -> Result<Vec<ProjectDescriptor>, FetchError> {
    let content = fs::read_to_string(path).map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let projects: Vec<ProjectDescriptor> =
        serde_json::from_str(&content).map_err(|source| FetchError::Parse {
            what: path.display().to_string(),
            source,
        })?;

    Ok(projects.into_iter().map(ProjectDescriptor::normalized).collect())
}

/// A local metrics directory.
#[derive(Debug, Clone)]
pub struct LocalSource {
    data_dir: PathBuf,
}

impl LocalSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// List every project present in the data directory, sorted by name.
    pub fn discover_projects(&self) -> Result<Vec<ProjectDescriptor>, FetchError> {
        if !self.data_dir.is_dir() {
            return Err(FetchError::Io {
                path: self.data_dir.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }

        let mut names: Vec<String> = Vec::new();

        for entry in WalkDir::new(&self.data_dir)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let Some(owner) = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
            else {
                continue;
            };

            let repo = if entry.file_type().is_dir() {
                entry.file_name().to_str().map(String::from)
            } else if is_json(entry.path()) {
                entry
                    .path()
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(String::from)
            } else {
                None
            };

            if let Some(repo) = repo {
                if owner.starts_with('.') || repo.starts_with('.') {
                    continue;
                }
                names.push(format!("{}/{}", owner, repo));
            }
        }

        names.sort();
        names.dedup();
        debug!("Discovered {} projects in {}", names.len(), self.data_dir.display());

        Ok(names
            .iter()
            .filter_map(|name| ProjectDescriptor::from_full_name(name))
            .collect())
    }

    /// Load the metric table for `full_name`.
    pub fn load_metrics(&self, full_name: &str) -> Result<ProjectMetrics, FetchError> {
        let (owner, repo) =
            split_full_name(full_name).ok_or_else(|| FetchError::InvalidName(full_name.to_string()))?;

        let file = self.data_dir.join(owner).join(format!("{}.json", repo));
        if file.is_file() {
            return read_table(&file);
        }

        let dir = self.data_dir.join(owner).join(repo);
        if dir.is_dir() {
            return read_series_dir(&dir);
        }

        Err(FetchError::NotFound(full_name.to_string()))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

fn read_table(path: &Path) -> Result<ProjectMetrics, FetchError> {
    let content = fs::read_to_string(path).map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| FetchError::Parse {
        what: path.display().to_string(),
        source,
    })
}

/// One series per `{metric}.json`. Unreadable files are skipped with a
/// warning; the rest of the table is still usable.
fn read_series_dir(dir: &Path) -> Result<ProjectMetrics, FetchError> {
    let entries = fs::read_dir(dir).map_err(|source| FetchError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut metrics = ProjectMetrics::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !is_json(&path) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str::<MetricSeries>(&content).map_err(|e| e.to_string()));

        match parsed {
            Ok(series) => metrics.insert(name, series),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    Ok(metrics)
}
