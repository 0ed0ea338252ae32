//! Run outcome returned to callers (and printed by the CLI with `--json`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::mapping::Mapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Nothing collided; no files were copied or rewritten.
    NoConflicts,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Read,
    Rewrite,
    Write,
}

/// A single file that was skipped. The run carries on without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub path: PathBuf,
    pub stage: FailureStage,
    pub message: String,
}

impl FileFailure {
    pub fn new(path: impl Into<PathBuf>, stage: FailureStage, error: impl ToString) -> Self {
        Self {
            path: path.into(),
            stage,
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorStats {
    pub host_selectors: usize,
    pub guest_selectors: usize,
    pub conflicts: usize,
    /// Conflicts as a share of the guest's selectors, 0-100.
    pub conflict_percentage: f64,
}

impl SelectorStats {
    pub fn new(host_selectors: usize, guest_selectors: usize, conflicts: usize) -> Self {
        let conflict_percentage = if guest_selectors == 0 {
            0.0
        } else {
            conflicts as f64 * 100.0 / guest_selectors as f64
        };
        Self {
            host_selectors,
            guest_selectors,
            conflicts,
            conflict_percentage,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub status: RunStatus,
    /// Conflicting selector keys, sorted.
    pub conflicts: Vec<String>,
    pub mapping: Mapping,
    pub files_modified: usize,
    pub output_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub stats: SelectorStats,
    pub failures: Vec<FileFailure>,
}

impl ConflictReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_of_guest() {
        let stats = SelectorStats::new(10, 8, 2);
        assert!((stats.conflict_percentage - 25.0).abs() < f64::EPSILON);
        assert_eq!(SelectorStats::new(5, 0, 0).conflict_percentage, 0.0);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&RunStatus::NoConflicts).unwrap(),
            "\"no_conflicts\""
        );
        assert_eq!(
            serde_json::to_string(&RunStatus::Success).unwrap(),
            "\"success\""
        );
    }

    #[test]
    fn test_failure_serializes() {
        let failure = FileFailure::new("out/a.html", FailureStage::Write, "disk full");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["stage"], "write");
        assert_eq!(json["message"], "disk full");
        assert_eq!(json["path"], "out/a.html");
    }
}
