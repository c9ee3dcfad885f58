//! Run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::plan::{Classification, CostEstimate, Issue};

use super::Inspection;

/// Whether mutating calls are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    DryRun,
    Execute,
}

impl RunMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, RunMode::DryRun)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::DryRun => write!(f, "dry-run"),
            RunMode::Execute => write!(f, "execute"),
        }
    }
}

/// What happened to one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    /// Partitioned, clustered and filter-enforced already.
    AlreadyCompliant,
    /// Dry run: statements recorded, nothing issued.
    Planned,
    /// Options changed in place.
    Altered,
    /// Rebuilt and swapped; the original lives on under `backup`.
    Migrated { backup: String },
    /// Nothing applicable could be done.
    Skipped { reason: String },
    /// Aborted; the production table still holds the original data.
    Failed { reason: String },
    /// Activation failed and the backup was renamed back.
    RolledBack { reason: String },
}

impl TableOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TableOutcome::Failed { .. } | TableOutcome::RolledBack { .. }
        )
    }
}

impl fmt::Display for TableOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableOutcome::AlreadyCompliant => write!(f, "already optimized"),
            TableOutcome::Planned => write!(f, "planned (dry run)"),
            TableOutcome::Altered => write!(f, "altered"),
            TableOutcome::Migrated { backup } => write!(f, "migrated (backup: {})", backup),
            TableOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
            TableOutcome::Failed { reason } => write!(f, "FAILED: {}", reason),
            TableOutcome::RolledBack { reason } => write!(f, "ROLLED BACK: {}", reason),
        }
    }
}

/// Per-table section of a run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub platform: Option<String>,
    /// `None` when the table could not be inspected.
    pub classification: Option<Classification>,
    pub issues: Vec<Issue>,
    /// Corrective action for each issue, in the same order.
    pub actions: Vec<String>,
    /// Clustering columns chosen for the table.
    pub clustering: Vec<String>,
    pub rows_before: Option<u64>,
    pub rows_after: Option<u64>,
    /// Statements issued (execute) or that would be issued (dry run).
    pub statements: Vec<String>,
    pub cost: Option<CostEstimate>,
    pub outcome: TableOutcome,
}

impl TableReport {
    pub(crate) fn from_inspection(inspection: &Inspection, outcome: TableOutcome) -> Self {
        Self {
            table: inspection.table.id.table.clone(),
            platform: Some(inspection.platform.clone()),
            classification: Some(inspection.plan.classification),
            issues: inspection.plan.issues.clone(),
            actions: inspection.actions.clone(),
            clustering: inspection.clustering.clone(),
            rows_before: inspection.table.num_rows,
            rows_after: None,
            statements: Vec::new(),
            cost: None,
            outcome,
        }
    }

    /// A table that never got as far as inspection.
    pub(crate) fn uninspected(table: &str, outcome: TableOutcome) -> Self {
        Self {
            table: table.to_string(),
            platform: None,
            classification: None,
            issues: Vec::new(),
            actions: Vec::new(),
            clustering: Vec::new(),
            rows_before: None,
            rows_after: None,
            statements: Vec::new(),
            cost: None,
            outcome,
        }
    }
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    pub mode: RunMode,
    pub project: String,
    pub dataset: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,

    /// Processed tables, in processing order.
    pub tables: Vec<TableReport>,

    /// Backup, staging and temporary tables left out of the scan.
    pub skipped_auxiliary: Vec<String>,

    /// The run stopped early on an interrupt.
    pub cancelled: bool,
}

impl MigrationReport {
    pub fn tables_total(&self) -> usize {
        self.tables.len()
    }

    pub fn tables_failed(&self) -> usize {
        self.tables.iter().filter(|t| t.outcome.is_failure()).count()
    }

    pub fn failed_tables(&self) -> Vec<String> {
        self.tables
            .iter()
            .filter(|t| t.outcome.is_failure())
            .map(|t| t.table.clone())
            .collect()
    }

    /// Tables with the given classification.
    pub fn with_classification(&self, classification: Classification) -> Vec<&TableReport> {
        self.tables
            .iter()
            .filter(|t| t.classification == Some(classification))
            .collect()
    }

    /// Combined estimate across rebuilt (or to-be-rebuilt) tables.
    pub fn total_cost(&self) -> CostEstimate {
        CostEstimate::total(self.tables.iter().filter_map(|t| t.cost.as_ref()))
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_failure_classification() {
        assert!(TableOutcome::Failed { reason: "x".into() }.is_failure());
        assert!(TableOutcome::RolledBack { reason: "x".into() }.is_failure());
        assert!(!TableOutcome::Planned.is_failure());
        assert!(!TableOutcome::Migrated { backup: "b".into() }.is_failure());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_string(&TableOutcome::Migrated {
            backup: "p.d.gsc_data_backup".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"migrated","backup":"p.d.gsc_data_backup"}"#);
    }

    #[test]
    fn test_uninspected_report_is_failure() {
        let report = TableReport::uninspected(
            "ghost",
            TableOutcome::Failed {
                reason: "Not found".into(),
            },
        );
        assert!(report.outcome.is_failure());
        assert_eq!(report.classification, None);
        assert!(report.actions.is_empty());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(RunMode::DryRun.to_string(), "dry-run");
        assert!(RunMode::DryRun.is_dry_run());
        assert!(!RunMode::Execute.is_dry_run());
    }
}
