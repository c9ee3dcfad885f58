//! Per-table migration planning.
//!
//! A [`MigrationPlan`] is derived from live table metadata each run and never
//! stored. It lists what is wrong with a table and which of the two repair
//! strategies applies:
//!
//! - **Alter** in place when the table is already partitioned
//! - **Rebuild** (copy, verify, swap) when it is not partitioned at all

pub mod cost;
pub mod ddl;
pub mod platform;

pub use cost::CostEstimate;
pub use platform::{desired_clustering, detect_platform, select_clustering_fields};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{Partitioning, TableDescriptor};

/// A configuration problem found on a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Issue {
    NotPartitioned,
    MissingPartitionFilter,
    NotClustered,
}

impl Issue {
    /// Corrective action for this issue.
    pub fn action(&self, partition_field: &str) -> String {
        match self {
            Issue::NotPartitioned => format!("Add PARTITION BY {}", partition_field),
            Issue::MissingPartitionFilter => "Enable require_partition_filter = TRUE".to_string(),
            Issue::NotClustered => "Add CLUSTER BY platform columns".to_string(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::NotPartitioned => write!(f, "NOT PARTITIONED"),
            Issue::MissingPartitionFilter => write!(f, "Missing require_partition_filter"),
            Issue::NotClustered => write!(f, "NOT CLUSTERED"),
        }
    }
}

/// Which repair a table needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Compliant,
    NeedsAlter,
    NeedsRebuild,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Compliant => write!(f, "already optimized"),
            Classification::NeedsAlter => write!(f, "needs ALTER TABLE"),
            Classification::NeedsRebuild => write!(f, "needs full migration"),
        }
    }
}

/// Issues found on one table and the resulting classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub issues: Vec<Issue>,
    pub classification: Classification,
}

impl MigrationPlan {
    /// Inspect a table's metadata.
    pub fn for_table(table: &TableDescriptor) -> Self {
        let mut issues = Vec::new();

        if !table.partitioning.is_partitioned() {
            issues.push(Issue::NotPartitioned);
        } else if let Partitioning::Time {
            require_filter: false,
            ..
        } = table.partitioning
        {
            issues.push(Issue::MissingPartitionFilter);
        }

        if !table.is_clustered() {
            issues.push(Issue::NotClustered);
        }

        let classification = if issues.contains(&Issue::NotPartitioned) {
            Classification::NeedsRebuild
        } else if issues.is_empty() {
            Classification::Compliant
        } else {
            Classification::NeedsAlter
        };

        Self {
            issues,
            classification,
        }
    }

    pub fn has(&self, issue: Issue) -> bool {
        self.issues.contains(&issue)
    }

    /// Corrective actions, one per issue.
    pub fn actions(&self, partition_field: &str) -> Vec<String> {
        self.issues
            .iter()
            .map(|i| i.action(partition_field))
            .collect()
    }

    /// Issues joined for display.
    pub fn issue_summary(&self) -> String {
        self.issues
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
