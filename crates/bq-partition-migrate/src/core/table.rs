//! Warehouse table identity and metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::identifier::quote_path;
use crate::error::Result;

/// Fully qualified BigQuery table identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableId {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    /// Same project and dataset, different table name.
    pub fn sibling(&self, table: impl Into<String>) -> Self {
        Self {
            project: self.project.clone(),
            dataset: self.dataset.clone(),
            table: table.into(),
        }
    }

    /// Backtick-quoted path for use in SQL.
    pub fn quoted(&self) -> Result<String> {
        quote_path(&self.project, &self.dataset, &self.table)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// How a table's storage is partitioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Partitioning {
    /// Not partitioned.
    None,

    /// Time-unit or ingestion-time partitioning.
    Time {
        /// Partitioning column (`_PARTITIONTIME` for ingestion-time tables).
        field: String,
        /// Whether queries must filter on the partitioning column.
        require_filter: bool,
    },

    /// Integer-range partitioning.
    Range,
}

impl Partitioning {
    pub fn is_partitioned(&self) -> bool {
        !matches!(self, Partitioning::None)
    }
}

impl fmt::Display for Partitioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partitioning::None => write!(f, "none"),
            Partitioning::Time {
                field,
                require_filter,
            } => write!(f, "time({}, require_filter={})", field, require_filter),
            Partitioning::Range => write!(f, "range"),
        }
    }
}

/// Live metadata of a warehouse table, read at inspection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub id: TableId,
    pub partitioning: Partitioning,
    pub clustering: Vec<String>,
    /// Column names in schema order.
    pub columns: Vec<String>,
    /// `None` when the metadata API does not report a row count.
    pub num_rows: Option<u64>,
    pub num_bytes: u64,
}

impl TableDescriptor {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn is_clustered(&self) -> bool {
        !self.clustering.is_empty()
    }

    /// Size in GiB, as reported by the metadata API.
    pub fn size_gb(&self) -> f64 {
        self.num_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
    }
}
