//! The warehouse abstraction the migration runner is written against.
//!
//! - [`Warehouse`]: metadata reads plus the handful of mutations a migration needs
//! - [`RebuildSpec`]: everything required to create a partitioned copy of a table
//!
//! Mutating methods are only ever called in execute mode; the runner renders
//! the equivalent statements itself for dry-run output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::table::{TableDescriptor, TableId};

/// Options for creating a partitioned, clustered copy of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebuildSpec {
    /// Table whose rows are copied.
    pub source: TableId,
    /// Table to create.
    pub target: TableId,
    /// Column for `PARTITION BY`.
    pub partition_field: String,
    /// Clustering columns; empty means no `CLUSTER BY`.
    pub clustering: Vec<String>,
    /// Partition expiration in days.
    pub partition_expiration_days: u32,
    /// Table description recorded on the new table.
    pub description: String,
}

/// Access to a BigQuery-like warehouse.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Check that a dataset exists and is reachable.
    async fn dataset_exists(&self, project: &str, dataset: &str) -> Result<bool>;

    /// List the table names in a dataset.
    async fn list_tables(&self, project: &str, dataset: &str) -> Result<Vec<String>>;

    /// Read live table metadata. Returns `None` when the table does not exist.
    async fn get_table(&self, id: &TableId) -> Result<Option<TableDescriptor>>;

    /// Whether a table exists.
    ///
    /// Default implementation reads the full metadata.
    async fn table_exists(&self, id: &TableId) -> Result<bool> {
        Ok(self.get_table(id).await?.is_some())
    }

    /// Create `spec.target` as a partitioned copy of `spec.source`, rows included.
    async fn create_partitioned_copy(&self, spec: &RebuildSpec) -> Result<()>;

    /// Turn on `require_partition_filter` for a partitioned table.
    async fn require_partition_filter(&self, id: &TableId) -> Result<()>;

    /// Replace a table's clustering specification.
    async fn set_clustering(&self, id: &TableId, fields: &[String]) -> Result<()>;

    /// Rename a table within its dataset.
    async fn rename_table(&self, id: &TableId, new_name: &str) -> Result<()>;

    /// Delete a table.
    async fn delete_table(&self, id: &TableId) -> Result<()>;

    /// Backend identifier for logs (e.g. "bigquery").
    fn backend_type(&self) -> &'static str;
}
