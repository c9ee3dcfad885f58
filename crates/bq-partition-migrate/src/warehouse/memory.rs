//! In-process warehouse for rehearsals and tests.
//!
//! Holds table metadata in memory, applies the same state transitions the
//! real warehouse would, and records every call so callers can assert which
//! operations were issued. Failures, lost responses, lossy copies and
//! concurrent writes can be injected per table.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::Mutex;

use crate::core::{Partitioning, RebuildSpec, TableDescriptor, TableId, Warehouse};
use crate::error::{MigrateError, Result};

/// Operation kinds that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    GetTable,
    Create,
    RequireFilter,
    SetClustering,
    Rename,
    Delete,
}

/// A call received by the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WarehouseCall {
    DatasetExists { project: String, dataset: String },
    ListTables { project: String, dataset: String },
    GetTable(TableId),
    CreatePartitionedCopy(RebuildSpec),
    RequirePartitionFilter(TableId),
    SetClustering(TableId, Vec<String>),
    RenameTable(TableId, String),
    DeleteTable(TableId),
}

impl WarehouseCall {
    /// Whether the call changes warehouse state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            WarehouseCall::CreatePartitionedCopy(_)
                | WarehouseCall::RequirePartitionFilter(_)
                | WarehouseCall::SetClustering(..)
                | WarehouseCall::RenameTable(..)
                | WarehouseCall::DeleteTable(_)
        )
    }
}

#[derive(Default)]
struct MemoryState {
    datasets: BTreeSet<(String, String)>,
    tables: BTreeMap<TableId, TableDescriptor>,
    calls: Vec<WarehouseCall>,
    failures: HashMap<(Operation, String), String>,
    lost_responses: HashMap<(Operation, String), String>,
    copy_shortfall: HashMap<String, u64>,
    writes_on_rename: HashMap<String, u64>,
}

impl MemoryState {
    fn check_failure(&self, op: Operation, id: &TableId) -> Result<()> {
        Self::injected(&self.failures, op, id)
    }

    /// Called after a mutation was applied.
    fn check_lost_response(&self, op: Operation, id: &TableId) -> Result<()> {
        Self::injected(&self.lost_responses, op, id)
    }

    fn injected(
        injections: &HashMap<(Operation, String), String>,
        op: Operation,
        id: &TableId,
    ) -> Result<()> {
        match injections.get(&(op, id.table.clone())) {
            Some(message) => Err(MigrateError::warehouse(
                format!("{:?}", op).to_lowercase(),
                id.to_string(),
                message.clone(),
            )),
            None => Ok(()),
        }
    }

    fn require_table(&mut self, op: &str, id: &TableId) -> Result<&mut TableDescriptor> {
        self.tables
            .get_mut(id)
            .ok_or_else(|| MigrateError::warehouse(op, id.to_string(), "Not found: Table"))
    }

    fn require_absent(&self, op: &str, id: &TableId) -> Result<()> {
        if self.tables.contains_key(id) {
            return Err(MigrateError::warehouse(
                op,
                id.to_string(),
                "Already Exists: Table",
            ));
        }
        Ok(())
    }
}

/// Warehouse backed by in-memory table metadata.
#[derive(Default)]
pub struct MemoryWarehouse {
    state: Mutex<MemoryState>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty dataset.
    pub fn with_dataset(mut self, project: &str, dataset: &str) -> Self {
        self.state
            .get_mut()
            .datasets
            .insert((project.to_string(), dataset.to_string()));
        self
    }

    /// Add a table (its dataset is registered implicitly).
    pub fn with_table(mut self, table: TableDescriptor) -> Self {
        let state = self.state.get_mut();
        state
            .datasets
            .insert((table.id.project.clone(), table.id.dataset.clone()));
        state.tables.insert(table.id.clone(), table);
        self
    }

    /// Make every `op` on the named table fail with `message`.
    pub fn fail_on(mut self, op: Operation, table: &str, message: &str) -> Self {
        self.state
            .get_mut()
            .failures
            .insert((op, table.to_string()), message.to_string());
        self
    }

    /// Apply every `op` on the named table, then report it as failed.
    pub fn lose_response(mut self, op: Operation, table: &str, message: &str) -> Self {
        self.state
            .get_mut()
            .lost_responses
            .insert((op, table.to_string()), message.to_string());
        self
    }

    /// Add `rows` rows to the named table whenever it is renamed.
    pub fn with_writes_on_rename(mut self, table: &str, rows: u64) -> Self {
        self.state
            .get_mut()
            .writes_on_rename
            .insert(table.to_string(), rows);
        self
    }

    /// Drop `rows` rows whenever the named table is copied.
    pub fn with_copy_shortfall(mut self, source_table: &str, rows: u64) -> Self {
        self.state
            .get_mut()
            .copy_shortfall
            .insert(source_table.to_string(), rows);
        self
    }

    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<WarehouseCall> {
        self.state.lock().await.calls.clone()
    }

    /// Calls that changed state.
    pub async fn mutations(&self) -> Vec<WarehouseCall> {
        self.calls()
            .await
            .into_iter()
            .filter(|c| c.is_mutation())
            .collect()
    }

    /// Current metadata of a table, if it exists.
    pub async fn table(&self, id: &TableId) -> Option<TableDescriptor> {
        self.state.lock().await.tables.get(id).cloned()
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn dataset_exists(&self, project: &str, dataset: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.calls.push(WarehouseCall::DatasetExists {
            project: project.to_string(),
            dataset: dataset.to_string(),
        });
        Ok(state
            .datasets
            .contains(&(project.to_string(), dataset.to_string())))
    }

    async fn list_tables(&self, project: &str, dataset: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        state.calls.push(WarehouseCall::ListTables {
            project: project.to_string(),
            dataset: dataset.to_string(),
        });
        Ok(state
            .tables
            .keys()
            .filter(|id| id.project == project && id.dataset == dataset)
            .map(|id| id.table.clone())
            .collect())
    }

    async fn get_table(&self, id: &TableId) -> Result<Option<TableDescriptor>> {
        let mut state = self.state.lock().await;
        state.calls.push(WarehouseCall::GetTable(id.clone()));
        state.check_failure(Operation::GetTable, id)?;
        Ok(state.tables.get(id).cloned())
    }

    async fn create_partitioned_copy(&self, spec: &RebuildSpec) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .calls
            .push(WarehouseCall::CreatePartitionedCopy(spec.clone()));
        state.check_failure(Operation::Create, &spec.target)?;
        state.require_absent("create", &spec.target)?;

        let source = state.require_table("create", &spec.source)?.clone();
        let shortfall = state
            .copy_shortfall
            .get(&spec.source.table)
            .copied()
            .unwrap_or(0);

        let copy = TableDescriptor {
            id: spec.target.clone(),
            partitioning: Partitioning::Time {
                field: spec.partition_field.clone(),
                require_filter: true,
            },
            clustering: spec.clustering.clone(),
            columns: source.columns.clone(),
            num_rows: source.num_rows.map(|n| n.saturating_sub(shortfall)),
            num_bytes: source.num_bytes,
        };
        state.tables.insert(copy.id.clone(), copy);
        state.check_lost_response(Operation::Create, &spec.target)
    }

    async fn require_partition_filter(&self, id: &TableId) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .calls
            .push(WarehouseCall::RequirePartitionFilter(id.clone()));
        state.check_failure(Operation::RequireFilter, id)?;

        let table = state.require_table("alter", id)?;
        match &mut table.partitioning {
            Partitioning::Time { require_filter, .. } => {
                *require_filter = true;
                state.check_lost_response(Operation::RequireFilter, id)
            }
            _ => Err(MigrateError::warehouse(
                "alter",
                id.to_string(),
                "require_partition_filter needs a time-partitioned table",
            )),
        }
    }

    async fn set_clustering(&self, id: &TableId, fields: &[String]) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .calls
            .push(WarehouseCall::SetClustering(id.clone(), fields.to_vec()));
        state.check_failure(Operation::SetClustering, id)?;

        state.require_table("patch", id)?.clustering = fields.to_vec();
        state.check_lost_response(Operation::SetClustering, id)
    }

    async fn rename_table(&self, id: &TableId, new_name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .calls
            .push(WarehouseCall::RenameTable(id.clone(), new_name.to_string()));
        state.check_failure(Operation::Rename, id)?;

        let new_id = id.sibling(new_name);
        state.require_absent("rename", &new_id)?;
        let mut table = state
            .tables
            .remove(id)
            .ok_or_else(|| MigrateError::warehouse("rename", id.to_string(), "Not found: Table"))?;
        table.id = new_id.clone();
        if let Some(rows) = state.writes_on_rename.get(&id.table) {
            table.num_rows = table.num_rows.map(|n| n + rows);
        }
        state.tables.insert(new_id, table);
        state.check_lost_response(Operation::Rename, id)
    }

    async fn delete_table(&self, id: &TableId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(WarehouseCall::DeleteTable(id.clone()));
        state.check_failure(Operation::Delete, id)?;

        state
            .tables
            .remove(id)
            .ok_or_else(|| MigrateError::warehouse("delete", id.to_string(), "Not found: Table"))?;
        state.check_lost_response(Operation::Delete, id)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gsc_data() -> TableDescriptor {
        TableDescriptor {
            id: TableId::new("p", "d", "gsc_data"),
            partitioning: Partitioning::None,
            clustering: vec![],
            columns: vec!["date".into(), "clicks".into()],
            num_rows: Some(42),
            num_bytes: 4_200,
        }
    }

    #[tokio::test]
    async fn test_rename_moves_table() {
        let wh = MemoryWarehouse::new().with_table(gsc_data());
        let id = TableId::new("p", "d", "gsc_data");
        wh.rename_table(&id, "gsc_data_backup").await.unwrap();

        assert!(wh.table(&id).await.is_none());
        let moved = wh.table(&id.sibling("gsc_data_backup")).await.unwrap();
        assert_eq!(moved.num_rows, Some(42));
        assert_eq!(moved.id.table, "gsc_data_backup");
    }

    #[tokio::test]
    async fn test_rename_onto_existing_table_fails() {
        let mut other = gsc_data();
        other.id = TableId::new("p", "d", "gsc_data_backup");
        let wh = MemoryWarehouse::new().with_table(gsc_data()).with_table(other);
        let id = TableId::new("p", "d", "gsc_data");
        assert!(wh.rename_table(&id, "gsc_data_backup").await.is_err());
        assert!(wh.table(&id).await.is_some());
    }

    #[tokio::test]
    async fn test_copy_applies_shortfall() {
        let wh = MemoryWarehouse::new()
            .with_table(gsc_data())
            .with_copy_shortfall("gsc_data", 2);
        let spec = RebuildSpec {
            source: TableId::new("p", "d", "gsc_data"),
            target: TableId::new("p", "d", "gsc_data_partitioned"),
            partition_field: "date".into(),
            clustering: vec!["date".into()],
            partition_expiration_days: 365,
            description: String::new(),
        };
        wh.create_partitioned_copy(&spec).await.unwrap();
        let copy = wh.table(&spec.target).await.unwrap();
        assert_eq!(copy.num_rows, Some(40));
        assert!(copy.partitioning.is_partitioned());
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded_and_returned() {
        let wh = MemoryWarehouse::new()
            .with_table(gsc_data())
            .fail_on(Operation::Delete, "gsc_data", "permission denied");
        let id = TableId::new("p", "d", "gsc_data");
        let err = wh.delete_table(&id).await.unwrap_err();
        assert!(err.to_string().contains("permission denied"));
        assert_eq!(wh.mutations().await, vec![WarehouseCall::DeleteTable(id.clone())]);
        assert!(wh.table(&id).await.is_some());
    }

    #[tokio::test]
    async fn test_lost_response_applies_then_fails() {
        let wh = MemoryWarehouse::new()
            .with_table(gsc_data())
            .lose_response(Operation::Rename, "gsc_data", "connection reset")
            .with_writes_on_rename("gsc_data", 5);
        let id = TableId::new("p", "d", "gsc_data");
        let err = wh.rename_table(&id, "gsc_data_backup").await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert!(wh.table(&id).await.is_none());
        let moved = wh.table(&id.sibling("gsc_data_backup")).await.unwrap();
        assert_eq!(moved.num_rows, Some(47));
    }

    #[tokio::test]
    async fn test_list_tables_scoped_to_dataset() {
        let mut elsewhere = gsc_data();
        elsewhere.id = TableId::new("p", "other", "ads_data");
        let wh = MemoryWarehouse::new().with_table(gsc_data()).with_table(elsewhere);
        assert_eq!(wh.list_tables("p", "d").await.unwrap(), vec!["gsc_data"]);
        assert!(wh.dataset_exists("p", "other").await.unwrap());
        assert!(!wh.dataset_exists("p", "missing").await.unwrap());
    }
}
