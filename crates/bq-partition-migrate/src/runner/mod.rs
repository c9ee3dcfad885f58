//! Migration runner - sequential table migration workflow.
//!
//! For each table: inspect live metadata, classify it, then either do
//! nothing, alter it in place, or rebuild it as a partitioned copy that is
//! verified and swapped in while the original is kept as a backup.

mod report;

pub use report::{MigrationReport, RunMode, TableOutcome, TableReport};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::identifier::validate_table_name;
use crate::core::{RebuildSpec, TableDescriptor, TableId, Warehouse};
use crate::error::{MigrateError, Result};
use crate::plan::{
    ddl, desired_clustering, detect_platform, select_clustering_fields, Classification,
    CostEstimate, Issue, MigrationPlan,
};

/// A table's live metadata together with its derived plan.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub table: TableDescriptor,
    pub plan: MigrationPlan,
    /// What will be done about each issue in `plan`.
    pub actions: Vec<String>,
    pub platform: String,
    /// Clustering columns available for this table, possibly empty.
    pub clustering: Vec<String>,
}

/// Result of a warehouse reachability check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub backend: String,
    pub project: String,
    pub dataset: String,
    pub connected: bool,
    pub dataset_found: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
    pub healthy: bool,
}

/// Migration runner.
pub struct Runner {
    config: Config,
    warehouse: Arc<dyn Warehouse>,
    mode: RunMode,
    cancel: CancellationToken,
}

impl Runner {
    /// Create a new runner.
    pub fn new(config: Config, warehouse: Arc<dyn Warehouse>, mode: RunMode) -> Self {
        Self {
            config,
            warehouse,
            mode,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe an external cancellation token between steps.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Check that the configured dataset is reachable.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let project = &self.config.warehouse.project;
        let dataset = &self.config.warehouse.dataset;

        let start = Instant::now();
        let outcome = self.warehouse.dataset_exists(project, dataset).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (connected, dataset_found, error) = match outcome {
            Ok(true) => (true, true, None),
            Ok(false) => (
                true,
                false,
                Some(format!("Dataset {}.{} not found", project, dataset)),
            ),
            Err(e) => (false, false, Some(e.to_string())),
        };

        Ok(HealthCheckResult {
            backend: self.warehouse.backend_type().to_string(),
            project: project.clone(),
            dataset: dataset.clone(),
            connected,
            dataset_found,
            latency_ms,
            error,
            healthy: connected && dataset_found,
        })
    }

    /// Read a table's metadata and derive its plan. `None` if the table does not exist.
    pub async fn inspect(&self, table: &str) -> Result<Option<Inspection>> {
        let id = self.config.table_id(table);
        let Some(descriptor) = self.warehouse.get_table(&id).await? else {
            return Ok(None);
        };

        let migration = &self.config.migration;
        let platform = detect_platform(table, migration).to_string();
        let desired = desired_clustering(&platform, migration);
        let clustering = select_clustering_fields(&desired, &descriptor.columns);
        let plan = MigrationPlan::for_table(&descriptor);
        let actions = plan.actions(&migration.partition_field);

        debug!(
            "{}: platform={} partitioning={} clustering={:?} rows={}",
            id,
            platform,
            descriptor.partitioning,
            descriptor.clustering,
            display_rows(descriptor.num_rows)
        );

        Ok(Some(Inspection {
            table: descriptor,
            plan,
            actions,
            platform,
            clustering,
        }))
    }

    /// Inspect tables and record the statements a migration would issue.
    /// Never mutates, whatever the runner's mode.
    pub async fn plan(&self, tables: &[String]) -> Result<MigrationReport> {
        self.process(tables, RunMode::DryRun).await
    }

    /// Migrate the given tables, or every eligible table in the dataset when
    /// the list is empty.
    pub async fn run(&self, tables: &[String]) -> Result<MigrationReport> {
        self.process(tables, self.mode).await
    }

    async fn process(&self, requested: &[String], mode: RunMode) -> Result<MigrationReport> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let project = self.config.warehouse.project.clone();
        let dataset = self.config.warehouse.dataset.clone();

        info!(
            "Starting migration run: {} ({} mode, backend: {})",
            run_id,
            mode,
            self.warehouse.backend_type()
        );

        // Phase 1: Resolve tables
        info!("Phase 1: Resolving tables in {}.{}", project, dataset);
        let (names, skipped_auxiliary) = self.resolve_tables(requested).await?;
        info!(
            "Found {} tables ({} backup/staging/temp tables skipped)",
            names.len(),
            skipped_auxiliary.len()
        );

        let mut reports = Vec::new();
        let mut cancelled = false;

        // Phase 2: Inspect
        info!("Phase 2: Inspecting table configuration");
        let mut to_alter = Vec::new();
        let mut to_rebuild = Vec::new();
        for name in &names {
            if cancelled || self.cancel.is_cancelled() {
                cancelled = true;
                reports.push(TableReport::uninspected(name, aborted_outcome()));
                continue;
            }
            match self.inspect(name).await {
                Ok(Some(inspection)) => match inspection.plan.classification {
                    Classification::Compliant => {
                        info!("{}: already optimized", name);
                        reports.push(TableReport::from_inspection(
                            &inspection,
                            TableOutcome::AlreadyCompliant,
                        ));
                    }
                    Classification::NeedsAlter => {
                        info!("{}: {}", name, inspection.plan.issue_summary());
                        to_alter.push(inspection);
                    }
                    Classification::NeedsRebuild => {
                        info!("{}: {}", name, inspection.plan.issue_summary());
                        to_rebuild.push(inspection);
                    }
                },
                Ok(None) => {
                    error!("{}: table not found", name);
                    reports.push(TableReport::uninspected(
                        name,
                        TableOutcome::Failed {
                            reason: format!("Table {} not found", self.config.table_id(name)),
                        },
                    ));
                }
                Err(e) => {
                    error!("{}: inspection failed - {}", name, e);
                    reports.push(TableReport::uninspected(
                        name,
                        TableOutcome::Failed {
                            reason: e.to_string(),
                        },
                    ));
                }
            }
        }

        info!(
            "Plan: {} already optimized, {} need ALTER, {} need full migration",
            reports
                .iter()
                .filter(|r| r.outcome == TableOutcome::AlreadyCompliant)
                .count(),
            to_alter.len(),
            to_rebuild.len()
        );

        // Phase 3: In-place updates
        if !to_alter.is_empty() && !cancelled {
            info!("Phase 3: Applying in-place updates");
        }
        for inspection in &to_alter {
            if cancelled || self.cancel.is_cancelled() {
                cancelled = true;
                reports.push(aborted(inspection));
                continue;
            }
            let mut report = TableReport::from_inspection(inspection, TableOutcome::Planned);
            match self.alter_table(inspection, mode, &mut report).await {
                Ok(outcome) => report.outcome = outcome,
                Err(MigrateError::Cancelled) => {
                    cancelled = true;
                    report.outcome = aborted_outcome();
                }
                Err(e) => {
                    error!("{}: failed - {}", inspection.table.id.table, e);
                    report.outcome = TableOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            }
            reports.push(report);
        }

        // Phase 4: Full migrations
        if !to_rebuild.is_empty() && !cancelled {
            info!("Phase 4: Rebuilding unpartitioned tables");
        }
        for inspection in &to_rebuild {
            if cancelled || self.cancel.is_cancelled() {
                cancelled = true;
                reports.push(aborted(inspection));
                continue;
            }
            let mut report = TableReport::from_inspection(inspection, TableOutcome::Planned);
            report.cost = Some(CostEstimate::estimate(
                inspection.table.size_gb(),
                &self.config.cost,
            ));
            match self.rebuild_table(inspection, mode, &mut report).await {
                Ok(outcome) => report.outcome = outcome,
                Err(MigrateError::Cancelled) => {
                    cancelled = true;
                    report.outcome = aborted_outcome();
                }
                Err(e) => {
                    error!("{}: failed - {}", inspection.table.id.table, e);
                    report.outcome = TableOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            }
            reports.push(report);
        }

        if cancelled {
            warn!("Cancellation requested, remaining tables were not processed");
        }

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let report = MigrationReport {
            run_id,
            mode,
            project,
            dataset,
            started_at,
            completed_at,
            duration_seconds: duration,
            tables: reports,
            skipped_auxiliary,
            cancelled,
        };

        info!(
            "Migration {}: {} tables, {} failed in {:.1}s",
            if cancelled { "cancelled" } else { "finished" },
            report.tables_total(),
            report.tables_failed(),
            report.duration_seconds
        );

        Ok(report)
    }

    /// Split requested (or listed) tables into those to process and auxiliary ones.
    async fn resolve_tables(&self, requested: &[String]) -> Result<(Vec<String>, Vec<String>)> {
        let migration = &self.config.migration;

        let candidates = if requested.is_empty() {
            let project = &self.config.warehouse.project;
            let dataset = &self.config.warehouse.dataset;
            if !self.warehouse.dataset_exists(project, dataset).await? {
                return Err(MigrateError::warehouse(
                    "list",
                    format!("{}.{}", project, dataset),
                    "Dataset not found",
                ));
            }
            let mut names = self.warehouse.list_tables(project, dataset).await?;
            names.sort();
            names
        } else {
            let mut seen = HashSet::new();
            let mut names = Vec::with_capacity(requested.len());
            for name in requested {
                validate_table_name(name)?;
                if seen.insert(name.as_str()) {
                    names.push(name.clone());
                } else {
                    debug!("Ignoring repeated table {}", name);
                }
            }
            names
        };

        let (auxiliary, tables): (Vec<String>, Vec<String>) = candidates
            .into_iter()
            .partition(|name| migration.is_auxiliary_table(name));

        for name in &auxiliary {
            debug!("Skipping auxiliary table {}", name);
        }

        Ok((tables, auxiliary))
    }

    /// Enable filter enforcement and/or clustering on a partitioned table.
    async fn alter_table(
        &self,
        inspection: &Inspection,
        mode: RunMode,
        report: &mut TableReport,
    ) -> Result<TableOutcome> {
        let id = &inspection.table.id;
        let set_filter = inspection.plan.has(Issue::MissingPartitionFilter);
        let mut set_clustering = inspection.plan.has(Issue::NotClustered);

        if set_clustering && inspection.clustering.is_empty() {
            warn!("{}: no clustering column available in schema", id.table);
            set_clustering = false;
            if !set_filter {
                return Ok(TableOutcome::Skipped {
                    reason: "no clustering column available in schema".to_string(),
                });
            }
        }

        if set_filter {
            report.statements.push(ddl::require_partition_filter(id)?);
        }
        if set_clustering {
            report
                .statements
                .push(ddl::set_clustering(id, &inspection.clustering)?);
        }

        if mode.is_dry_run() {
            for statement in &report.statements {
                info!("[DRY RUN] {}", statement);
            }
            return Ok(TableOutcome::Planned);
        }

        if self.cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }

        if set_filter {
            info!("{}: enabling require_partition_filter", id.table);
            self.warehouse.require_partition_filter(id).await?;
        }
        if set_clustering {
            info!(
                "{}: clustering by {}",
                id.table,
                inspection.clustering.join(", ")
            );
            self.warehouse
                .set_clustering(id, &inspection.clustering)
                .await?;
        }

        info!("{}: updated", id.table);
        Ok(TableOutcome::Altered)
    }

    /// Copy into a partitioned staging table, verify it, then swap names.
    async fn rebuild_table(
        &self,
        inspection: &Inspection,
        mode: RunMode,
        report: &mut TableReport,
    ) -> Result<TableOutcome> {
        let migration = &self.config.migration;
        let source = &inspection.table.id;
        let staging = source.sibling(migration.staging_name(&source.table));
        let backup = source.sibling(migration.backup_name(&source.table));

        if inspection.clustering.is_empty() {
            warn!("{}: no clustering columns available", source.table);
        }

        let spec = RebuildSpec {
            source: source.clone(),
            target: staging.clone(),
            partition_field: migration.partition_field.clone(),
            clustering: inspection.clustering.clone(),
            partition_expiration_days: migration.partition_expiration_days,
            description: ddl::migration_description(Utc::now().date_naive()),
        };

        report.statements.push(ddl::create_partitioned_copy(&spec)?);
        report
            .statements
            .push(ddl::rename_table(source, &backup.table)?);
        report
            .statements
            .push(ddl::rename_table(&staging, &source.table)?);

        self.preflight(inspection, &staging, &backup).await?;

        if mode.is_dry_run() {
            for statement in &report.statements {
                info!("[DRY RUN] {}", statement);
            }
            return Ok(TableOutcome::Planned);
        }

        if self.cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }

        info!(
            "{}: creating partitioned copy {} ({} rows)",
            source.table,
            staging.table,
            display_rows(inspection.table.num_rows)
        );
        self.warehouse.create_partitioned_copy(&spec).await?;

        let verified_rows = self.verify_copy(source, &staging).await?;
        report.rows_after = Some(verified_rows);

        // From here on the swap runs to completion regardless of cancellation.
        info!("{}: renaming original to {}", source.table, backup.table);
        if let Err(e) = self.warehouse.rename_table(source, &backup.table).await {
            match self.rename_landed(source, &backup).await {
                Ok(true) => warn!(
                    "{}: backup rename reported an error but {} is in place - {}",
                    source.table, backup.table, e
                ),
                Ok(false) => {
                    error!(
                        "{}: backup rename failed, original unchanged; {} left for manual cleanup",
                        source.table, staging
                    );
                    return Err(MigrateError::warehouse(
                        "rename",
                        source.to_string(),
                        format!(
                            "{} (original unchanged, staging table {} left for manual cleanup)",
                            e, staging
                        ),
                    ));
                }
                Err(check) => {
                    error!(
                        "{}: backup rename failed and table state is unknown - {}",
                        source.table, check
                    );
                    return Err(MigrateError::warehouse(
                        "rename",
                        source.to_string(),
                        format!(
                            "{}; table state unknown ({}); check {} and {} before re-running, staging table {} left for manual cleanup",
                            e, check, source, backup, staging
                        ),
                    ));
                }
            }
        }

        info!("{}: activating {}", source.table, staging.table);
        if let Err(e) = self.warehouse.rename_table(&staging, &source.table).await {
            match self.rename_landed(&staging, source).await {
                Ok(true) => warn!(
                    "{}: activation reported an error but {} is live - {}",
                    source.table, source, e
                ),
                Ok(false) => {
                    error!("{}: activation failed - {}", source.table, e);
                    return self.roll_back(source, &backup, verified_rows, e).await;
                }
                Err(check) => {
                    error!(
                        "{}: activation failed and table state is unknown - {}",
                        source.table, check
                    );
                    return self.roll_back(source, &backup, verified_rows, e).await;
                }
            }
        }

        info!("{}: migrated, {} rows verified", source.table, verified_rows);
        info!(
            "{}: backup retained as {}; after verifying, remove it with: {}",
            source.table,
            backup,
            ddl::drop_table(&backup)?
        );

        Ok(TableOutcome::Migrated {
            backup: backup.to_string(),
        })
    }

    /// Refuse to start a rebuild that could not complete.
    async fn preflight(
        &self,
        inspection: &Inspection,
        staging: &TableId,
        backup: &TableId,
    ) -> Result<()> {
        let source = &inspection.table.id;
        let field = &self.config.migration.partition_field;

        if !inspection.table.has_column(field) {
            return Err(MigrateError::preflight(
                source.to_string(),
                format!("partition column '{}' not in schema", field),
            ));
        }
        if self.warehouse.table_exists(staging).await? {
            return Err(MigrateError::preflight(
                source.to_string(),
                format!("staging table {} already exists", staging),
            ));
        }
        if self.warehouse.table_exists(backup).await? {
            return Err(MigrateError::preflight(
                source.to_string(),
                format!("backup table {} already exists", backup),
            ));
        }
        Ok(())
    }

    /// After a rename call errored, read both names to see whether it took
    /// effect anyway. Errors when neither or both names exist.
    async fn rename_landed(&self, from: &TableId, to: &TableId) -> Result<bool> {
        let from_exists = self.warehouse.table_exists(from).await?;
        let to_exists = self.warehouse.table_exists(to).await?;
        match (from_exists, to_exists) {
            (true, false) => Ok(false),
            (false, true) => Ok(true),
            _ => Err(MigrateError::warehouse(
                "rename",
                from.to_string(),
                format!(
                    "{} exists: {}, {} exists: {}",
                    from, from_exists, to, to_exists
                ),
            )),
        }
    }

    /// Compare row counts of source and staging; drop staging unless both
    /// are known and equal.
    async fn verify_copy(&self, source: &TableId, staging: &TableId) -> Result<u64> {
        let source_rows = self
            .warehouse
            .get_table(source)
            .await?
            .ok_or_else(|| MigrateError::warehouse("verify", source.to_string(), "Not found: Table"))?
            .num_rows;
        let staging_rows = self
            .warehouse
            .get_table(staging)
            .await?
            .ok_or_else(|| {
                MigrateError::warehouse("verify", staging.to_string(), "Not found: Table")
            })?
            .num_rows;

        let mut message = match (source_rows, staging_rows) {
            (Some(expected), Some(actual)) if expected == actual => {
                info!("{}: {} rows (match)", source.table, actual);
                return Ok(actual);
            }
            (Some(expected), Some(actual)) => {
                warn!(
                    "{}: source={} new={} (MISMATCH), deleting {}",
                    source.table, expected, actual, staging.table
                );
                format!(
                    "row count mismatch for {}: source={} new={}",
                    source, expected, actual
                )
            }
            _ => {
                warn!(
                    "{}: source={} new={} (row count unavailable), deleting {}",
                    source.table,
                    display_rows(source_rows),
                    display_rows(staging_rows),
                    staging.table
                );
                format!(
                    "row count unavailable for {}: source={} new={}",
                    source,
                    display_rows(source_rows),
                    display_rows(staging_rows)
                )
            }
        };
        if let Err(e) = self.warehouse.delete_table(staging).await {
            error!("{}: failed to delete {} - {}", source.table, staging, e);
            message.push_str(&format!(
                " (failed to delete {}: {}; remove it manually)",
                staging, e
            ));
        }
        Err(MigrateError::Validation(message))
    }

    /// Put the backup back at the production name after a failed activation.
    async fn roll_back(
        &self,
        source: &TableId,
        backup: &TableId,
        verified_rows: u64,
        cause: MigrateError,
    ) -> Result<TableOutcome> {
        warn!("{}: rolling back, restoring {}", source.table, backup.table);

        match self.warehouse.get_table(backup).await {
            Ok(Some(t)) if t.num_rows != Some(verified_rows) => warn!(
                "{}: backup has {} rows, expected {}; restoring anyway",
                source.table,
                display_rows(t.num_rows),
                verified_rows
            ),
            Ok(Some(_)) => {}
            Ok(None) => warn!("{}: backup {} not found", source.table, backup),
            Err(e) => warn!("{}: could not read backup metadata - {}", source.table, e),
        }

        match self.warehouse.rename_table(backup, &source.table).await {
            Ok(()) => {
                info!("{}: rollback complete, original restored", source.table);
                Ok(TableOutcome::RolledBack {
                    reason: cause.to_string(),
                })
            }
            Err(e) => {
                error!(
                    "{}: ROLLBACK FAILED - {}; original data is in {}",
                    source.table, e, backup
                );
                Ok(TableOutcome::Failed {
                    reason: format!(
                        "{}; rollback failed: {}; restore manually with: {}",
                        cause,
                        e,
                        ddl::rename_table(backup, &source.table)?
                    ),
                })
            }
        }
    }
}

fn aborted_outcome() -> TableOutcome {
    TableOutcome::Skipped {
        reason: MigrateError::Cancelled.to_string(),
    }
}

fn aborted(inspection: &Inspection) -> TableReport {
    TableReport::from_inspection(inspection, aborted_outcome())
}

fn display_rows(rows: Option<u64>) -> String {
    match rows {
        Some(n) => n.to_string(),
        None => "unknown".to_string(),
    }
}
