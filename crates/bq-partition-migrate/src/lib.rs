//! # bq-partition-migrate
//!
//! Migrates unpartitioned BigQuery tables to date-partitioned, clustered
//! tables with partition-filter enforcement.
//!
//! Each table is handled one at a time:
//!
//! - **Inspect** live metadata and classify the table
//! - **Alter** in place when it is partitioned but misconfigured
//! - **Rebuild** as a partitioned copy, verify row counts, and swap names
//!   while keeping the original as a backup
//! - **Dry run** by default: statements are recorded, never issued
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bq_partition_migrate::{BigQueryWarehouse, Config, RunMode, Runner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let warehouse = BigQueryWarehouse::connect(&config.warehouse).await?;
//!     let runner = Runner::new(config, Arc::new(warehouse), RunMode::DryRun);
//!     let report = runner.run(&[]).await?;
//!     println!("{} tables inspected", report.tables_total());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod plan;
pub mod runner;
pub mod warehouse;

// Re-exports for convenient access
pub use config::{Config, CostConfig, MigrationConfig, PlatformRule, WarehouseConfig};
pub use core::{Partitioning, RebuildSpec, TableDescriptor, TableId, Warehouse};
pub use error::{MigrateError, Result};
pub use plan::{Classification, CostEstimate, Issue, MigrationPlan};
pub use runner::{
    HealthCheckResult, Inspection, MigrationReport, RunMode, Runner, TableOutcome, TableReport,
};
pub use warehouse::{BigQueryWarehouse, MemoryWarehouse};
