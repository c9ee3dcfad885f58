//! Warehouse backends.

pub mod bigquery;
pub mod memory;

pub use bigquery::BigQueryWarehouse;
pub use memory::{MemoryWarehouse, Operation, WarehouseCall};
