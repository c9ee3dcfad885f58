//! Core types shared by the planner, the warehouse backends and the runner.

pub mod identifier;
pub mod table;
pub mod traits;

pub use table::{Partitioning, TableDescriptor, TableId};
pub use traits::{RebuildSpec, Warehouse};
