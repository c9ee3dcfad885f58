//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::core::TableId;
use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Minimal configuration for a project/dataset with all defaults applied.
    pub fn for_dataset(project: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            warehouse: WarehouseConfig {
                project: project.into(),
                dataset: dataset.into(),
                credentials_path: None,
            },
            migration: MigrationConfig::default(),
            cost: CostConfig::default(),
        }
    }

    /// Fully qualified id of a table in the configured dataset.
    pub fn table_id(&self, table: &str) -> TableId {
        TableId::new(&self.warehouse.project, &self.warehouse.dataset, table)
    }
}
