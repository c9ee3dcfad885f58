//! Configuration validation.

use super::Config;
use crate::core::identifier::{validate_column_name, validate_dataset_name, validate_project_id};
use crate::error::{MigrateError, Result};

/// BigQuery accepts at most this many clustering columns.
pub const MAX_CLUSTERING_COLUMNS: usize = 4;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Warehouse validation
    if config.warehouse.project.is_empty() {
        return Err(MigrateError::Config("warehouse.project is required".into()));
    }
    if config.warehouse.dataset.is_empty() {
        return Err(MigrateError::Config("warehouse.dataset is required".into()));
    }
    validate_project_id(&config.warehouse.project)?;
    validate_dataset_name(&config.warehouse.dataset)?;

    // Migration validation
    let migration = &config.migration;
    validate_column_name(&migration.partition_field)?;
    if migration.partition_expiration_days == 0 {
        return Err(MigrateError::Config(
            "migration.partition_expiration_days must be at least 1".into(),
        ));
    }
    if migration.backup_suffix.is_empty() || migration.staging_suffix.is_empty() {
        return Err(MigrateError::Config(
            "migration.backup_suffix and migration.staging_suffix cannot be empty".into(),
        ));
    }
    if migration.backup_suffix == migration.staging_suffix {
        return Err(MigrateError::Config(
            "migration.backup_suffix and migration.staging_suffix must differ".into(),
        ));
    }

    for platform in &migration.platforms {
        if platform.name.is_empty() {
            return Err(MigrateError::Config(
                "migration.platforms entries need a name".into(),
            ));
        }
        if platform.markers.iter().any(|m| m.trim().is_empty()) {
            return Err(MigrateError::Config(format!(
                "platform '{}' has an empty marker, which would match every table",
                platform.name
            )));
        }
        if platform.clustering.len() > MAX_CLUSTERING_COLUMNS {
            return Err(MigrateError::Config(format!(
                "platform '{}' lists {} clustering columns, BigQuery allows at most {}",
                platform.name,
                platform.clustering.len(),
                MAX_CLUSTERING_COLUMNS
            )));
        }
        for column in &platform.clustering {
            validate_column_name(column)?;
        }
    }
    if migration.platform(&migration.default_platform).is_none() {
        return Err(MigrateError::Config(format!(
            "migration.default_platform '{}' is not defined in migration.platforms",
            migration.default_platform
        )));
    }

    // Cost validation
    if config.cost.partition_days <= 0.0 {
        return Err(MigrateError::Config(
            "cost.partition_days must be positive".into(),
        ));
    }
    if config.cost.queries_per_day < 0.0 || config.cost.price_per_tb < 0.0 {
        return Err(MigrateError::Config(
            "cost.queries_per_day and cost.price_per_tb cannot be negative".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformRule;

    fn valid_config() -> Config {
        Config::for_dataset("mcp-servers-475317", "wpp_marketing")
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_project() {
        let mut config = valid_config();
        config.warehouse.project = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_dataset_with_backtick_rejected() {
        let mut config = valid_config();
        config.warehouse.dataset = "wpp`; DROP".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_same_suffixes_rejected() {
        let mut config = valid_config();
        config.migration.staging_suffix = "_backup".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_too_many_clustering_columns() {
        let mut config = valid_config();
        config.migration.platforms.push(PlatformRule {
            name: "bing".into(),
            markers: vec!["bing".into()],
            clustering: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
        });
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("at most 4"));
    }

    #[test]
    fn test_empty_marker_rejected() {
        let mut config = valid_config();
        config.migration.platforms.push(PlatformRule {
            name: "bing".into(),
            markers: vec!["bing".into(), "".into()],
            clustering: vec!["workspace_id".into()],
        });
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("empty marker"));
    }

    #[test]
    fn test_upper_case_marker_accepted() {
        let mut config = valid_config();
        config.migration.platforms.push(PlatformRule {
            name: "bing".into(),
            markers: vec!["BING".into()],
            clustering: vec!["workspace_id".into()],
        });
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_unknown_default_platform() {
        let mut config = valid_config();
        config.migration.default_platform = "tiktok".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_partition_field_must_be_column_name() {
        let mut config = valid_config();
        config.migration.partition_field = "date; --".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_partition_days_rejected() {
        let mut config = valid_config();
        config.cost.partition_days = 0.0;
        assert!(validate(&config).is_err());
    }
}
