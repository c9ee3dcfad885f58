//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Warehouse location and credentials.
    pub warehouse: WarehouseConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Cost model used for the savings estimate.
    #[serde(default)]
    pub cost: CostConfig,
}

/// BigQuery project/dataset the runner operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// GCP project id.
    pub project: String,

    /// Dataset holding the tables to migrate.
    pub dataset: String,

    /// Service account key file. Application default credentials are used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Column used for `PARTITION BY` (default: "date").
    #[serde(default = "default_partition_field")]
    pub partition_field: String,

    /// Partition expiration applied to rebuilt tables (default: 365).
    #[serde(default = "default_partition_expiration_days")]
    pub partition_expiration_days: u32,

    /// Suffix of the retained original table (default: "_backup").
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,

    /// Suffix of the rebuilt table before activation (default: "_partitioned").
    #[serde(default = "default_staging_suffix")]
    pub staging_suffix: String,

    /// Tables starting with this prefix are never scanned (default: "temp_").
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,

    /// Platform used when no rule matches a table name (default: "gsc").
    #[serde(default = "default_platform")]
    pub default_platform: String,

    /// Platform detection rules, evaluated in order.
    #[serde(default = "default_platforms")]
    pub platforms: Vec<PlatformRule>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            partition_field: default_partition_field(),
            partition_expiration_days: default_partition_expiration_days(),
            backup_suffix: default_backup_suffix(),
            staging_suffix: default_staging_suffix(),
            temp_prefix: default_temp_prefix(),
            default_platform: default_platform(),
            platforms: default_platforms(),
        }
    }
}

impl MigrationConfig {
    /// Whether a table name denotes a backup, staging or temporary table.
    pub fn is_auxiliary_table(&self, name: &str) -> bool {
        name.contains(&self.backup_suffix)
            || name.contains(&self.staging_suffix)
            || name.starts_with(&self.temp_prefix)
    }

    pub fn backup_name(&self, table: &str) -> String {
        format!("{}{}", table, self.backup_suffix)
    }

    pub fn staging_name(&self, table: &str) -> String {
        format!("{}{}", table, self.staging_suffix)
    }

    /// Look up a platform rule by name.
    pub fn platform(&self, name: &str) -> Option<&PlatformRule> {
        self.platforms.iter().find(|p| p.name == name)
    }
}

/// A marketing platform: how to recognise its tables and how to cluster them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRule {
    /// Platform identifier (e.g. "gsc").
    pub name: String,

    /// Lower-case substrings that identify the platform in a table name.
    #[serde(default)]
    pub markers: Vec<String>,

    /// Desired clustering columns, most selective first. BigQuery allows at most 4.
    #[serde(default)]
    pub clustering: Vec<String>,
}

impl PlatformRule {
    fn new(name: &str, markers: &[&str], clustering: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            markers: markers.iter().map(|s| s.to_string()).collect(),
            clustering: clustering.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// On-demand query pricing model for the savings estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostConfig {
    /// Queries issued against each table per day (default: 251).
    #[serde(default = "default_queries_per_day")]
    pub queries_per_day: f64,

    /// On-demand price in USD per TB scanned (default: 6.25).
    #[serde(default = "default_price_per_tb")]
    pub price_per_tb: f64,

    /// Number of daily partitions a typical query is spread across (default: 365).
    #[serde(default = "default_partition_days")]
    pub partition_days: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            queries_per_day: default_queries_per_day(),
            price_per_tb: default_price_per_tb(),
            partition_days: default_partition_days(),
        }
    }
}

// Default value functions for serde
fn default_partition_field() -> String {
    "date".to_string()
}

fn default_partition_expiration_days() -> u32 {
    365
}

fn default_backup_suffix() -> String {
    "_backup".to_string()
}

fn default_staging_suffix() -> String {
    "_partitioned".to_string()
}

fn default_temp_prefix() -> String {
    "temp_".to_string()
}

fn default_platform() -> String {
    "gsc".to_string()
}

fn default_platforms() -> Vec<PlatformRule> {
    vec![
        PlatformRule::new(
            "gsc",
            &["gsc"],
            &["workspace_id", "property", "device", "country"],
        ),
        PlatformRule::new(
            "google_ads",
            &["ads", "google_ads"],
            &["workspace_id", "customer_id", "campaign_id", "device"],
        ),
        PlatformRule::new(
            "analytics",
            &["ga4", "analytics"],
            &["workspace_id", "property_id", "device_category", "session_source"],
        ),
    ]
}

fn default_queries_per_day() -> f64 {
    251.0
}

fn default_price_per_tb() -> f64 {
    6.25
}

fn default_partition_days() -> f64 {
    365.0
}
