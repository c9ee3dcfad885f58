//! Error types for the migration library.

use gcp_bigquery_client::error::BQError;
use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, bad identifiers, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error returned by the BigQuery API
    #[error("BigQuery error: {0}")]
    BigQuery(#[from] BQError),

    /// Warehouse operation failed for a reason other than an API error
    #[error("Warehouse {operation} failed for {table}: {message}")]
    Warehouse {
        operation: String,
        table: String,
        message: String,
    },

    /// Row count validation failed after copying a table
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A pre-flight check refused to start a table's migration
    #[error("Pre-flight check failed for {table}: {message}")]
    Preflight { table: String, message: String },

    /// Execute mode was requested without the confirmation flag
    #[error("Execute mode requires confirmation. Re-run with --execute --yes")]
    Confirmation,

    /// One or more tables could not be migrated
    #[error("{failed} of {total} tables failed to migrate")]
    PartialFailure { failed: usize, total: usize },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was interrupted (SIGINT, SIGTERM)
    #[error("Aborted by user")]
    Cancelled,
}

impl MigrateError {
    /// Create a Warehouse error for a failed operation on a table
    pub fn warehouse(
        operation: impl Into<String>,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MigrateError::Warehouse {
            operation: operation.into(),
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Preflight error
    pub fn preflight(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Preflight {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => 1,
            MigrateError::BigQuery(_) | MigrateError::Warehouse { .. } => 2,
            MigrateError::PartialFailure { .. } => 3,
            MigrateError::Confirmation => 4,
            MigrateError::Validation(_) => 5,
            MigrateError::Preflight { .. } => 6,
            MigrateError::Io(_) => 7,
            MigrateError::Cancelled => 8,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
