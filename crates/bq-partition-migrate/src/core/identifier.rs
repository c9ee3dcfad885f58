//! Identifier validation and quoting for generated BigQuery DDL.
//!
//! Table and column names cannot be bound as query parameters, so every
//! statement this crate issues splices them into SQL text. All names pass
//! through the validators here before they are quoted:
//!
//! 1. Reject empty names, null bytes and excessive length
//! 2. Restrict each kind of name to the character set BigQuery accepts for it
//! 3. Wrap in backticks (which the validators guarantee never occur inside)

use crate::error::{MigrateError, Result};

/// Maximum identifier length BigQuery accepts for dataset and table names.
const MAX_IDENTIFIER_LENGTH: usize = 1024;

/// Maximum column name length.
const MAX_COLUMN_LENGTH: usize = 300;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes, backticks or line breaks
/// - Identifiers exceeding maximum length
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains(['\0', '`', '\n', '\r']) {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier contains a forbidden character: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Validate a GCP project id (`my-project-123`, optionally `domain.com:my-project`).
pub fn validate_project_id(project: &str) -> Result<()> {
    validate_identifier(project)?;
    if !project
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | ':'))
    {
        return Err(MigrateError::Config(format!(
            "Invalid project id: {:?} (lower-case letters, digits, '-', '.', ':' only)",
            project
        )));
    }
    Ok(())
}

/// Validate a dataset name: letters, digits and underscores.
pub fn validate_dataset_name(dataset: &str) -> Result<()> {
    validate_identifier(dataset)?;
    if !dataset.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(MigrateError::Config(format!(
            "Invalid dataset name: {:?} (letters, digits and '_' only)",
            dataset
        )));
    }
    Ok(())
}

/// Validate a table name: letters, digits, underscores and dashes.
pub fn validate_table_name(table: &str) -> Result<()> {
    validate_identifier(table)?;
    if !table
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(MigrateError::Config(format!(
            "Invalid table name: {:?} (letters, digits, '_' and '-' only)",
            table
        )));
    }
    Ok(())
}

/// Validate a column name: starts with a letter or underscore, then letters, digits, underscores.
pub fn validate_column_name(column: &str) -> Result<()> {
    validate_identifier(column)?;
    if column.len() > MAX_COLUMN_LENGTH {
        return Err(MigrateError::Config(format!(
            "Column name exceeds {} characters: {:?}",
            MAX_COLUMN_LENGTH, column
        )));
    }
    let mut chars = column.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(MigrateError::Config(format!(
            "Invalid column name: {:?}",
            column
        )));
    }
    Ok(())
}

/// Quote a single table name, e.g. for `RENAME TO`.
///
/// ```ignore
/// assert_eq!(quote_table("gsc_data")?, "`gsc_data`");
/// ```
pub fn quote_table(table: &str) -> Result<String> {
    validate_table_name(table)?;
    Ok(format!("`{}`", table))
}

/// Quote a fully qualified table path as `` `project.dataset.table` ``.
pub fn quote_path(project: &str, dataset: &str, table: &str) -> Result<String> {
    validate_project_id(project)?;
    validate_dataset_name(dataset)?;
    validate_table_name(table)?;
    Ok(format!("`{}.{}.{}`", project, dataset, table))
}

/// Join validated column names into a comma-separated list.
pub fn column_list(columns: &[String]) -> Result<String> {
    for column in columns {
        validate_column_name(column)?;
    }
    Ok(columns.join(", "))
}

/// Render a double-quoted GoogleSQL string literal.
pub fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_rejects_empty() {
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_backtick() {
        let err = validate_identifier("gsc`data").unwrap_err();
        assert!(err.to_string().contains("SECURITY"));
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        assert!(validate_identifier("gsc\0data").is_err());
    }

    #[test]
    fn test_validate_identifier_length_limit() {
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_project_ids() {
        assert!(validate_project_id("mcp-servers-475317").is_ok());
        assert!(validate_project_id("example.com:analytics-prod").is_ok());
        assert!(validate_project_id("Upper-Case").is_err());
        assert!(validate_project_id("proj ect").is_err());
    }

    #[test]
    fn test_dataset_names() {
        assert!(validate_dataset_name("wpp_marketing").is_ok());
        assert!(validate_dataset_name("wpp-marketing").is_err());
    }

    #[test]
    fn test_column_names() {
        assert!(validate_column_name("workspace_id").is_ok());
        assert!(validate_column_name("_PARTITIONTIME").is_ok());
        assert!(validate_column_name("1date").is_err());
        assert!(validate_column_name("date; DROP").is_err());
        assert!(validate_column_name(&"c".repeat(MAX_COLUMN_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_quote_path() {
        assert_eq!(
            quote_path("mcp-servers-475317", "wpp_marketing", "gsc_data").unwrap(),
            "`mcp-servers-475317.wpp_marketing.gsc_data`"
        );
        assert!(quote_path("p", "d", "bad.table").is_err());
    }

    #[test]
    fn test_quote_table() {
        assert_eq!(quote_table("gsc_data_backup").unwrap(), "`gsc_data_backup`");
    }

    #[test]
    fn test_column_list() {
        let cols = vec!["workspace_id".to_string(), "device".to_string()];
        assert_eq!(column_list(&cols).unwrap(), "workspace_id, device");
        assert!(column_list(&["bad col".to_string()]).is_err());
    }

    #[test]
    fn test_string_literal_escapes() {
        assert_eq!(string_literal("plain"), "\"plain\"");
        assert_eq!(string_literal("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(string_literal("a\\b"), "\"a\\\\b\"");
    }
}
