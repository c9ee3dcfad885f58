//! Platform detection and clustering column selection.

use crate::config::MigrationConfig;

/// Fallback clustering column for tables whose platform has no usable columns.
pub const DATE_COLUMN: &str = "date";

/// Pick the platform for a table: the first rule with a marker contained in
/// the name, else the configured default. Matching ignores case on both sides.
pub fn detect_platform<'a>(table_name: &str, config: &'a MigrationConfig) -> &'a str {
    let lower = table_name.to_lowercase();
    config
        .platforms
        .iter()
        .find(|rule| {
            rule.markers
                .iter()
                .any(|m| lower.contains(m.to_lowercase().as_str()))
        })
        .map(|rule| rule.name.as_str())
        .unwrap_or(config.default_platform.as_str())
}

/// Desired clustering columns for a platform; `["date"]` for unknown platforms.
pub fn desired_clustering(platform: &str, config: &MigrationConfig) -> Vec<String> {
    config
        .platform(platform)
        .map(|rule| rule.clustering.clone())
        .unwrap_or_else(|| vec![DATE_COLUMN.to_string()])
}

/// Clustering columns to apply given the source schema.
///
/// Ordered intersection of `desired` with `columns`; if that is empty,
/// `["date"]` when the schema has a `date` column, otherwise nothing.
pub fn select_clustering_fields(desired: &[String], columns: &[String]) -> Vec<String> {
    let selected: Vec<String> = desired
        .iter()
        .filter(|field| columns.contains(*field))
        .cloned()
        .collect();

    if !selected.is_empty() {
        return selected;
    }

    if columns.iter().any(|c| c == DATE_COLUMN) {
        vec![DATE_COLUMN.to_string()]
    } else {
        Vec::new()
    }
}
