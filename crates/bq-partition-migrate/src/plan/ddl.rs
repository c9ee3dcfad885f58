//! GoogleSQL DDL statements issued by a migration.
//!
//! Every identifier is validated and quoted through [`crate::core::identifier`].

use crate::core::identifier::{column_list, quote_table, string_literal, validate_column_name};
use crate::core::{RebuildSpec, TableId};
use crate::error::Result;

/// `CREATE TABLE ... PARTITION BY ... AS SELECT * FROM source`.
pub fn create_partitioned_copy(spec: &RebuildSpec) -> Result<String> {
    validate_column_name(&spec.partition_field)?;
    let target = spec.target.quoted()?;
    let source = spec.source.quoted()?;

    let mut sql = format!(
        "CREATE TABLE {}\nPARTITION BY {}\n",
        target, spec.partition_field
    );
    if !spec.clustering.is_empty() {
        sql.push_str(&format!("CLUSTER BY {}\n", column_list(&spec.clustering)?));
    }
    sql.push_str(&format!(
        "OPTIONS(\n  partition_expiration_days = {},\n  require_partition_filter = TRUE,\n  description = {}\n)\n",
        spec.partition_expiration_days,
        string_literal(&spec.description)
    ));
    sql.push_str(&format!("AS SELECT * FROM {}", source));
    Ok(sql)
}

/// `ALTER TABLE ... SET OPTIONS (require_partition_filter = TRUE)`.
pub fn require_partition_filter(id: &TableId) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} SET OPTIONS (require_partition_filter = TRUE)",
        id.quoted()?
    ))
}

/// `ALTER TABLE ... RENAME TO ...`.
pub fn rename_table(id: &TableId, new_name: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} RENAME TO {}",
        id.quoted()?,
        quote_table(new_name)?
    ))
}

/// `DROP TABLE ...`. Only rendered for operator instructions and dry-run output.
pub fn drop_table(id: &TableId) -> Result<String> {
    Ok(format!("DROP TABLE {}", id.quoted()?))
}

/// Human-readable description of a clustering change, which has no DDL form.
pub fn set_clustering(id: &TableId, fields: &[String]) -> Result<String> {
    Ok(format!(
        "-- tables.patch {} clustering.fields = [{}]",
        id.quoted()?,
        column_list(fields)?
    ))
}

/// Description stamped on rebuilt tables.
pub fn migration_description(date: chrono::NaiveDate) -> String {
    format!(
        "Migrated to partitioned architecture on {}",
        date.format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn spec(clustering: &[&str]) -> RebuildSpec {
        RebuildSpec {
            source: TableId::new("p", "d", "gsc_data"),
            target: TableId::new("p", "d", "gsc_data_partitioned"),
            partition_field: "date".into(),
            clustering: clustering.iter().map(|s| s.to_string()).collect(),
            partition_expiration_days: 365,
            description: "Migrated to partitioned architecture on 2026-10-16".into(),
        }
    }

    #[test]
    fn test_create_with_clustering() {
        let sql =
            create_partitioned_copy(&spec(&["workspace_id", "property", "device", "country"]))
                .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE `p.d.gsc_data_partitioned`\n\
             PARTITION BY date\n\
             CLUSTER BY workspace_id, property, device, country\n\
             OPTIONS(\n  partition_expiration_days = 365,\n  require_partition_filter = TRUE,\n  \
             description = \"Migrated to partitioned architecture on 2026-10-16\"\n)\n\
             AS SELECT * FROM `p.d.gsc_data`"
        );
    }

    #[test]
    fn test_create_without_clustering_omits_clause() {
        let sql = create_partitioned_copy(&spec(&[])).unwrap();
        assert!(!sql.contains("CLUSTER BY"));
        assert!(sql.contains("PARTITION BY date\nOPTIONS("));
    }

    #[test]
    fn test_create_rejects_bad_partition_field() {
        let mut s = spec(&[]);
        s.partition_field = "date)--".into();
        assert!(create_partitioned_copy(&s).is_err());
    }

    #[test]
    fn test_alter_and_rename() {
        let id = TableId::new("p", "d", "gsc_data");
        assert_eq!(
            require_partition_filter(&id).unwrap(),
            "ALTER TABLE `p.d.gsc_data` SET OPTIONS (require_partition_filter = TRUE)"
        );
        assert_eq!(
            rename_table(&id, "gsc_data_backup").unwrap(),
            "ALTER TABLE `p.d.gsc_data` RENAME TO `gsc_data_backup`"
        );
        assert_eq!(drop_table(&id).unwrap(), "DROP TABLE `p.d.gsc_data`");
    }

    #[test]
    fn test_rename_rejects_qualified_target() {
        let id = TableId::new("p", "d", "gsc_data");
        assert!(rename_table(&id, "other.gsc_data").is_err());
    }

    #[test]
    fn test_migration_description() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(
            migration_description(date),
            "Migrated to partitioned architecture on 2026-10-16"
        );
    }
}
