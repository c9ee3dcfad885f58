//! Human-readable report printing.

use bq_partition_migrate::{
    Classification, HealthCheckResult, MigrateError, MigrationReport, RunMode, TableOutcome,
};

/// Print a run report as a summary.
pub fn print_report(report: &MigrationReport) {
    let title = match report.mode {
        RunMode::DryRun => "Dry run completed (no changes made)",
        RunMode::Execute => "Migration completed",
    };
    println!("\n{}", title);
    println!("  Run ID: {}", report.run_id);
    println!("  Dataset: {}.{}", report.project, report.dataset);
    println!("  Duration: {:.2}s", report.duration_seconds);

    let optimized = report.with_classification(Classification::Compliant);
    let to_alter = report.with_classification(Classification::NeedsAlter);
    let to_rebuild = report.with_classification(Classification::NeedsRebuild);

    println!("\nAlready optimized: {}", optimized.len());
    for table in &optimized {
        println!("  - {}", table.table);
    }

    println!("\nNeeds ALTER TABLE: {}", to_alter.len());
    for table in &to_alter {
        let issues: Vec<String> = table.issues.iter().map(|i| i.to_string()).collect();
        println!("  - {} [{}]: {}", table.table, issues.join(", "), table.outcome);
        print_actions(&table.actions);
    }

    println!("\nNeeds full migration: {}", to_rebuild.len());
    for table in &to_rebuild {
        println!(
            "  - {} ({} rows, platform {}): {}",
            table.table,
            table
                .rows_before
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            table.platform.as_deref().unwrap_or("?"),
            table.outcome
        );
        print_actions(&table.actions);
        if !table.clustering.is_empty() {
            println!("      clustering: {}", table.clustering.join(", "));
        }
        if let Some(cost) = &table.cost {
            println!(
                "      cost/day: ${:.2} -> ${:.2} ({:.2} GB)",
                cost.before_per_day, cost.after_per_day, cost.size_gb
            );
        }
    }

    let uninspected: Vec<_> = report
        .tables
        .iter()
        .filter(|t| t.classification.is_none())
        .collect();
    if !uninspected.is_empty() {
        println!("\nCould not inspect: {}", uninspected.len());
        for table in uninspected {
            println!("  - {}: {}", table.table, table.outcome);
        }
    }

    if report.mode == RunMode::DryRun {
        let planned: Vec<_> = report
            .tables
            .iter()
            .filter(|t| t.outcome == TableOutcome::Planned)
            .collect();
        if !planned.is_empty() {
            println!("\nPlanned statements:");
            for table in planned {
                for statement in &table.statements {
                    println!("\n{};", statement);
                }
            }
        }
    }

    if !to_rebuild.is_empty() {
        let total = report.total_cost();
        println!("\nEstimated query cost:");
        println!("  Before: ${:.2}/day", total.before_per_day);
        println!("  After:  ${:.2}/day", total.after_per_day);
        println!(
            "  Savings: ${:.2}/day (${:.0}/year)",
            total.daily_savings(),
            total.annual_savings()
        );
    }

    if !report.skipped_auxiliary.is_empty() {
        println!(
            "\nSkipped backup/staging/temp tables: {}",
            report.skipped_auxiliary.len()
        );
    }

    let migrated: Vec<&str> = report
        .tables
        .iter()
        .filter_map(|t| match &t.outcome {
            TableOutcome::Migrated { backup } => Some(backup.as_str()),
            _ => None,
        })
        .collect();
    if !migrated.is_empty() {
        println!("\nBackups retained (delete manually after verification):");
        for backup in migrated {
            println!("  - {}", backup);
        }
    }

    let failed = report.failed_tables();
    if !failed.is_empty() {
        println!("\nFailed tables: {:?}", failed);
    }

    if report.mode == RunMode::DryRun && (!to_alter.is_empty() || !to_rebuild.is_empty()) {
        println!("\nTo apply: bq-partition-migrate run --execute --yes");
    }
}

fn print_actions(actions: &[String]) {
    if let Some(line) = actions_line(actions) {
        println!("{}", line);
    }
}

fn actions_line(actions: &[String]) -> Option<String> {
    if actions.is_empty() {
        return None;
    }
    Some(format!("      actions needed: {}", actions.join("; ")))
}

/// Map a finished report to the process outcome.
pub fn report_status(report: &MigrationReport) -> Result<(), MigrateError> {
    if report.cancelled {
        return Err(MigrateError::Cancelled);
    }
    let failed = report.tables_failed();
    if failed > 0 {
        return Err(MigrateError::PartialFailure {
            failed,
            total: report.tables_total(),
        });
    }
    Ok(())
}

pub fn print_health(result: &HealthCheckResult) {
    println!("Health Check Results:");
    println!(
        "  Warehouse ({}): {} ({}ms)",
        result.backend,
        if result.connected { "OK" } else { "FAILED" },
        result.latency_ms
    );
    println!(
        "  Dataset {}.{}: {}",
        result.project,
        result.dataset,
        if result.dataset_found { "OK" } else { "NOT FOUND" }
    );
    if let Some(ref err) = result.error {
        println!("    Error: {}", err);
    }
    println!(
        "\n  Overall: {}",
        if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
    );
}
