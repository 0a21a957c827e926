//! Apply with terminal UI around the convergence engine

use anyhow::{Context as AnyhowContext, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use declarative::{
    ConvergeReport, DependencyGraph, ExecuteOptions, ExecuteSummary, ResourceReport,
    compute_diffs, converge,
};
use serde::Serialize;

use crate::progress::ApplyProgress;
use crate::ui;

use super::differ::display_diff;

/// Options for `apply`
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Report what would change without changing it
    pub dry_run: bool,
    /// Worker threads within one dependency level
    pub jobs: usize,
    /// Skip the confirmation prompt
    pub yes: bool,
    /// Print every resource, not only failures
    pub verbose: bool,
    /// Machine-readable report on stdout; implies `yes`
    pub json: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: ExecuteOptions::default().jobs,
            yes: false,
            verbose: false,
            json: false,
        }
    }
}

impl ApplyOptions {
    fn engine_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            dry_run: self.dry_run,
            jobs: self.jobs.max(1),
            verbose: self.verbose,
        }
    }
}

/// What `apply --json` prints
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    /// RFC 3339
    pub started_at: String,
    pub dry_run: bool,
    pub success: bool,
    pub summary: &'a ExecuteSummary,
    pub resources: &'a [ResourceReport],
}

impl<'a> RunReport<'a> {
    pub fn new(started_at: DateTime<Utc>, dry_run: bool, report: &'a ConvergeReport) -> Self {
        Self {
            started_at: started_at.to_rfc3339(),
            dry_run,
            success: report.is_success(),
            summary: &report.summary,
            resources: &report.resources,
        }
    }
}

/// Show the plan, confirm, converge, and report
///
/// Returns `None` if the user declined.
pub fn execute(graph: &DependencyGraph, opts: &ApplyOptions) -> Result<Option<ConvergeReport>> {
    let started_at = Utc::now();

    if !opts.json {
        let diffs = compute_diffs(graph);
        display_diff(&diffs);

        if !diffs.is_empty() && !opts.yes && !opts.dry_run && !confirm_proceed()? {
            println!();
            println!("  {} Aborted", "✗".red());
            return Ok(None);
        }
    }

    let mut progress = if opts.json {
        ApplyProgress::hidden(graph.len())
    } else {
        ApplyProgress::new(graph.len(), opts.verbose)
    };
    let report = converge(graph, &opts.engine_options(), &mut progress)?;
    progress.finish();

    if opts.json {
        let json = serde_json::to_string_pretty(&RunReport::new(started_at, opts.dry_run, &report))
            .context("Failed to serialize run report")?;
        println!("{json}");
    } else if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
    } else {
        print_summary(&report);
    }

    Ok(Some(report))
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()
        .context("Cannot prompt for confirmation; pass --yes to apply non-interactively")?;

    Ok(confirmed)
}

/// Print final summary
fn print_summary(report: &ConvergeReport) {
    let summary = &report.summary;

    println!();
    if report.is_success() {
        println!("  {} Host converged successfully!", "✓".green().bold());
    } else {
        println!("  {} Convergence finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} resources modified", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} resources removed", summary.removed);
    }
    if summary.refreshed > 0 {
        println!("    • {} services restarted", summary.refreshed);
    }
    if summary.no_change > 0 {
        println!("    • {} resources unchanged", summary.no_change);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
    if summary.dependency_failed > 0 {
        println!(
            "    • {} resources not applied (failed dependency)",
            summary.dependency_failed
        );
    }

    for failure in report.failures() {
        let result = failure.refresh.as_ref().filter(|r| !r.is_success());
        ui::error(ui::result_line(&failure.id, result.unwrap_or(&failure.result)).trim_start());
    }
}
