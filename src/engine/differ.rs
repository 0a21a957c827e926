//! Diff display

use colored::{ColoredString, Colorize};
use declarative::{DiffSummary, ResourceDiff, ResourceKind, ResourceState, group_by_kind};
use std::path::Path;

fn kind_title(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Package => "Packages",
        ResourceKind::Service => "Services",
        ResourceKind::File => "Directories",
        ResourceKind::Mount => "Mounts",
        ResourceKind::ExecGuarded => "Commands",
        ResourceKind::TextFragment => "Export fragments",
        ResourceKind::AggregateFile => "Generated files",
        ResourceKind::ConfigEdit => "Config settings",
    }
}

fn change_symbol(diff: &ResourceDiff) -> ColoredString {
    if diff.is_addition() {
        "+".green()
    } else if diff.is_removal() {
        "-".red()
    } else if diff.current == ResourceState::Unknown {
        "?".dimmed()
    } else {
        "~".yellow()
    }
}

/// Short `current → desired` text for one diff
pub fn describe_change(diff: &ResourceDiff) -> String {
    match (&diff.current, &diff.desired) {
        (ResourceState::Absent, ResourceState::Present { details }) => match details {
            Some(d) => format!("(absent) → {d}"),
            None => "(absent)".to_string(),
        },
        (ResourceState::Present { details: from }, ResourceState::Present { details: to }) => {
            format!(
                "{} → {}",
                from.as_deref().unwrap_or("current"),
                to.as_deref().unwrap_or("desired")
            )
        }
        (ResourceState::Present { .. }, ResourceState::Absent) => "(will remove)".to_string(),
        (ResourceState::Modified { from, to }, _) => format!("{from} → {to}"),
        (ResourceState::Unknown, desired) => format!("(unreadable) → {desired}"),
        _ => String::new(),
    }
}

/// Display diffs grouped by resource kind
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Convergence Plan".bold()
    );
    println!("│");

    for (kind, kind_diffs) in group_by_kind(diffs) {
        println!("│ {}", kind_title(kind).bold());
        for diff in kind_diffs {
            println!(
                "│   {} {:<40} {}",
                change_symbol(diff),
                diff.resource_id.to_string(),
                describe_change(diff).dimmed()
            );
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} to create, {} to modify)",
        summary.total().to_string().bold(),
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Changed lines between two texts, as `('-' | '+', line)`
pub fn text_changes(current: &str, desired: &str) -> Vec<(char, String)> {
    similar::TextDiff::from_lines(current, desired)
        .iter_all_changes()
        .filter_map(|change| {
            let sign = match change.tag() {
                similar::ChangeTag::Delete => '-',
                similar::ChangeTag::Insert => '+',
                similar::ChangeTag::Equal => return None,
            };
            Some((sign, change.value().trim_end_matches('\n').to_string()))
        })
        .collect()
}

/// Show how a generated file would change
pub fn display_text_diff(path: &Path, current: &str, desired: &str) {
    let changes = text_changes(current, desired);
    if changes.is_empty() {
        return;
    }

    println!();
    println!("  {} {}", "~".yellow(), path.display().to_string().bold());
    for (sign, line) in changes {
        let line = format!("{sign} {line}");
        if sign == '-' {
            println!("    {}", line.red());
        } else {
            println!("    {}", line.green());
        }
    }
}
