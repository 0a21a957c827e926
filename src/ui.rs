use colored::{ColoredString, Colorize};
use declarative::{ApplyResult, ResourceId};

/// Print a warning message
pub fn warn(msg: &str) {
    eprintln!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// One-character marker for an apply result
pub fn result_symbol(result: &ApplyResult) -> ColoredString {
    match result {
        ApplyResult::Unchanged => "○".dimmed(),
        ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => "✓".green(),
        ApplyResult::Failed { .. } | ApplyResult::DependencyFailed { .. } => "✗".red(),
        ApplyResult::Skipped { .. } => "⊘".yellow(),
    }
}

/// Why a result is what it is, if there is more to say than its label
pub fn result_detail(result: &ApplyResult) -> Option<String> {
    match result {
        ApplyResult::Failed { error } => Some(error.clone()),
        ApplyResult::Skipped { reason } => Some(reason.clone()),
        ApplyResult::DependencyFailed { dependency } => Some(format!("requires {dependency}")),
        _ => None,
    }
}

/// `  ✓ package:nfs-common created`, with the detail appended when present
pub fn result_line(id: &ResourceId, result: &ApplyResult) -> String {
    let mut line = format!("  {} {id} {}", result_symbol(result), result.label());
    if let Some(detail) = result_detail(result) {
        line.push_str(&format!(": {}", detail.dimmed()));
    }
    line
}
