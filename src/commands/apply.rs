//! `nfsconv apply` - one convergence run

use anyhow::{Result, bail};

use super::Session;
use crate::Context;
use crate::engine::{self, ApplyOptions};
use crate::host::Host;
use crate::runner;
use crate::ui;

pub fn run(ctx: &Context, opts: &ApplyOptions) -> Result<()> {
    let session = Session::load(ctx)?;

    if !opts.dry_run && !opts.json {
        if !is_root() {
            ui::warn("Not running as root; package, service and mount changes will likely fail");
        }
        for tool in missing_tools(&session.host) {
            ui::warn(&format!("'{tool}' not found in PATH"));
        }
    }

    let Some(report) = engine::execute(&session.resolved.graph, opts)? else {
        return Ok(());
    };

    if !report.is_success() {
        let failed = report.failures().count();
        bail!("{failed} resources did not converge");
    }

    Ok(())
}

/// Binaries the system adapters shell out to
const HOST_TOOLS: [&str; 3] = ["systemctl", "mount", "sh"];

fn required_tools(host: &Host) -> Vec<&'static str> {
    host.packages
        .tools()
        .iter()
        .chain(&HOST_TOOLS)
        .copied()
        .collect()
}

/// Adapter binaries not found in PATH
fn missing_tools(host: &Host) -> Vec<&'static str> {
    required_tools(host)
        .into_iter()
        .filter(|tool| !runner::command_exists(tool))
        .collect()
}

#[cfg(unix)]
fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}
