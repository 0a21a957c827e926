//! `nfsconv plan` - preview what apply would change

use anyhow::Result;
use declarative::{ResourceDiff, ResourceId, compute_diffs};

use super::Session;
use crate::Context;
use crate::engine::differ::{display_diff, display_text_diff};
use crate::engine::{Target, matches_filter, parse_target};
use crate::nfs::EXPORTS_PATH;
use crate::resource::read_optional;
use crate::ui;

pub fn run(ctx: &Context, target: Option<&str>) -> Result<()> {
    let session = Session::load(ctx)?;
    let target = target.map(parse_target).unwrap_or_default();

    if !ctx.quiet {
        ui::header("NFS server plan");
        ui::kv("Platform", session.resolved.profile.family.as_str());
        ui::kv("NFSv4", &session.resolved.idmap.to_string());
        ui::kv("Exports", &exports_summary(&session.resolved.fragments));
        ui::kv("Root", &session.host.root().display().to_string());
    }

    let diffs = pending_changes(&session, &target);
    display_diff(&diffs);

    if matches_filter(&ResourceId::aggregate(EXPORTS_PATH), &target) {
        let (current, desired) = exports_contents(&session)?;
        display_text_diff(session.resolved.exports_path(), &current, &desired);
    }

    Ok(())
}

/// Diffs for resources matching the target, in convergence order
pub fn pending_changes(session: &Session, target: &Target) -> Vec<ResourceDiff> {
    compute_diffs(&session.resolved.graph)
        .into_iter()
        .filter(|diff| matches_filter(&diff.resource_id, target))
        .collect()
}

/// `2 (data, films)`, or `0` with nothing exported
fn exports_summary(fragments: &[String]) -> String {
    if fragments.is_empty() {
        return "0".to_string();
    }
    format!("{} ({})", fragments.len(), fragments.join(", "))
}

/// `(on disk, rendered)` content of the exports file
pub fn exports_contents(session: &Session) -> Result<(String, String)> {
    let path = session.host.resolve(session.resolved.exports_path());
    let current = read_optional(&path)?.unwrap_or_default();
    Ok((current, session.resolved.exports_content.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NfsConfig;
    use crate::facts::OsFamily;
    use crate::host::memory::MemoryHost;
    use crate::nfs::assembler::MANAGED_HEADER;
    use declarative::ResourceKind;
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
nfs_v4 = true

[[exports]]
source = "/data"
clients = "10.0.0.0/24(rw)"
"#;

    fn session(mem: &MemoryHost) -> Session {
        let config = NfsConfig::from_toml(CONFIG).unwrap();
        Session::build(&OsFamily::Debian, &config, mem.host()).unwrap()
    }

    #[test]
    fn test_pending_changes_filtered_by_kind() {
        let tmp = TempDir::new().unwrap();
        let mem = MemoryHost::new(tmp.path());
        let session = session(&mem);

        let mounts = pending_changes(&session, &parse_target("mounts"));
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].resource_id, ResourceId::mount("/export/data"));

        let all = pending_changes(&session, &Target::default());
        assert!(all.iter().any(|d| d.resource_id.kind == ResourceKind::Package));
        assert!(all.len() > mounts.len());
    }

    #[test]
    fn test_exports_summary_names_fragments() {
        let tmp = TempDir::new().unwrap();
        let mem = MemoryHost::new(tmp.path());
        let session = session(&mem);

        assert_eq!(session.resolved.fragments, vec!["data".to_string()]);
        assert_eq!(exports_summary(&session.resolved.fragments), "1 (data)");
        assert_eq!(exports_summary(&[]), "0");
    }

    #[test]
    fn test_exports_contents_reads_under_root() {
        let tmp = TempDir::new().unwrap();
        let mem = MemoryHost::new(tmp.path());
        let session = session(&mem);

        let (current, desired) = exports_contents(&session).unwrap();
        assert_eq!(current, "");
        assert_eq!(desired, format!("{MANAGED_HEADER}/export/data 10.0.0.0/24(rw)\n"));

        fs::create_dir_all(tmp.path().join("etc")).unwrap();
        fs::write(tmp.path().join("etc/exports"), "/old *(ro)\n").unwrap();
        let (current, _) = exports_contents(&session).unwrap();
        assert_eq!(current, "/old *(ro)\n");
    }
}
