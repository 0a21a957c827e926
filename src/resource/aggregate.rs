//! Aggregate file resource - a file fully regenerated from its fragments

use anyhow::Result;
use std::path::PathBuf;

use super::{
    ApplyContext, ApplyResult, Attributes, Resource, ResourceId, ResourceState, digest,
    read_optional, write_atomic,
};
use crate::host::Host;

/// A file whose whole content is rendered at build time
///
/// Anything else in the file is overwritten on apply, so stale entries
/// never survive a run.
#[derive(Debug, Clone)]
pub struct AggregateFile {
    pub path: PathBuf,
    resolved: PathBuf,
    content: String,
}

impl AggregateFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>, host: &Host) -> Self {
        let path = path.into();
        let resolved = host.resolve(&path);
        Self {
            path,
            resolved,
            content: content.into(),
        }
    }

    /// Current on-disk content, if the file exists
    pub fn on_disk(&self) -> Result<Option<String>> {
        read_optional(&self.resolved)
    }
}

impl Resource for AggregateFile {
    fn id(&self) -> ResourceId {
        ResourceId::aggregate(self.path.display().to_string())
    }

    fn description(&self) -> String {
        format!("Render {}", self.path.display())
    }

    fn attributes(&self) -> Attributes {
        Attributes::from([("content", self.content.clone())])
    }

    fn current_state(&self) -> Result<ResourceState> {
        match self.on_disk()? {
            None => Ok(ResourceState::Absent),
            Some(current) if current == self.content => {
                Ok(ResourceState::present(digest(&current)))
            }
            Some(current) => Ok(ResourceState::Modified {
                from: digest(&current),
                to: digest(&self.content),
            }),
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present(digest(&self.content))
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let result = match self.on_disk()? {
            Some(current) if current == self.content => return Ok(ApplyResult::Unchanged),
            Some(_) => ApplyResult::Modified,
            None => ApplyResult::Created,
        };

        log::info!("Writing {}", self.path.display());
        write_atomic(&self.resolved, &self.content)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_aggregate_created_modified_unchanged() {
        let temp = TempDir::new().unwrap();
        let host = MemoryHost::new(temp.path()).host();
        let mut ctx = ApplyContext::default();

        let first = AggregateFile::new("/etc/exports", "/export/a *(ro)\n", &host);
        assert_eq!(first.current_state().unwrap(), ResourceState::Absent);
        assert_eq!(first.apply(&mut ctx).unwrap(), ApplyResult::Created);
        assert_eq!(first.apply(&mut ctx).unwrap(), ApplyResult::Unchanged);

        let second = AggregateFile::new("/etc/exports", "/export/b *(ro)\n", &host);
        assert!(second.needs_apply().unwrap());
        assert_eq!(second.apply(&mut ctx).unwrap(), ApplyResult::Modified);
        assert_eq!(
            fs::read_to_string(temp.path().join("etc/exports")).unwrap(),
            "/export/b *(ro)\n"
        );
    }

    #[test]
    fn test_aggregate_overwrites_stale_entries() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("etc")).unwrap();
        fs::write(
            temp.path().join("etc/exports"),
            "/old/share *(rw)\n/export/a *(ro)\n",
        )
        .unwrap();
        let host = MemoryHost::new(temp.path()).host();

        let file = AggregateFile::new("/etc/exports", "/export/a *(ro)\n", &host);
        assert_eq!(
            file.apply(&mut ApplyContext::default()).unwrap(),
            ApplyResult::Modified
        );
        assert_eq!(file.on_disk().unwrap().unwrap(), "/export/a *(ro)\n");
    }
}
