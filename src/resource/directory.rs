//! Directory resource - ensure a directory exists

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Attributes, Resource, ResourceId, ResourceState};
use crate::host::Host;

/// A directory at an absolute host path
#[derive(Debug, Clone)]
pub struct Directory {
    /// Path on the managed host
    pub path: PathBuf,
    /// Where the path actually lives (under the filesystem root)
    resolved: PathBuf,
}

impl Directory {
    pub fn new(path: impl Into<PathBuf>, host: &Host) -> Self {
        let path = path.into();
        let resolved = host.resolve(&path);
        Self { path, resolved }
    }
}

impl Resource for Directory {
    fn id(&self) -> ResourceId {
        ResourceId::file(self.path.display().to_string())
    }

    fn description(&self) -> String {
        format!("Directory {}", self.path.display())
    }

    fn attributes(&self) -> Attributes {
        Attributes::from([("ensure", "directory".to_string())])
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.resolved.is_dir() {
            Ok(ResourceState::present("directory"))
        } else if self.resolved.exists() || self.resolved.is_symlink() {
            Ok(ResourceState::Modified {
                from: "file".to_string(),
                to: "directory".to_string(),
            })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present("directory")
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if self.resolved.is_dir() {
            return Ok(ApplyResult::Unchanged);
        }
        if self.resolved.exists() || self.resolved.is_symlink() {
            bail!("{} exists and is not a directory", self.path.display());
        }

        fs::create_dir_all(&self.resolved)
            .with_context(|| format!("Failed to create directory: {}", self.resolved.display()))?;
        Ok(ApplyResult::Created)
    }
}
