//! Package resource - ensure an OS package is installed

use anyhow::{Context, Result};
use std::sync::Arc;

use super::{ApplyContext, ApplyResult, Attributes, Resource, ResourceId, ResourceState};
use crate::host::PackageManager;

/// An OS package that must be installed
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    manager: Arc<dyn PackageManager>,
}

impl Package {
    pub fn new(name: &str, manager: Arc<dyn PackageManager>) -> Self {
        Self {
            name: name.to_string(),
            manager,
        }
    }

    fn is_installed(&self) -> Result<bool> {
        self.manager.is_installed(&self.name).with_context(|| {
            format!(
                "Failed to query {} for package {}",
                self.manager.name(),
                self.name
            )
        })
    }
}

impl Resource for Package {
    fn id(&self) -> ResourceId {
        ResourceId::package(&self.name)
    }

    fn description(&self) -> String {
        format!("Install {}", self.name)
    }

    fn attributes(&self) -> Attributes {
        Attributes::from([("ensure", "installed".to_string())])
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.is_installed()? {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if self.is_installed()? {
            return Ok(ApplyResult::Unchanged);
        }

        log::info!("Installing {} via {}", self.name, self.manager.name());
        self.manager
            .install(&self.name)
            .with_context(|| format!("Failed to install {}", self.name))?;
        Ok(ApplyResult::Created)
    }

    fn can_parallelize(&self) -> bool {
        // Package managers hold a global lock
        false
    }
}
