//! Service resource - keep a system service running or stopped

use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;

use super::{ApplyContext, ApplyResult, Attributes, Resource, ResourceId, ResourceState};
use crate::host::ServiceManager;

/// Desired run state of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEnsure {
    Running,
    Stopped,
}

impl fmt::Display for ServiceEnsure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// A system service
///
/// A notification restarts a running service. A service declared stopped
/// ignores notifications.
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub ensure: ServiceEnsure,
    /// Start at boot
    pub enable: bool,
    manager: Arc<dyn ServiceManager>,
}

impl Service {
    /// A service that must be running and enabled at boot
    pub fn running(name: &str, manager: Arc<dyn ServiceManager>) -> Self {
        Self {
            name: name.to_string(),
            ensure: ServiceEnsure::Running,
            enable: true,
            manager,
        }
    }

    /// A service that must be stopped and disabled at boot
    pub fn stopped(name: &str, manager: Arc<dyn ServiceManager>) -> Self {
        Self {
            name: name.to_string(),
            ensure: ServiceEnsure::Stopped,
            enable: false,
            manager,
        }
    }

    fn observe(&self) -> Result<(bool, bool)> {
        let running = self
            .manager
            .is_running(&self.name)
            .with_context(|| format!("Failed to query service {}", self.name))?;
        let enabled = self
            .manager
            .is_enabled(&self.name)
            .with_context(|| format!("Failed to query service {}", self.name))?;
        Ok((running, enabled))
    }

    fn wants_running(&self) -> bool {
        self.ensure == ServiceEnsure::Running
    }
}

fn describe(running: bool, enabled: bool) -> String {
    format!(
        "{}, {}",
        if running { "running" } else { "stopped" },
        if enabled { "enabled" } else { "disabled" }
    )
}

impl Resource for Service {
    fn id(&self) -> ResourceId {
        ResourceId::service(&self.name)
    }

    fn description(&self) -> String {
        match self.ensure {
            ServiceEnsure::Running => format!("Run {}", self.name),
            ServiceEnsure::Stopped => format!("Stop {}", self.name),
        }
    }

    fn attributes(&self) -> Attributes {
        Attributes::from([
            ("ensure", self.ensure.to_string()),
            ("enable", self.enable.to_string()),
        ])
    }

    fn current_state(&self) -> Result<ResourceState> {
        let (running, enabled) = self.observe()?;
        let current = describe(running, enabled);
        if running == self.wants_running() && enabled == self.enable {
            Ok(ResourceState::present(current))
        } else {
            Ok(ResourceState::Modified {
                from: current,
                to: describe(self.wants_running(), self.enable),
            })
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present(describe(self.wants_running(), self.enable))
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let (running, enabled) = self.observe()?;
        let mut changed = false;
        let mut started = false;

        if enabled != self.enable {
            let result = if self.enable {
                self.manager.enable(&self.name)
            } else {
                self.manager.disable(&self.name)
            };
            result.with_context(|| format!("Failed to change boot state of {}", self.name))?;
            changed = true;
        }

        if running != self.wants_running() {
            let result = if self.wants_running() {
                log::info!("Starting {}", self.name);
                self.manager.start(&self.name)
            } else {
                log::info!("Stopping {}", self.name);
                self.manager.stop(&self.name)
            };
            result.with_context(|| format!("Failed to {} {}", self.ensure, self.name))?;
            started = self.wants_running();
            changed = true;
        }

        Ok(if started {
            ApplyResult::Created
        } else if changed {
            ApplyResult::Modified
        } else {
            ApplyResult::Unchanged
        })
    }

    fn refresh(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if !self.wants_running() {
            return Ok(ApplyResult::Unchanged);
        }

        log::info!("Restarting {}", self.name);
        self.manager
            .restart(&self.name)
            .with_context(|| format!("Failed to restart {}", self.name))?;
        Ok(ApplyResult::Modified)
    }
}
