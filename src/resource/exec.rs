//! Exec resource - a command guarded by an idempotency test
//!
//! The test command runs first. When it succeeds the resource is converged
//! and the main command never runs.

use anyhow::{Result, bail};
use std::sync::Arc;

use super::{ApplyContext, ApplyResult, Attributes, Resource, ResourceId, ResourceState};
use crate::host::CommandRunner;

#[derive(Debug, Clone)]
pub struct ExecGuarded {
    pub name: String,
    pub command: String,
    /// Succeeds when the command has nothing left to do
    pub test: String,
    runner: Arc<dyn CommandRunner>,
}

impl ExecGuarded {
    pub fn new(
        name: &str,
        command: impl Into<String>,
        test: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            name: name.to_string(),
            command: command.into(),
            test: test.into(),
            runner,
        }
    }

    fn guard_passes(&self) -> Result<bool> {
        Ok(self.runner.run(&self.test)?.success)
    }
}

impl Resource for ExecGuarded {
    fn id(&self) -> ResourceId {
        ResourceId::exec(&self.name)
    }

    fn description(&self) -> String {
        format!("Run `{}` unless `{}`", self.command, self.test)
    }

    fn attributes(&self) -> Attributes {
        Attributes::from([
            ("command", self.command.clone()),
            ("test", self.test.clone()),
        ])
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.guard_passes()? {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if self.guard_passes()? {
            return Ok(ApplyResult::Unchanged);
        }

        log::info!("Running {}", self.command);
        let output = self.runner.run(&self.command)?;
        if !output.success {
            bail!("`{}` failed: {}", self.command, output.failure_message());
        }
        Ok(ApplyResult::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::ScriptedCommands;
    use crate::host::system::Shell;
    use tempfile::TempDir;

    #[test]
    fn test_guard_passing_skips_command() {
        let runner = Arc::new(ScriptedCommands::new().pass("test -d /export"));
        let exec = ExecGuarded::new("root", "mkdir -p /export", "test -d /export", runner.clone());

        assert_eq!(
            exec.apply(&mut ApplyContext::default()).unwrap(),
            ApplyResult::Unchanged
        );
        assert_eq!(runner.history(), vec!["test -d /export"]);
    }

    #[test]
    fn test_command_runs_once() {
        let runner = Arc::new(
            ScriptedCommands::new()
                .pass("mkdir -p /export")
                .effect("mkdir -p /export", "test -d /export"),
        );
        let exec = ExecGuarded::new("root", "mkdir -p /export", "test -d /export", runner.clone());
        let mut ctx = ApplyContext::default();

        assert_eq!(exec.apply(&mut ctx).unwrap(), ApplyResult::Created);
        assert_eq!(exec.apply(&mut ctx).unwrap(), ApplyResult::Unchanged);
        assert_eq!(
            runner.history(),
            vec!["test -d /export", "mkdir -p /export", "test -d /export"]
        );
    }

    #[test]
    fn test_command_failure() {
        let runner = Arc::new(ScriptedCommands::new());
        let exec = ExecGuarded::new("broken", "false", "false", runner);

        let err = exec.apply(&mut ApplyContext::default()).unwrap_err();
        assert!(err.to_string().contains("`false` failed: exit status 1"));
    }

    #[test]
    fn test_with_real_shell() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("export");
        let exec = ExecGuarded::new(
            "root",
            format!("mkdir -p '{}'", dir.display()),
            format!("test -d '{}'", dir.display()),
            Arc::new(Shell),
        );

        assert!(exec.needs_apply().unwrap());
        assert_eq!(
            exec.apply(&mut ApplyContext::default()).unwrap(),
            ApplyResult::Created
        );
        assert!(dir.is_dir());
        assert!(!exec.needs_apply().unwrap());
    }
}
