//! In-memory host adapters
//!
//! Every adapter records the calls that changed state so tests can assert
//! on them.

use anyhow::{Result, bail};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{CommandRunner, Host, MountEntry, MountTable, PackageManager, ServiceManager};
use super::system::Shell;
use crate::runner::CommandOutput;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ============================================================================
// Packages
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryPackages {
    installed: Mutex<BTreeSet<String>>,
    broken: Mutex<BTreeSet<String>>,
    installs: Mutex<Vec<String>>,
}

impl MemoryPackages {
    pub fn mark_installed(&self, package: &str) {
        lock(&self.installed).insert(package.to_string());
    }

    /// Make installing `package` fail
    pub fn break_package(&self, package: &str) {
        lock(&self.broken).insert(package.to_string());
    }

    /// Packages installed through this adapter, in call order
    pub fn installs(&self) -> Vec<String> {
        lock(&self.installs).clone()
    }
}

impl PackageManager for MemoryPackages {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn tools(&self) -> &'static [&'static str] {
        &[]
    }

    fn is_installed(&self, package: &str) -> Result<bool> {
        Ok(lock(&self.installed).contains(package))
    }

    fn install(&self, package: &str) -> Result<()> {
        if lock(&self.broken).contains(package) {
            bail!("Unable to locate package {package}");
        }
        lock(&self.installed).insert(package.to_string());
        lock(&self.installs).push(package.to_string());
        Ok(())
    }
}

// ============================================================================
// Services
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    pub running: bool,
    pub enabled: bool,
}

#[derive(Debug, Default)]
pub struct MemoryServices {
    status: Mutex<BTreeMap<String, ServiceStatus>>,
    events: Mutex<Vec<String>>,
}

impl MemoryServices {
    pub fn set(&self, service: &str, status: ServiceStatus) {
        lock(&self.status).insert(service.to_string(), status);
    }

    pub fn status(&self, service: &str) -> ServiceStatus {
        lock(&self.status).get(service).copied().unwrap_or_default()
    }

    /// State-changing calls as `"<action> <service>"`, in call order
    pub fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }

    /// How many times `service` was restarted
    pub fn restarts(&self, service: &str) -> usize {
        let wanted = format!("restart {service}");
        lock(&self.events).iter().filter(|e| **e == wanted).count()
    }

    fn update(&self, action: &str, service: &str, f: impl FnOnce(&mut ServiceStatus)) {
        f(lock(&self.status).entry(service.to_string()).or_default());
        lock(&self.events).push(format!("{action} {service}"));
    }
}

impl ServiceManager for MemoryServices {
    fn is_running(&self, service: &str) -> Result<bool> {
        Ok(self.status(service).running)
    }

    fn is_enabled(&self, service: &str) -> Result<bool> {
        Ok(self.status(service).enabled)
    }

    fn start(&self, service: &str) -> Result<()> {
        self.update("start", service, |s| s.running = true);
        Ok(())
    }

    fn stop(&self, service: &str) -> Result<()> {
        self.update("stop", service, |s| s.running = false);
        Ok(())
    }

    fn enable(&self, service: &str) -> Result<()> {
        self.update("enable", service, |s| s.enabled = true);
        Ok(())
    }

    fn disable(&self, service: &str) -> Result<()> {
        self.update("disable", service, |s| s.enabled = false);
        Ok(())
    }

    fn restart(&self, service: &str) -> Result<()> {
        self.update("restart", service, |s| s.running = true);
        Ok(())
    }
}

// ============================================================================
// Mounts
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryMounts {
    mounted: Mutex<BTreeMap<PathBuf, MountEntry>>,
    fstab: Mutex<Vec<MountEntry>>,
}

impl MemoryMounts {
    pub fn mounted(&self) -> Vec<MountEntry> {
        lock(&self.mounted).values().cloned().collect()
    }

    pub fn fstab(&self) -> Vec<MountEntry> {
        lock(&self.fstab).clone()
    }
}

impl MountTable for MemoryMounts {
    fn lookup(&self, target: &Path) -> Result<Option<MountEntry>> {
        Ok(lock(&self.mounted).get(target).cloned())
    }

    fn mount(&self, entry: &MountEntry) -> Result<()> {
        lock(&self.mounted).insert(entry.target.clone(), entry.clone());
        Ok(())
    }

    fn is_persisted(&self, entry: &MountEntry) -> Result<bool> {
        Ok(lock(&self.fstab)
            .iter()
            .any(|e| e.target == entry.target && e.device == entry.device))
    }

    fn persist(&self, entry: &MountEntry) -> Result<()> {
        lock(&self.fstab).push(entry.clone());
        Ok(())
    }
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Default)]
struct Script {
    passing: BTreeSet<String>,
    effects: BTreeMap<String, String>,
    history: Vec<String>,
}

/// Command runner with scripted outcomes
///
/// Unknown commands fail with exit status 1. A command can be given an
/// effect: once it succeeds, another command starts succeeding too (an
/// action making its guard pass).
#[derive(Debug, Default)]
pub struct ScriptedCommands {
    script: Mutex<Script>,
}

impl ScriptedCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `command` succeed
    pub fn pass(self, command: &str) -> Self {
        lock(&self.script).passing.insert(command.to_string());
        self
    }

    /// Once `command` succeeds, `makes_pass` succeeds as well
    pub fn effect(self, command: &str, makes_pass: &str) -> Self {
        lock(&self.script)
            .effects
            .insert(command.to_string(), makes_pass.to_string());
        self
    }

    /// Every command run, in order
    pub fn history(&self) -> Vec<String> {
        lock(&self.script).history.clone()
    }
}

impl CommandRunner for ScriptedCommands {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        let mut script = lock(&self.script);
        script.history.push(command.to_string());

        if !script.passing.contains(command) {
            return Ok(CommandOutput {
                success: false,
                code: Some(1),
                stdout: String::new(),
                stderr: format!("{command}: failed"),
            });
        }

        if let Some(next) = script.effects.get(command).cloned() {
            script.passing.insert(next);
        }
        Ok(CommandOutput {
            success: true,
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

// ============================================================================
// Host
// ============================================================================

/// An in-memory host with typed access to each fake
///
/// Files are real, under `root`. Commands run through `sh` unless a
/// scripted runner is swapped in.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    pub root: PathBuf,
    pub packages: Arc<MemoryPackages>,
    pub services: Arc<MemoryServices>,
    pub mounts: Arc<MemoryMounts>,
    pub commands: Arc<dyn CommandRunner>,
}

impl MemoryHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            packages: Arc::default(),
            services: Arc::default(),
            mounts: Arc::default(),
            commands: Arc::new(Shell),
        }
    }

    pub fn host(&self) -> Host {
        Host::new(
            self.root.clone(),
            self.packages.clone(),
            self.services.clone(),
            self.mounts.clone(),
            self.commands.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_effect() {
        let commands = ScriptedCommands::new()
            .pass("mkdir -p /export")
            .effect("mkdir -p /export", "test -d /export");

        assert!(!commands.run("test -d /export").unwrap().success);
        assert!(commands.run("mkdir -p /export").unwrap().success);
        assert!(commands.run("test -d /export").unwrap().success);
        assert_eq!(commands.history().len(), 3);
    }

    #[test]
    fn test_memory_services_records_events() {
        let services = MemoryServices::default();
        services.start("nfs").unwrap();
        services.restart("nfs").unwrap();
        services.restart("nfs").unwrap();
        assert!(services.is_running("nfs").unwrap());
        assert!(!services.is_enabled("nfs").unwrap());
        assert_eq!(services.restarts("nfs"), 2);
        assert_eq!(services.events()[0], "start nfs");
    }

    #[test]
    fn test_memory_packages_broken() {
        let packages = MemoryPackages::default();
        packages.break_package("nfs-utils");
        assert!(packages.install("nfs-utils").is_err());
        packages.install("nfs4-acl-tools").unwrap();
        assert_eq!(packages.installs(), vec!["nfs4-acl-tools"]);
    }
}
