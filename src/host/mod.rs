//! Host interfaces - the external collaborators resources converge against
//!
//! Resources never shell out directly. They talk to the host through these
//! traits, so the convergence logic runs unchanged against the real system
//! ([`system`]) or against the in-memory fakes used by tests.

#[cfg(test)]
pub mod memory;
pub mod system;

use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::facts::OsFamily;
use crate::paths;
use crate::runner::CommandOutput;

/// OS package manager
pub trait PackageManager: Send + Sync + fmt::Debug {
    /// Short name for logs (`apt`, `yum`, ...)
    fn name(&self) -> &'static str;

    /// Binaries the adapter shells out to
    fn tools(&self) -> &'static [&'static str];

    fn is_installed(&self, package: &str) -> Result<bool>;

    fn install(&self, package: &str) -> Result<()>;
}

/// Init system / service supervisor
pub trait ServiceManager: Send + Sync + fmt::Debug {
    fn is_running(&self, service: &str) -> Result<bool>;
    fn is_enabled(&self, service: &str) -> Result<bool>;
    fn start(&self, service: &str) -> Result<()>;
    fn stop(&self, service: &str) -> Result<()>;
    fn enable(&self, service: &str) -> Result<()>;
    fn disable(&self, service: &str) -> Result<()>;
    fn restart(&self, service: &str) -> Result<()>;
}

/// One line of the mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub target: PathBuf,
    pub fstype: String,
    pub options: String,
}

impl MountEntry {
    /// A bind mount of `source` onto `target`
    pub fn bind(source: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            device: source.into(),
            target: target.into(),
            fstype: "none".to_string(),
            options: "bind".to_string(),
        }
    }

    pub fn is_bind(&self) -> bool {
        self.options.split(',').any(|o| o == "bind" || o == "rbind")
    }

    /// Render as an fstab line, whitespace in paths octal-escaped
    pub fn fstab_line(&self) -> String {
        format!(
            "{} {} {} {} 0 0",
            system::escape_mount_field(&self.device),
            system::escape_mount_field(&self.target.to_string_lossy()),
            self.fstype,
            self.options
        )
    }
}

/// Live mounts plus the at-boot mount table
pub trait MountTable: Send + Sync + fmt::Debug {
    /// The entry currently mounted at `target`, if any
    fn lookup(&self, target: &Path) -> Result<Option<MountEntry>>;

    /// Whether `live`, found at the entry's target, is the mount `entry` asks for
    fn is_mounted_from(&self, live: &MountEntry, entry: &MountEntry) -> Result<bool> {
        Ok(live.device == entry.device)
    }

    fn mount(&self, entry: &MountEntry) -> Result<()>;

    /// Whether the entry is configured to mount at boot
    fn is_persisted(&self, entry: &MountEntry) -> Result<bool>;

    /// Configure the entry to mount at boot
    fn persist(&self, entry: &MountEntry) -> Result<()>;
}

/// Runs guard and action commands for exec resources
pub trait CommandRunner: Send + Sync + fmt::Debug {
    fn run(&self, command: &str) -> Result<CommandOutput>;
}

/// Handles to every external collaborator, plus the filesystem root
#[derive(Debug, Clone)]
pub struct Host {
    root: PathBuf,
    pub packages: Arc<dyn PackageManager>,
    pub services: Arc<dyn ServiceManager>,
    pub mounts: Arc<dyn MountTable>,
    pub commands: Arc<dyn CommandRunner>,
}

impl Host {
    pub fn new(
        root: impl Into<PathBuf>,
        packages: Arc<dyn PackageManager>,
        services: Arc<dyn ServiceManager>,
        mounts: Arc<dyn MountTable>,
        commands: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            root: root.into(),
            packages,
            services,
            mounts,
            commands,
        }
    }

    /// The real host, with the package manager picked by OS family
    pub fn system(root: impl Into<PathBuf>, family: &OsFamily) -> Self {
        let root = root.into();
        let packages: Arc<dyn PackageManager> = match family {
            OsFamily::RedHat | OsFamily::CentOs => Arc::new(system::Yum),
            OsFamily::Sles => Arc::new(system::Zypper),
            _ => Arc::new(system::Apt),
        };
        let fstab = paths::resolve_under(&root, Path::new("/etc/fstab"));
        Self::new(
            root,
            packages,
            Arc::new(system::Systemctl),
            Arc::new(system::ProcMounts::new(fstab)),
            Arc::new(system::Shell),
        )
    }

    /// Filesystem root managed files are written under
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an absolute host path under the filesystem root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        paths::resolve_under(&self.root, path)
    }
}
