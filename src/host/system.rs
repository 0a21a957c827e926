//! Host adapters for a real Linux system

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{CommandRunner, MountEntry, MountTable, PackageManager, ServiceManager};
use crate::runner::{self, CommandOutput};

// ============================================================================
// Package managers
// ============================================================================

/// Debian/Ubuntu packages via dpkg-query and apt-get
#[derive(Debug, Clone, Copy)]
pub struct Apt;

impl PackageManager for Apt {
    fn name(&self) -> &'static str {
        "apt"
    }

    fn tools(&self) -> &'static [&'static str] {
        &["dpkg-query", "apt-get"]
    }

    fn is_installed(&self, package: &str) -> Result<bool> {
        let output = runner::run_output("dpkg-query", &["-W", "-f=${Status}", package])?;
        Ok(output.success && output.stdout.contains("install ok installed"))
    }

    fn install(&self, package: &str) -> Result<()> {
        runner::run_checked(
            "env",
            &[
                "DEBIAN_FRONTEND=noninteractive",
                "apt-get",
                "install",
                "-y",
                "-q",
                package,
            ],
        )
    }
}

/// RedHat/CentOS packages via rpm and yum
#[derive(Debug, Clone, Copy)]
pub struct Yum;

impl PackageManager for Yum {
    fn name(&self) -> &'static str {
        "yum"
    }

    fn tools(&self) -> &'static [&'static str] {
        &["rpm", "yum"]
    }

    fn is_installed(&self, package: &str) -> Result<bool> {
        Ok(runner::run_quiet("rpm", &["-q", package]))
    }

    fn install(&self, package: &str) -> Result<()> {
        runner::run_checked("yum", &["install", "-y", "-q", package])
    }
}

/// SLES packages via rpm and zypper
#[derive(Debug, Clone, Copy)]
pub struct Zypper;

impl PackageManager for Zypper {
    fn name(&self) -> &'static str {
        "zypper"
    }

    fn tools(&self) -> &'static [&'static str] {
        &["rpm", "zypper"]
    }

    fn is_installed(&self, package: &str) -> Result<bool> {
        Ok(runner::run_quiet("rpm", &["-q", package]))
    }

    fn install(&self, package: &str) -> Result<()> {
        runner::run_checked("zypper", &["--non-interactive", "install", package])
    }
}

// ============================================================================
// Services
// ============================================================================

/// systemd services via systemctl
#[derive(Debug, Clone, Copy)]
pub struct Systemctl;

impl ServiceManager for Systemctl {
    fn is_running(&self, service: &str) -> Result<bool> {
        Ok(runner::run_quiet(
            "systemctl",
            &["is-active", "--quiet", service],
        ))
    }

    fn is_enabled(&self, service: &str) -> Result<bool> {
        Ok(runner::run_quiet(
            "systemctl",
            &["is-enabled", "--quiet", service],
        ))
    }

    fn start(&self, service: &str) -> Result<()> {
        runner::run_checked("systemctl", &["start", service])
    }

    fn stop(&self, service: &str) -> Result<()> {
        runner::run_checked("systemctl", &["stop", service])
    }

    fn enable(&self, service: &str) -> Result<()> {
        runner::run_checked("systemctl", &["enable", service])
    }

    fn disable(&self, service: &str) -> Result<()> {
        runner::run_checked("systemctl", &["disable", service])
    }

    fn restart(&self, service: &str) -> Result<()> {
        runner::run_checked("systemctl", &["restart", service])
    }
}

// ============================================================================
// Mounts
// ============================================================================

/// Live mounts from `/proc/self/mounts`, at-boot mounts in an fstab file
#[derive(Debug, Clone)]
pub struct ProcMounts {
    fstab: PathBuf,
    live: PathBuf,
}

impl ProcMounts {
    pub fn new(fstab: impl Into<PathBuf>) -> Self {
        Self::with_live_table(fstab, "/proc/self/mounts")
    }

    /// Read live mounts from `live` instead of the kernel's table
    pub fn with_live_table(fstab: impl Into<PathBuf>, live: impl Into<PathBuf>) -> Self {
        Self {
            fstab: fstab.into(),
            live: live.into(),
        }
    }

    fn fstab_entries(&self) -> Result<Vec<MountEntry>> {
        match fs::read_to_string(&self.fstab) {
            Ok(content) => Ok(parse_mount_table(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read {}", self.fstab.display()))
            }
        }
    }
}

impl MountTable for ProcMounts {
    fn lookup(&self, target: &Path) -> Result<Option<MountEntry>> {
        let content = fs::read_to_string(&self.live)
            .with_context(|| format!("Failed to read {}", self.live.display()))?;
        // The last entry for a target is the one on top
        Ok(parse_mount_table(&content)
            .into_iter()
            .rev()
            .find(|e| e.target == target))
    }

    fn is_mounted_from(&self, live: &MountEntry, entry: &MountEntry) -> Result<bool> {
        if live.device == entry.device {
            return Ok(true);
        }
        // The kernel lists a bind mount under its backing device, so the
        // source is recognized by the target resolving to the same inode
        let (a, b) = if entry.is_bind() {
            (Path::new(&entry.device), entry.target.as_path())
        } else {
            (Path::new(&live.device), Path::new(&entry.device))
        };
        same_file(a, b)
    }

    fn mount(&self, entry: &MountEntry) -> Result<()> {
        let target = entry.target.to_string_lossy();
        runner::run_checked(
            "mount",
            &[
                "-t",
                &entry.fstype,
                "-o",
                &entry.options,
                &entry.device,
                &target,
            ],
        )
    }

    fn is_persisted(&self, entry: &MountEntry) -> Result<bool> {
        Ok(self
            .fstab_entries()?
            .iter()
            .any(|e| e.target == entry.target && e.device == entry.device))
    }

    fn persist(&self, entry: &MountEntry) -> Result<()> {
        if let Some(parent) = self.fstab.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let needs_newline = fs::read_to_string(&self.fstab)
            .map(|c| !c.is_empty() && !c.ends_with('\n'))
            .unwrap_or(false);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.fstab)
            .with_context(|| format!("Failed to open {}", self.fstab.display()))?;

        if needs_newline {
            writeln!(file)?;
        }
        writeln!(file, "{}", entry.fstab_line())
            .with_context(|| format!("Failed to write {}", self.fstab.display()))?;

        log::info!("Added {} to {}", entry.target.display(), self.fstab.display());
        Ok(())
    }
}

/// Parse fstab or /proc/self/mounts content
pub fn parse_mount_table(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = unescape_mount_field(fields.next()?);
            let target = unescape_mount_field(fields.next()?);
            let fstype = fields.next()?.to_string();
            let options = fields.next().unwrap_or("defaults").to_string();
            Some(MountEntry {
                device,
                target: PathBuf::from(target),
                fstype,
                options,
            })
        })
        .collect()
}

/// Whether two paths resolve to the same device and inode
pub fn same_file(a: &Path, b: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let stat = |path: &Path| match fs::metadata(path) {
        Ok(meta) => Ok(Some((meta.dev(), meta.ino()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to stat {}", path.display())),
    };
    match (stat(a)?, stat(b)?) {
        (Some(a), Some(b)) => Ok(a == b),
        _ => Ok(false),
    }
}

/// Octal-escape the characters that would split a mount table field
pub fn escape_mount_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            ' ' => out.push_str("\\040"),
            '\t' => out.push_str("\\011"),
            '\n' => out.push_str("\\012"),
            '\\' => out.push_str("\\134"),
            c => out.push(c),
        }
    }
    out
}

/// Decode the octal escapes (`\040` for space) used in mount tables
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && let Some(digits) = field.get(i + 1..i + 4)
            && let Ok(value) = u8::from_str_radix(digits, 8)
        {
            out.push(value);
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ============================================================================
// Commands
// ============================================================================

/// Runs commands through `sh -c`
#[derive(Debug, Clone, Copy)]
pub struct Shell;

impl CommandRunner for Shell {
    fn run(&self, command: &str) -> Result<CommandOutput> {
        log::debug!("sh -c {command}");
        runner::run_output("sh", &["-c", command])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_mount_table() {
        let content = "\
# /etc/fstab
proc /proc proc defaults 0 0
/dev/sda1 / ext4 rw,relatime 0 0

/data /export/data none bind 0 0
/srv/my\\040files /export/files none bind 0 0
";
        let entries = parse_mount_table(content);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[2], MountEntry::bind("/data", "/export/data"));
        assert_eq!(entries[3].device, "/srv/my files");
    }

    #[test]
    fn test_unescape_mount_field() {
        assert_eq!(unescape_mount_field("a\\040b"), "a b");
        assert_eq!(unescape_mount_field("plain"), "plain");
        assert_eq!(unescape_mount_field("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_fstab_persist() {
        let temp = TempDir::new().unwrap();
        let fstab = temp.path().join("etc/fstab");
        std::fs::create_dir_all(fstab.parent().unwrap()).unwrap();
        std::fs::write(&fstab, "proc /proc proc defaults 0 0").unwrap();

        let mounts = ProcMounts::new(&fstab);
        let entry = MountEntry::bind("/data", "/export/data");
        assert!(!mounts.is_persisted(&entry).unwrap());

        mounts.persist(&entry).unwrap();
        assert!(mounts.is_persisted(&entry).unwrap());

        let content = std::fs::read_to_string(&fstab).unwrap();
        assert_eq!(
            content,
            "proc /proc proc defaults 0 0\n/data /export/data none bind 0 0\n"
        );
    }

    #[test]
    fn test_fstab_persist_path_with_spaces() {
        let temp = TempDir::new().unwrap();
        let fstab = temp.path().join("fstab");
        let mounts = ProcMounts::new(&fstab);
        let entry = MountEntry::bind("/srv/my files", "/export/my files");

        for _ in 0..3 {
            if !mounts.is_persisted(&entry).unwrap() {
                mounts.persist(&entry).unwrap();
            }
        }

        assert!(mounts.is_persisted(&entry).unwrap());
        let content = std::fs::read_to_string(&fstab).unwrap();
        assert_eq!(content, "/srv/my\\040files /export/my\\040files none bind 0 0\n");
    }

    #[test]
    fn test_escape_mount_field() {
        assert_eq!(escape_mount_field("plain"), "plain");
        assert_eq!(escape_mount_field("a b\\c"), "a\\040b\\134c");
        assert_eq!(unescape_mount_field(&escape_mount_field("x\ty\nz")), "x\ty\nz");
    }

    /// A bind mount as the kernel lists it: under the backing block device
    /// with the backing filesystem's type and options
    fn live_table(temp: &TempDir, target: &Path) -> PathBuf {
        let path = temp.path().join("mounts");
        std::fs::write(
            &path,
            format!(
                "sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0\n\
                 /dev/vda / ext4 rw,relatime 0 0\n\
                 /dev/vda {} ext4 rw,relatime 0 0\n",
                escape_mount_field(&target.to_string_lossy())
            ),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_bind_mount_listed_under_backing_device() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("data");
        let other = temp.path().join("other");
        let target = temp.path().join("export/data");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&other).unwrap();
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        // Same inode as the source, which is what a bind mount presents
        std::os::unix::fs::symlink(&source, &target).unwrap();

        let mounts =
            ProcMounts::with_live_table(temp.path().join("fstab"), live_table(&temp, &target));
        let live = mounts.lookup(&target).unwrap().unwrap();
        assert_eq!(live.device, "/dev/vda");
        assert_eq!(live.fstype, "ext4");

        let wanted = MountEntry::bind(source.to_string_lossy(), &target);
        assert!(mounts.is_mounted_from(&live, &wanted).unwrap());

        let foreign = MountEntry::bind(other.to_string_lossy(), &target);
        assert!(!mounts.is_mounted_from(&live, &foreign).unwrap());

        let missing = MountEntry::bind(temp.path().join("gone").to_string_lossy(), &target);
        assert!(!mounts.is_mounted_from(&live, &missing).unwrap());
    }

    #[test]
    fn test_same_file() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        std::fs::create_dir(&a).unwrap();
        assert!(same_file(&a, &temp.path().join("./a")).unwrap());
        assert!(!same_file(&a, temp.path()).unwrap());
        assert!(!same_file(&a, &temp.path().join("missing")).unwrap());
    }

    #[test]
    fn test_fstab_missing_is_not_persisted() {
        let temp = TempDir::new().unwrap();
        let mounts = ProcMounts::new(temp.path().join("fstab"));
        let entry = MountEntry::bind("/data", "/export/data");
        assert!(!mounts.is_persisted(&entry).unwrap());
    }

    #[test]
    fn test_shell_runner() {
        let output = Shell.run("test -d /").unwrap();
        assert!(output.success);
        let output = Shell.run("exit 7").unwrap();
        assert_eq!(output.code, Some(7));
    }
}
