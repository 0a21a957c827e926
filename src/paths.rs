//! Centralized path resolution for nfsconv
//!
//! # Environment Variables
//!
//! - `NFSCONV_CONFIG` - Override the configuration file path
//!
//! # Config File Resolution Priority
//!
//! 1. `--config` command-line flag
//! 2. `NFSCONV_CONFIG` environment variable
//! 3. `/etc/nfsconv/config.toml`
//! 4. User config dir (`~/.config/nfsconv/config.toml` on Linux)

use anyhow::{Result, bail};
use std::path::{Component, Path, PathBuf};

/// Environment variable for config file override
pub const ENV_CONFIG: &str = "NFSCONV_CONFIG";

/// System-wide config file location
pub const SYSTEM_CONFIG: &str = "/etc/nfsconv/config.toml";

/// Locate the configuration file
///
/// An explicit path (flag or environment) is returned even when it does
/// not exist, so the caller reports the path the user asked for.
pub fn config_file(explicit: Option<&str>) -> Result<PathBuf> {
    let from_env = std::env::var(ENV_CONFIG).ok();
    let candidates = default_candidates();
    locate(explicit, from_env.as_deref(), &candidates)
}

fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(SYSTEM_CONFIG)];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("nfsconv").join("config.toml"));
    }
    candidates
}

fn locate(explicit: Option<&str>, from_env: Option<&str>, candidates: &[PathBuf]) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let path = expand(path);
        log::debug!("Using config from --config: {}", path.display());
        return Ok(path);
    }

    if let Some(path) = from_env.filter(|p| !p.is_empty()) {
        let path = expand(path);
        log::debug!("Using config from {}: {}", ENV_CONFIG, path.display());
        return Ok(path);
    }

    for candidate in candidates {
        if candidate.is_file() {
            log::debug!("Using config: {}", candidate.display());
            return Ok(candidate.clone());
        }
    }

    let searched = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    bail!("No configuration file found (searched: {searched}); pass --config or set {ENV_CONFIG}")
}

/// Expand ~ and environment variables in a path string.
///
/// This is the canonical path expansion function for nfsconv. All modules
/// should use this instead of calling shellexpand directly.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Resolve an absolute host path under a filesystem root
///
/// `resolve_under("/srv/stage", "/etc/exports")` is `/srv/stage/etc/exports`.
/// With the root `/` the path is returned unchanged.
pub fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    let relative: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    root.join(relative)
}

// ============================================================================
// Tests
// ============================================================================
