//! NFS server configuration
//!
//! A single TOML document describes the desired server:
//!
//! ```toml
//! nfs_v4 = true
//! nfs_v4_export_root = "/export"
//! nfs_v4_idmap_domain = "example.com"
//!
//! [[exports]]
//! source = "/data"
//! clients = "10.0.0.0/24(rw)"
//! ```

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::nfs::derive_export_name;
use crate::paths;

/// Default directory NFSv4 exports are bind-mounted under
pub const DEFAULT_EXPORT_ROOT: &str = "/export";

/// Default NFSv4 idmap domain
pub const DEFAULT_IDMAP_DOMAIN: &str = "localdomain";

/// Default client ACL for an export
pub const DEFAULT_CLIENTS: &str = "localhost(ro)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NfsConfig {
    /// Serve NFSv4 (bind mounts under the export root, idmapd running)
    #[serde(default)]
    pub nfs_v4: bool,

    /// Pseudo-filesystem root for NFSv4 exports
    #[serde(default = "default_export_root")]
    pub nfs_v4_export_root: String,

    /// Domain idmapd maps users in
    #[serde(default = "default_idmap_domain")]
    pub nfs_v4_idmap_domain: String,

    /// Exported directories, in the order they appear in `/etc/exports`
    #[serde(default)]
    pub exports: Vec<ExportConfig>,
}

impl Default for NfsConfig {
    fn default() -> Self {
        Self {
            nfs_v4: false,
            nfs_v4_export_root: default_export_root(),
            nfs_v4_idmap_domain: default_idmap_domain(),
            exports: Vec::new(),
        }
    }
}

impl NfsConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!(
            "Loaded {} exports from {} (nfs_v4 = {})",
            config.exports.len(),
            path.display(),
            config.nfs_v4
        );
        Ok(config)
    }

    /// Parse and validate TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format")?;
        config.validate()?;
        Ok(config)
    }

    /// Expanded export root path
    pub fn export_root(&self) -> PathBuf {
        paths::expand(&self.nfs_v4_export_root)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.export_root().is_absolute() {
            bail!(
                "nfs_v4_export_root must be an absolute path, got '{}'",
                self.nfs_v4_export_root
            );
        }

        let domain = self.nfs_v4_idmap_domain.trim();
        if domain.is_empty() || domain.contains(char::is_whitespace) {
            bail!(
                "nfs_v4_idmap_domain must be a single word, got '{}'",
                self.nfs_v4_idmap_domain
            );
        }

        let mut names = BTreeSet::new();
        for export in &self.exports {
            export
                .validate()
                .with_context(|| format!("Invalid export '{}'", export.source))?;

            let name = export.export_name()?;
            if !names.insert(name.clone()) {
                bail!(
                    "Duplicate export name '{name}' (from '{}'); set v4_export_name to disambiguate",
                    export.source
                );
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    /// Directory (or device path) to export
    pub source: String,

    /// Name under the NFSv4 export root; defaults to the last path segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v4_export_name: Option<String>,

    /// Client ACL string, e.g. `10.0.0.0/24(rw,no_root_squash)`
    #[serde(default = "default_clients")]
    pub clients: String,
}

impl ExportConfig {
    /// Expanded source path
    pub fn source_path(&self) -> PathBuf {
        paths::expand(&self.source)
    }

    /// Name under the export root, explicit or derived from the source
    pub fn export_name(&self) -> Result<String> {
        match &self.v4_export_name {
            Some(name) => Ok(name.clone()),
            None => Ok(derive_export_name(&self.source_path())?),
        }
    }

    /// Validate the export
    pub fn validate(&self) -> Result<()> {
        if !self.source_path().is_absolute() {
            bail!("source must be an absolute path");
        }
        if self.source.contains(char::is_whitespace) {
            bail!("source cannot contain whitespace");
        }
        if self.clients.trim().is_empty() {
            bail!("clients cannot be empty");
        }
        if let Some(client) = self
            .clients
            .split_whitespace()
            .find(|client| !client_re().is_match(client))
        {
            bail!(
                "client '{client}' is not of the form host(options); \
                 a space before '(' applies the options to every host"
            );
        }
        if let Some(name) = &self.v4_export_name
            && (name.is_empty()
                || name.contains('/')
                || name.contains(char::is_whitespace)
                || name == "."
                || name == "..")
        {
            bail!("v4_export_name must be a single path segment, got '{name}'");
        }
        Ok(())
    }
}

/// One client entry: a host pattern with an optional option list
fn client_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^\s()]+(\([^\s()]*\))?$").expect("client regex must compile")
    })
}

fn default_export_root() -> String {
    DEFAULT_EXPORT_ROOT.to_string()
}

fn default_idmap_domain() -> String {
    DEFAULT_IDMAP_DOMAIN.to_string()
}

fn default_clients() -> String {
    DEFAULT_CLIENTS.to_string()
}
