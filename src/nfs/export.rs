//! Per-export values, derived once from configuration

use std::path::{Path, PathBuf};

use super::BuildError;
use crate::config::ExportConfig;

/// Name under the export root for a source: its last path segment
///
/// Trailing slashes are ignored. A source with no last segment (`/`,
/// `/data/..`) is an error and needs an explicit name.
pub fn derive_export_name(source: &Path) -> Result<String, BuildError> {
    source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| BuildError::InvalidExport {
            export: source.display().to_string(),
            reason: "cannot derive an export name; set v4_export_name".to_string(),
        })
}

/// One declared export, fully resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSpec {
    /// Exported directory or device
    pub source: PathBuf,
    /// Name under the export root
    pub name: String,
    /// Client ACL string
    pub clients: String,
    /// `<export-root>/<name>`
    pub mount_point: PathBuf,
}

impl ExportSpec {
    pub fn new(
        source: impl Into<PathBuf>,
        name: Option<&str>,
        clients: &str,
        export_root: &Path,
    ) -> Result<Self, BuildError> {
        let source = source.into();
        let name = match name {
            Some(name) => name.to_string(),
            None => derive_export_name(&source)?,
        };
        let mount_point = export_root.join(&name);
        Ok(Self {
            source,
            name,
            clients: clients.trim().to_string(),
            mount_point,
        })
    }

    pub fn from_config(export: &ExportConfig, export_root: &Path) -> Result<Self, BuildError> {
        Self::new(
            export.source_path(),
            export.v4_export_name.as_deref(),
            &export.clients,
            export_root,
        )
    }

    /// This export's line in `/etc/exports`
    pub fn exports_line(&self) -> String {
        format!("{} {}\n", self.mount_point.display(), self.clients)
    }
}
