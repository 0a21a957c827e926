//! Resource kinds managed on an NFS server host
//!
//! Every managed thing is modeled as a Resource with:
//! - State detection (current vs desired)
//! - Apply function (converge current → desired)
//! - Refresh (the reaction to a notification from a changed resource)
//!
//! Resources reach the host only through the traits in [`crate::host`].

pub mod aggregate;
pub mod config_edit;
pub mod directory;
pub mod exec;
pub mod fragment;
pub mod mount;
pub mod package;
pub mod service;

pub use aggregate::AggregateFile;
pub use config_edit::{ConfigEdit, Setting};
pub use directory::Directory;
pub use exec::ExecGuarded;
pub use fragment::TextFragment;
pub use mount::Mount;
pub use package::Package;
pub use service::Service;

// Re-export the core types resources are written against
pub use declarative::{
    ApplyContext, ApplyResult, Attributes, Resource, ResourceId, ResourceState,
};

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Read a file, treating a missing file as `None`
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Replace a file's content atomically, creating parent directories
///
/// The content is written to a sibling temp file and renamed over the
/// target, so readers never observe a partial file.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("No parent directory for {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

    let file_name = path
        .file_name()
        .with_context(|| format!("No file name in {}", path.display()))?;
    let tmp = parent.join(format!(".{}.nfsconv-tmp", file_name.to_string_lossy()));

    let mut file = fs::File::create(&tmp)
        .with_context(|| format!("Failed to create {}", tmp.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync {}", tmp.display()))?;
    drop(file);

    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Short content digest used in state details
pub(crate) fn digest(content: &str) -> String {
    let hash = blake3::hash(content.as_bytes()).to_hex();
    hash[..12].to_string()
}
