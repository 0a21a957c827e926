//! Host facts - operating system family detection from `/etc/os-release`

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::paths;

/// Operating system family of the managed host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Debian,
    Ubuntu,
    RedHat,
    CentOs,
    Sles,
    /// Anything else, kept verbatim for error reporting
    Other(String),
}

impl OsFamily {
    /// Parse an os-release style identifier (`ubuntu`, `rhel`, `centos`, ...)
    pub fn from_id(id: &str) -> Self {
        match id.trim().to_ascii_lowercase().as_str() {
            "debian" => Self::Debian,
            "ubuntu" => Self::Ubuntu,
            "redhat" | "rhel" => Self::RedHat,
            "centos" => Self::CentOs,
            "sles" | "suse" | "opensuse" | "opensuse-leap" => Self::Sles,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Debian => "debian",
            Self::Ubuntu => "ubuntu",
            Self::RedHat => "redhat",
            Self::CentOs => "centos",
            Self::Sles => "sles",
            Self::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the OS family from `<root>/etc/os-release`
///
/// `ID` is tried first, then each entry of `ID_LIKE`. When nothing is
/// recognized the raw `ID` is returned as [`OsFamily::Other`].
pub fn detect(root: &Path) -> Result<OsFamily> {
    let path = paths::resolve_under(root, Path::new("/etc/os-release"));
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let family = parse_os_release(&content);
    log::debug!("Detected OS family {family} from {}", path.display());
    Ok(family)
}

/// Pick the OS family out of os-release content
pub fn parse_os_release(content: &str) -> OsFamily {
    let value = |key: &str| -> Option<String> {
        content.lines().find_map(|line| {
            let (k, v) = line.trim().split_once('=')?;
            (k == key).then(|| v.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        })
    };

    let id = value("ID").unwrap_or_default();
    let family = OsFamily::from_id(&id);
    if family.is_known() {
        return family;
    }

    value("ID_LIKE")
        .into_iter()
        .flat_map(|like| {
            like.split_whitespace()
                .map(OsFamily::from_id)
                .collect::<Vec<_>>()
        })
        .find(OsFamily::is_known)
        .unwrap_or(family)
}
