//! Config edit resource - set one value in a structured config file
//!
//! Two file shapes are understood: shell variable files
//! (`/etc/default/nfs-common`) and INI files (`/etc/idmapd.conf`). The
//! rest of the file is left as it was, comments included.

use anyhow::Result;
use std::fmt;
use std::path::PathBuf;

use super::{
    ApplyContext, ApplyResult, Attributes, Resource, ResourceId, ResourceState, read_optional,
    write_atomic,
};
use crate::host::Host;

/// A single setting inside a config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    /// `KEY=value`
    ShellVar { key: String, value: String },
    /// `key = value` under `[section]`
    Ini {
        section: String,
        key: String,
        value: String,
    },
}

impl Setting {
    pub fn shell_var(key: &str, value: &str) -> Self {
        Self::ShellVar {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn ini(section: &str, key: &str, value: &str) -> Self {
        Self::Ini {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// Where the setting lives, e.g. `General/Domain`
    pub fn key_path(&self) -> String {
        match self {
            Self::ShellVar { key, .. } => key.clone(),
            Self::Ini { section, key, .. } => format!("{section}/{key}"),
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::ShellVar { value, .. } | Self::Ini { value, .. } => value,
        }
    }

    /// Read the setting's current value out of file content
    pub fn read(&self, content: &str) -> Option<String> {
        match self {
            Self::ShellVar { key, .. } => read_shell_var(content, key),
            Self::Ini { section, key, .. } => read_ini(content, section, key),
        }
    }

    /// Return `content` with the setting applied
    pub fn write(&self, content: &str) -> String {
        match self {
            Self::ShellVar { key, value } => write_shell_var(content, key, value),
            Self::Ini {
                section,
                key,
                value,
            } => write_ini(content, section, key, value),
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key_path(), self.value())
    }
}

// ============================================================================
// Shell variable files
// ============================================================================

fn is_comment(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with('#') || line.starts_with(';')
}

fn shell_assignment<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    if is_comment(line) {
        return None;
    }
    let line = line.trim();
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (k, v) = line.split_once('=')?;
    (k.trim() == key).then_some(v)
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    value.to_string()
}

fn read_shell_var(content: &str, key: &str) -> Option<String> {
    // Later assignments win, as when the file is sourced
    content
        .lines()
        .rev()
        .find_map(|line| shell_assignment(line, key))
        .map(unquote)
}

fn write_shell_var(content: &str, key: &str, value: &str) -> String {
    let replacement = format!("{key}={value}");
    let mut found = false;
    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if shell_assignment(line, key).is_some() {
                found = true;
                replacement.clone()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !found {
        lines.push(replacement);
    }
    join_lines(&lines)
}

// ============================================================================
// INI files
// ============================================================================

fn section_header(line: &str) -> Option<&str> {
    let line = line.trim();
    line.strip_prefix('[')?.strip_suffix(']').map(str::trim)
}

fn ini_assignment<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    if is_comment(line) {
        return None;
    }
    let (k, v) = line.split_once('=')?;
    k.trim().eq_ignore_ascii_case(key).then_some(v)
}

fn read_ini(content: &str, section: &str, key: &str) -> Option<String> {
    let mut current: Option<&str> = None;
    let mut found = None;
    for line in content.lines() {
        if let Some(name) = section_header(line) {
            current = Some(name);
        } else if current.is_some_and(|s| s.eq_ignore_ascii_case(section))
            && let Some(value) = ini_assignment(line, key)
        {
            found = Some(value.trim().to_string());
        }
    }
    found
}

fn write_ini(content: &str, section: &str, key: &str, value: &str) -> String {
    let replacement = format!("{key} = {value}");
    let mut lines: Vec<String> = Vec::new();
    let mut in_section = false;
    let mut section_seen = false;
    let mut written = false;
    // Index just past the last non-blank line of the wanted section
    let mut insert_at: Option<usize> = None;

    for line in content.lines() {
        if let Some(name) = section_header(line) {
            in_section = name.eq_ignore_ascii_case(section);
            if in_section {
                section_seen = true;
                insert_at = Some(lines.len() + 1);
            }
            lines.push(line.to_string());
            continue;
        }

        if in_section && ini_assignment(line, key).is_some() {
            if !written {
                lines.push(replacement.clone());
                written = true;
            }
            insert_at = Some(lines.len());
            continue;
        }

        lines.push(line.to_string());
        if in_section && !line.trim().is_empty() {
            insert_at = Some(lines.len());
        }
    }

    if !written {
        match (section_seen, insert_at) {
            (true, Some(at)) => lines.insert(at, replacement),
            _ => {
                if lines.last().is_some_and(|l| !l.trim().is_empty()) {
                    lines.push(String::new());
                }
                lines.push(format!("[{section}]"));
                lines.push(replacement);
            }
        }
    }
    join_lines(&lines)
}

fn join_lines(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

// ============================================================================
// Resource
// ============================================================================

/// One setting enforced in one config file
#[derive(Debug, Clone)]
pub struct ConfigEdit {
    pub path: PathBuf,
    pub setting: Setting,
    resolved: PathBuf,
}

impl ConfigEdit {
    pub fn new(path: impl Into<PathBuf>, setting: Setting, host: &Host) -> Self {
        let path = path.into();
        let resolved = host.resolve(&path);
        Self {
            path,
            setting,
            resolved,
        }
    }
}

impl Resource for ConfigEdit {
    fn id(&self) -> ResourceId {
        ResourceId::config(format!(
            "{}:{}",
            self.path.display(),
            self.setting.key_path()
        ))
    }

    fn description(&self) -> String {
        format!("Set {} in {}", self.setting, self.path.display())
    }

    fn attributes(&self) -> Attributes {
        Attributes::from([("value", self.setting.value().to_string())])
    }

    fn current_state(&self) -> Result<ResourceState> {
        let content = read_optional(&self.resolved)?.unwrap_or_default();
        match self.setting.read(&content) {
            None => Ok(ResourceState::Absent),
            Some(value) if value == self.setting.value() => {
                Ok(ResourceState::present(self.setting.to_string()))
            }
            Some(value) => Ok(ResourceState::Modified {
                from: format!("{}={value}", self.setting.key_path()),
                to: self.setting.to_string(),
            }),
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present(self.setting.to_string())
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let content = read_optional(&self.resolved)?;
        let current = content.as_deref().and_then(|c| self.setting.read(c));

        let result = match current {
            Some(value) if value == self.setting.value() => return Ok(ApplyResult::Unchanged),
            Some(_) => ApplyResult::Modified,
            None => ApplyResult::Created,
        };

        let updated = self.setting.write(content.as_deref().unwrap_or_default());
        log::info!("Setting {} in {}", self.setting, self.path.display());
        write_atomic(&self.resolved, &updated)?;
        Ok(result)
    }
}
