//! Core types for declarative resource management

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Category of a manageable unit
///
/// Together with a name this forms the identity of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Package,
    Service,
    File,
    Mount,
    ExecGuarded,
    TextFragment,
    AggregateFile,
    ConfigEdit,
}

impl ResourceKind {
    /// Stable lowercase name, used in ids and target filters
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::Service => "service",
            Self::File => "file",
            Self::Mount => "mount",
            Self::ExecGuarded => "exec",
            Self::TextFragment => "fragment",
            Self::AggregateFile => "aggregate",
            Self::ConfigEdit => "config",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a resource within a convergence run
///
/// `(kind, name)` must be unique in a graph. Displayed as `kind:name`,
/// e.g. `package:nfs-common` or `mount:/export/data`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceId {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn package(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Package, name)
    }

    pub fn service(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Service, name)
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::File, name)
    }

    pub fn mount(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Mount, name)
    }

    pub fn exec(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::ExecGuarded, name)
    }

    pub fn fragment(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::TextFragment, name)
    }

    pub fn aggregate(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::AggregateFile, name)
    }

    pub fn config(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::ConfigEdit, name)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Desired attributes of a resource, compared by value when the same
/// identity is declared twice
pub type Attributes = BTreeMap<&'static str, String>;

/// Render attributes as `key=value` pairs for error messages
pub fn format_attributes(attributes: &Attributes) -> String {
    attributes
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    /// Resource exists/is configured
    Present { details: Option<String> },
    /// Resource does not exist/is not configured
    Absent,
    /// Resource exists but differs from desired
    Modified { from: String, to: String },
    /// State cannot be determined
    Unknown,
}

impl ResourceState {
    /// Shorthand for `Present` with details
    pub fn present(details: impl Into<String>) -> Self {
        Self::Present {
            details: Some(details.into()),
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present { details: None } => f.write_str("present"),
            Self::Present { details: Some(d) } => write!(f, "present ({d})"),
            Self::Absent => f.write_str("absent"),
            Self::Modified { from, to } => write!(f, "{from} -> {to}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Result of applying a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ApplyResult {
    /// Already converged, nothing done
    Unchanged,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped (dry run)
    Skipped { reason: String },
    /// Never applied because a required resource failed
    DependencyFailed { dependency: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. } | Self::DependencyFailed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Removed)
    }

    /// Short label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
            Self::DependencyFailed { .. } => "dependency failed",
        }
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub dependency_failed: usize,
    pub no_change: usize,
    /// Notification-triggered refreshes that ran
    pub refreshed: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    /// A run succeeds only when nothing failed and nothing was skipped
    /// because of a failed dependency
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.dependency_failed == 0
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.created
            + self.modified
            + self.removed
            + self.skipped
            + self.failed
            + self.dependency_failed
            + self.no_change
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::Unchanged => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
            ApplyResult::DependencyFailed { .. } => self.dependency_failed += 1,
        }
    }

    /// Account for a refresh triggered by a notification
    ///
    /// Refreshes are not resources of their own, so only the refresh count
    /// and failures are recorded.
    pub fn add_refresh(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } | ApplyResult::Unchanged => {}
            _ => self.refreshed += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of parallel jobs within one dependency level
    pub jobs: usize,
    /// Verbose output
    pub verbose: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            verbose: false,
        }
    }
}
