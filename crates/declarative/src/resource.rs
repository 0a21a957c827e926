//! Resource trait for declarative state management
//!
//! A Resource represents something that can be in a certain state,
//! and can be changed to reach a desired state.

use crate::context::ApplyContext;
use crate::types::{ApplyResult, Attributes, ResourceId, ResourceKind, ResourceState};
use anyhow::Result;
use std::fmt;

/// Core trait for declarative resources
///
/// Every resource in the system implements this trait, which provides:
/// - Identity (kind + name)
/// - Desired attributes, used to merge duplicate declarations
/// - State detection (current vs desired)
/// - State convergence (apply) and the reaction to notifications (refresh)
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyContext, ApplyResult, Attributes, Resource, ResourceId, ResourceState};
///
/// #[derive(Debug)]
/// struct Marker {
///     path: std::path::PathBuf,
/// }
///
/// impl Resource for Marker {
///     fn id(&self) -> ResourceId {
///         ResourceId::file(self.path.display().to_string())
///     }
///
///     fn description(&self) -> String {
///         format!("Ensure marker {}", self.path.display())
///     }
///
///     fn attributes(&self) -> Attributes {
///         Attributes::from([("ensure", "present".to_string())])
///     }
///
///     fn current_state(&self) -> anyhow::Result<ResourceState> {
///         if self.path.exists() {
///             Ok(ResourceState::Present { details: None })
///         } else {
///             Ok(ResourceState::Absent)
///         }
///     }
///
///     fn desired_state(&self) -> ResourceState {
///         ResourceState::Present { details: None }
///     }
///
///     fn apply(&self, _ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
///         if self.path.exists() {
///             return Ok(ApplyResult::Unchanged);
///         }
///         std::fs::write(&self.path, b"")?;
///         Ok(ApplyResult::Created)
///     }
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// Unique identity of this resource within a graph
    fn id(&self) -> ResourceId;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Resource kind, derived from the identity
    fn kind(&self) -> ResourceKind {
        self.id().kind
    }

    /// Desired attributes
    ///
    /// Two declarations of the same identity are merged only when their
    /// attributes are equal; otherwise graph construction fails.
    fn attributes(&self) -> Attributes;

    /// Detect the current state of this resource
    fn current_state(&self) -> Result<ResourceState>;

    /// Get the desired state for this resource
    fn desired_state(&self) -> ResourceState;

    /// Check if the resource needs changes to reach desired state
    ///
    /// Default implementation compares current and desired states.
    fn needs_apply(&self) -> Result<bool> {
        let current = self.current_state()?;
        let desired = self.desired_state();
        Ok(current != desired)
    }

    /// Apply changes to reach the desired state
    ///
    /// Must be idempotent: when already converged, return
    /// `ApplyResult::Unchanged` without touching the system.
    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult>;

    /// React to a notification from a resource that changed
    ///
    /// Called at most once per run, after every resource has been applied.
    /// Most kinds have nothing to refresh.
    fn refresh(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        Ok(ApplyResult::Unchanged)
    }

    /// Whether this resource can be applied in parallel with others
    /// at the same dependency level
    fn can_parallelize(&self) -> bool {
        true
    }
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;
