//! Apply context and progress reporting
//!
//! These traits allow the declarative crate to be used without
//! depending on a specific UI.

use crate::types::{ApplyResult, ResourceId};

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during convergence.
pub trait ProgressCallback: Send {
    /// Called when starting a dependency level
    fn on_batch_start(&mut self, count: usize, parallel: bool);

    /// Called when starting to apply a single resource
    ///
    /// Not called for resources applied in parallel.
    fn on_resource_start(&mut self, id: &ResourceId, description: &str);

    /// Called when a resource application completes
    fn on_resource_complete(&mut self, id: &ResourceId, result: &ApplyResult);

    /// Called when a dependency level completes
    fn on_batch_complete(&mut self);

    /// Called after a notified resource was refreshed
    fn on_refresh(&mut self, _id: &ResourceId, _result: &ApplyResult) {}
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize, _parallel: bool) {}
    fn on_resource_start(&mut self, _id: &ResourceId, _description: &str) {}
    fn on_resource_complete(&mut self, _id: &ResourceId, _result: &ApplyResult) {}
    fn on_batch_complete(&mut self) {}
}

/// Context passed to resource apply operations
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyContext {
    /// Whether this is a dry run (no actual changes)
    pub dry_run: bool,
    /// Whether to output verbose information
    pub verbose: bool,
}

impl ApplyContext {
    /// Create a new apply context
    pub fn new(dry_run: bool, verbose: bool) -> Self {
        Self { dry_run, verbose }
    }
}
