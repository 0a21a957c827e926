//! Diff computation for resources

use crate::graph::DependencyGraph;
use crate::resource::Resource;
use crate::types::{ResourceId, ResourceKind, ResourceState};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A diff between current and desired state of a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Identity of the resource
    pub resource_id: ResourceId,
    /// Human-readable description
    pub description: String,
    /// Current state
    pub current: ResourceState,
    /// Desired state
    pub desired: ResourceState,
}

impl ResourceDiff {
    /// Create a diff from a resource, returning None if no changes needed
    pub fn from_resource(resource: &dyn Resource) -> Result<Option<Self>> {
        let current = resource.current_state()?;
        let desired = resource.desired_state();

        if current == desired {
            return Ok(None);
        }

        Ok(Some(Self {
            resource_id: resource.id(),
            description: resource.description(),
            current,
            desired,
        }))
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Present { .. }, ResourceState::Absent)
        )
    }
}

/// Compute diffs for every resource in a graph, in convergence order
///
/// Returns only resources that differ. A resource whose current state
/// cannot be read is reported with `ResourceState::Unknown`.
pub fn compute_diffs(graph: &DependencyGraph) -> Vec<ResourceDiff> {
    graph
        .topological_order()
        .into_iter()
        .map(|i| graph.resource(i))
        .filter_map(|r| match ResourceDiff::from_resource(r) {
            Ok(diff) => diff,
            Err(e) => {
                log::warn!("Could not read state of {}: {e:#}", r.id());
                Some(ResourceDiff {
                    resource_id: r.id(),
                    description: r.description(),
                    current: ResourceState::Unknown,
                    desired: r.desired_state(),
                })
            }
        })
        .collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of resources to add
    pub additions: usize,
    /// Number of resources to remove
    pub removals: usize,
    /// Number of resources to modify
    pub modifications: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_removal() {
                summary.removals += 1;
            } else {
                summary.modifications += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource kind
pub fn group_by_kind(diffs: &[ResourceDiff]) -> BTreeMap<ResourceKind, Vec<&ResourceDiff>> {
    let mut groups: BTreeMap<ResourceKind, Vec<&ResourceDiff>> = BTreeMap::new();
    for diff in diffs {
        groups.entry(diff.resource_id.kind).or_default().push(diff);
    }
    groups
}
