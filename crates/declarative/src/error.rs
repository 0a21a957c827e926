//! Graph construction errors
//!
//! All of these are raised before any resource is applied.

use crate::graph::EdgeKind;
use crate::types::ResourceId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The same identity was declared twice with different attributes
    #[error("contradictory declarations of {id}: [{existing}] vs [{declared}]")]
    ContradictoryDeclaration {
        id: ResourceId,
        existing: String,
        declared: String,
    },

    /// An edge names a resource that was never declared
    #[error("{edge} edge references undeclared resource {id}")]
    UnknownResource { id: ResourceId, edge: EdgeKind },

    /// Adding a require edge would close a cycle
    #[error("cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<ResourceId> },
}

fn format_cycle(cycle: &[ResourceId]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
