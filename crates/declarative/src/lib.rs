//! # Declarative
//!
//! A framework for declarative resource convergence.
//!
//! This crate provides the core abstractions for declaring desired state,
//! wiring resources into a dependency graph, and converging a system to
//! match the desired state idempotently.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (files, packages, services)
//! - **ResourceId**: The `(kind, name)` identity of a resource, unique per graph
//! - **DependencyGraph**: Resources plus require (ordering) and notify (refresh) edges
//! - **converge**: Applies a graph in require order, contains failures to the
//!   dependent subtree, and refreshes notified resources once per run
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{DependencyGraph, ExecuteOptions, converge_simple};
//!
//! let mut graph = DependencyGraph::new();
//! let config = graph.add(ConfigFile::new("/etc/app.conf", "port = 80\n"))?;
//! let service = graph.add(Service::running("app"))?;
//! graph.require(&config, &service)?;
//! graph.notify(&config, &service)?;
//!
//! let report = converge_simple(&graph, &ExecuteOptions::default())?;
//! assert!(report.is_success());
//! ```
//!
//! ## Provider Traits
//!
//! - [`ProgressCallback`]: Receives progress updates
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod graph;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{ApplyContext, NoProgress, ProgressCallback};
pub use diff::{DiffSummary, ResourceDiff, compute_diffs, group_by_kind};
pub use error::GraphError;
pub use executor::{ConvergeReport, DRY_RUN_REASON, ResourceReport, converge, converge_simple};
pub use graph::{DependencyGraph, Edge, EdgeKind};
pub use resource::{BoxedResource, Resource};
pub use types::{
    ApplyResult, Attributes, ExecuteOptions, ExecuteSummary, ResourceId, ResourceKind,
    ResourceState, format_attributes,
};
