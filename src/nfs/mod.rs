//! NFS server desired state
//!
//! Turns an [`NfsConfig`](crate::config::NfsConfig) plus the host's OS
//! family into a dependency graph of resources:
//!
//! - [`resolver`] selects packages and services for the platform, builds the
//!   idmapd sub-graph for the NFSv4 setting, and expands each export
//! - [`assembler`] renders `/etc/exports` from per-export fragments
//! - [`export`] holds the per-export values derived once from configuration

pub mod assembler;
pub mod error;
pub mod export;
pub mod resolver;

pub use assembler::{EXPORTS_PATH, ExportFragmentAssembler};
pub use error::BuildError;
pub use export::{ExportSpec, derive_export_name};
pub use resolver::{ResolvedGraph, resolve};
