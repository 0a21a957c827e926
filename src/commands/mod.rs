//! Subcommand implementations
//!
//! Every command loads the configuration and resolves the graph the same
//! way, so a build error surfaces before anything on the host is touched.

pub mod apply;
pub mod inspect;
pub mod plan;

use anyhow::Result;

use crate::Context;
use crate::config::NfsConfig;
use crate::facts::{self, OsFamily};
use crate::host::Host;
use crate::nfs::{self, ResolvedGraph};
use crate::paths;

/// A resolved run: the host adapters and the graph built for them
pub struct Session {
    pub host: Host,
    pub resolved: ResolvedGraph,
}

impl Session {
    /// Load configuration, detect the platform, and build the graph
    pub fn load(ctx: &Context) -> Result<Self> {
        let path = paths::config_file(ctx.config.as_deref())?;
        let config = NfsConfig::load(&path)?;
        let family = os_family(ctx)?;
        let host = Host::system(&ctx.root, &family);
        Self::build(&family, &config, host)
    }

    pub fn build(family: &OsFamily, config: &NfsConfig, host: Host) -> Result<Self> {
        let resolved = nfs::resolve(family, config, &host)?;
        log::info!(
            "Resolved {} resources for {} ({} exports)",
            resolved.graph.len(),
            family,
            resolved.exports.len()
        );
        Ok(Self { host, resolved })
    }
}

fn os_family(ctx: &Context) -> Result<OsFamily> {
    match &ctx.os_family {
        Some(name) => Ok(OsFamily::from_id(name)),
        None => facts::detect(&ctx.root),
    }
}
