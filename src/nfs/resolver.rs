//! Variant resolution - from (OS family, configuration) to a resource graph
//!
//! Resolution is a small state machine:
//!
//! ```text
//! Unresolved → PackagesSelected → IdmapSubgraphBuilt → ExportsExpanded → Ready
//! ```
//!
//! Each step adds one slice of the graph. Any step can fail with a
//! [`BuildError`]; nothing is applied until the whole graph exists.

use declarative::{DependencyGraph, ResourceId};
use std::fmt;
use std::path::{Path, PathBuf};

use super::{BuildError, EXPORTS_PATH, ExportFragmentAssembler, ExportSpec};
use crate::config::NfsConfig;
use crate::facts::OsFamily;
use crate::host::Host;
use crate::resource::{
    AggregateFile, ConfigEdit, Directory, ExecGuarded, Mount, Package, Service, Setting,
    TextFragment,
};
use crate::runner::shell_quote;

/// idmapd's own configuration
pub const IDMAPD_CONF: &str = "/etc/idmapd.conf";

/// Debian defaults file that gates idmapd startup
pub const NFS_COMMON_DEFAULTS: &str = "/etc/default/nfs-common";

/// Name of the exec resource creating the NFSv4 export root
pub const EXPORT_ROOT_EXEC: &str = "nfs-v4-export-root";

/// Packages and service names for one OS family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    pub family: OsFamily,
    pub packages: Vec<&'static str>,
    pub nfs_service: &'static str,
    pub idmapd_service: &'static str,
    /// `(file, variable)` that must be `yes` for idmapd to start
    pub idmapd_switch: Option<(&'static str, &'static str)>,
}

impl PlatformProfile {
    pub fn for_family(family: &OsFamily) -> Result<Self, BuildError> {
        match family {
            OsFamily::Debian | OsFamily::Ubuntu => Ok(Self {
                family: family.clone(),
                packages: vec!["nfs-kernel-server", "nfs-common"],
                nfs_service: "nfs-kernel-server",
                idmapd_service: "idmapd",
                idmapd_switch: Some((NFS_COMMON_DEFAULTS, "NEED_IDMAPD")),
            }),
            OsFamily::RedHat | OsFamily::CentOs | OsFamily::Sles => Ok(Self {
                family: family.clone(),
                packages: vec!["nfs-utils", "nfs4-acl-tools"],
                nfs_service: "nfs",
                idmapd_service: "rpcidmapd",
                idmapd_switch: None,
            }),
            OsFamily::Other(name) => Err(BuildError::UnsupportedPlatform {
                family: name.clone(),
            }),
        }
    }
}

/// Which idmapd sub-graph was built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdmapVariant {
    /// NFSv4: idmapd running, domain configured, export root present
    Enabled,
    /// idmapd stopped
    Disabled,
}

impl fmt::Display for IdmapVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.write_str("enabled"),
            Self::Disabled => f.write_str("disabled"),
        }
    }
}

/// Resources every later stage wires against
#[derive(Debug, Clone)]
struct Selected {
    profile: PlatformProfile,
    packages: Vec<ResourceId>,
    nfs_service: ResourceId,
}

#[derive(Debug)]
enum Stage {
    Unresolved,
    PackagesSelected(Selected),
    IdmapSubgraphBuilt {
        selected: Selected,
        idmap: IdmapVariant,
        export_root: Option<ResourceId>,
    },
    ExportsExpanded {
        selected: Selected,
        idmap: IdmapVariant,
        exports: Vec<ExportSpec>,
        fragments: Vec<ResourceId>,
    },
    Ready {
        selected: Selected,
        idmap: IdmapVariant,
        exports: Vec<ExportSpec>,
    },
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::PackagesSelected(_) => "packages selected",
            Self::IdmapSubgraphBuilt { .. } => "idmap sub-graph built",
            Self::ExportsExpanded { .. } => "exports expanded",
            Self::Ready { .. } => "ready",
        }
    }
}

/// The finished graph and what it was built from
#[derive(Debug)]
pub struct ResolvedGraph {
    pub graph: DependencyGraph,
    pub profile: PlatformProfile,
    pub idmap: IdmapVariant,
    pub exports: Vec<ExportSpec>,
    /// Exports fragment names, in `/etc/exports` order
    pub fragments: Vec<String>,
    /// Rendered `/etc/exports`
    pub exports_content: String,
}

impl ResolvedGraph {
    pub fn exports_path(&self) -> &Path {
        Path::new(EXPORTS_PATH)
    }
}

/// Builds the NFS server graph step by step
pub struct VariantResolver<'a> {
    family: OsFamily,
    config: &'a NfsConfig,
    host: &'a Host,
    stage: Stage,
    graph: DependencyGraph,
    assembler: ExportFragmentAssembler,
}

impl<'a> VariantResolver<'a> {
    pub fn new(family: OsFamily, config: &'a NfsConfig, host: &'a Host) -> Self {
        Self {
            family,
            config,
            host,
            stage: Stage::Unresolved,
            graph: DependencyGraph::new(),
            assembler: ExportFragmentAssembler::new(),
        }
    }

    /// Name of the current stage
    pub fn stage(&self) -> &'static str {
        self.stage.name()
    }

    /// Advance one stage
    pub fn step(&mut self) -> Result<(), BuildError> {
        let stage = std::mem::replace(&mut self.stage, Stage::Unresolved);
        self.stage = match stage {
            Stage::Unresolved => Stage::PackagesSelected(self.select_packages()?),
            Stage::PackagesSelected(selected) => {
                let (idmap, export_root) = self.build_idmap(&selected)?;
                Stage::IdmapSubgraphBuilt {
                    selected,
                    idmap,
                    export_root,
                }
            }
            Stage::IdmapSubgraphBuilt {
                selected,
                idmap,
                export_root,
            } => {
                let (exports, fragments) = self.expand_exports(idmap, export_root.as_ref())?;
                Stage::ExportsExpanded {
                    selected,
                    idmap,
                    exports,
                    fragments,
                }
            }
            Stage::ExportsExpanded {
                selected,
                idmap,
                exports,
                fragments,
            } => {
                self.assemble_exports(&selected, &fragments)?;
                Stage::Ready {
                    selected,
                    idmap,
                    exports,
                }
            }
            ready @ Stage::Ready { .. } => ready,
        };
        log::debug!("Resolver stage: {}", self.stage());
        Ok(())
    }

    /// Run every remaining stage
    pub fn resolve(mut self) -> Result<ResolvedGraph, BuildError> {
        loop {
            match std::mem::replace(&mut self.stage, Stage::Unresolved) {
                Stage::Ready {
                    selected,
                    idmap,
                    exports,
                } => {
                    return Ok(ResolvedGraph {
                        graph: self.graph,
                        profile: selected.profile,
                        idmap,
                        exports,
                        fragments: self.assembler.names().map(str::to_string).collect(),
                        exports_content: self.assembler.render(),
                    });
                }
                stage => {
                    self.stage = stage;
                    self.step()?;
                }
            }
        }
    }

    /// Packages for the OS family, and the NFS service that needs them
    fn select_packages(&mut self) -> Result<Selected, BuildError> {
        let profile = PlatformProfile::for_family(&self.family)?;

        let packages = profile
            .packages
            .iter()
            .map(|name| {
                self.graph
                    .add(Package::new(name, self.host.packages.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let nfs_service = self.graph.add(Service::running(
            profile.nfs_service,
            self.host.services.clone(),
        ))?;
        for package in &packages {
            self.graph.require(package, &nfs_service)?;
        }

        Ok(Selected {
            profile,
            packages,
            nfs_service,
        })
    }

    /// idmapd service and, for NFSv4, its configuration and the export root
    fn build_idmap(
        &mut self,
        selected: &Selected,
    ) -> Result<(IdmapVariant, Option<ResourceId>), BuildError> {
        let profile = &selected.profile;

        if !self.config.nfs_v4 {
            let idmapd = self.graph.add(Service::stopped(
                profile.idmapd_service,
                self.host.services.clone(),
            ))?;
            for package in &selected.packages {
                self.graph.require(package, &idmapd)?;
            }
            return Ok((IdmapVariant::Disabled, None));
        }

        let idmapd = self.graph.add(Service::running(
            profile.idmapd_service,
            self.host.services.clone(),
        ))?;
        for package in &selected.packages {
            self.graph.require(package, &idmapd)?;
        }

        let mut edits = Vec::new();
        if let Some((path, variable)) = profile.idmapd_switch {
            edits.push(ConfigEdit::new(
                path,
                Setting::shell_var(variable, "yes"),
                self.host,
            ));
        }
        edits.push(ConfigEdit::new(
            IDMAPD_CONF,
            Setting::ini("General", "Domain", self.config.nfs_v4_idmap_domain.trim()),
            self.host,
        ));

        for edit in edits {
            let edit = self.graph.add(edit)?;
            for package in &selected.packages {
                self.graph.require(package, &edit)?;
            }
            for service in [&selected.nfs_service, &idmapd] {
                self.graph.require(&edit, service)?;
                self.graph.notify(&edit, service)?;
            }
        }

        let root = self.host.resolve(&self.config.export_root());
        let root = shell_quote(&root.to_string_lossy());
        let export_root = self.graph.add(ExecGuarded::new(
            EXPORT_ROOT_EXEC,
            format!("mkdir -p {root}"),
            format!("test -d {root}"),
            self.host.commands.clone(),
        ))?;

        Ok((IdmapVariant::Enabled, Some(export_root)))
    }

    /// Directory, bind mount and exports fragment for every export
    fn expand_exports(
        &mut self,
        idmap: IdmapVariant,
        export_root: Option<&ResourceId>,
    ) -> Result<(Vec<ExportSpec>, Vec<ResourceId>), BuildError> {
        let (IdmapVariant::Enabled, Some(export_root)) = (idmap, export_root) else {
            if self.config.exports.is_empty() {
                return Ok((Vec::new(), Vec::new()));
            }
            return Err(BuildError::NotImplemented {
                feature: "v3 export path",
            });
        };

        let root = self.config.export_root();
        let mut exports = Vec::new();
        let mut fragments = Vec::new();

        for export in &self.config.exports {
            let spec = ExportSpec::from_config(export, &root)?;

            let directory = self.graph.add(Directory::new(&spec.mount_point, self.host))?;
            self.graph.require(export_root, &directory)?;

            let mount = self.graph.add(Mount::bind(
                spec.source.display().to_string(),
                spec.mount_point.clone(),
                self.host.mounts.clone(),
            ))?;
            self.graph.require(&directory, &mount)?;

            let line = spec.exports_line();
            self.assembler.add_fragment(&spec.name, &line)?;
            let fragment = self
                .graph
                .add(TextFragment::new(&spec.name, EXPORTS_PATH, line))?;
            self.graph.require(&mount, &fragment)?;

            log::debug!(
                "Export {} -> {} ({})",
                spec.source.display(),
                spec.mount_point.display(),
                spec.clients
            );
            exports.push(spec);
            fragments.push(fragment);
        }

        Ok((exports, fragments))
    }

    /// `/etc/exports`, after every fragment, notifying the NFS service
    fn assemble_exports(
        &mut self,
        selected: &Selected,
        fragments: &[ResourceId],
    ) -> Result<(), BuildError> {
        let exports = self.graph.add(AggregateFile::new(
            PathBuf::from(EXPORTS_PATH),
            self.assembler.render(),
            self.host,
        ))?;

        for fragment in fragments {
            self.graph.require(fragment, &exports)?;
        }
        for package in &selected.packages {
            self.graph.require(package, &exports)?;
        }
        self.graph.require(&exports, &selected.nfs_service)?;
        self.graph.notify(&exports, &selected.nfs_service)?;
        Ok(())
    }
}

/// Build the NFS server graph for a host
pub fn resolve(
    family: &OsFamily,
    config: &NfsConfig,
    host: &Host,
) -> Result<ResolvedGraph, BuildError> {
    VariantResolver::new(family.clone(), config, host).resolve()
}
