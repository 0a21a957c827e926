//! Mount resource - ensure a filesystem is mounted, optionally at boot

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::sync::Arc;

use super::{ApplyContext, ApplyResult, Attributes, Resource, ResourceId, ResourceState};
use crate::host::{MountEntry, MountTable};

#[derive(Debug, Clone)]
pub struct Mount {
    pub entry: MountEntry,
    /// Persist in the boot-time mount table
    pub atboot: bool,
    table: Arc<dyn MountTable>,
}

impl Mount {
    pub fn new(entry: MountEntry, atboot: bool, table: Arc<dyn MountTable>) -> Self {
        Self {
            entry,
            atboot,
            table,
        }
    }

    /// Bind `source` onto `target`, persisted at boot
    pub fn bind(
        source: impl Into<String>,
        target: impl Into<PathBuf>,
        table: Arc<dyn MountTable>,
    ) -> Self {
        Self::new(MountEntry::bind(source, target), true, table)
    }

    fn mounted(&self) -> Result<Option<MountEntry>> {
        self.table
            .lookup(&self.entry.target)
            .with_context(|| format!("Failed to look up mount {}", self.entry.target.display()))
    }

    fn mounted_from_source(&self, live: &MountEntry) -> Result<bool> {
        self.table
            .is_mounted_from(live, &self.entry)
            .with_context(|| format!("Failed to inspect mount {}", self.entry.target.display()))
    }

    fn persisted(&self) -> Result<bool> {
        if !self.atboot {
            return Ok(true);
        }
        self.table
            .is_persisted(&self.entry)
            .context("Failed to read boot-time mount table")
    }

    fn wanted(&self) -> String {
        if self.atboot {
            format!("{} mounted, at boot", self.entry.device)
        } else {
            format!("{} mounted", self.entry.device)
        }
    }
}

impl Resource for Mount {
    fn id(&self) -> ResourceId {
        ResourceId::mount(self.entry.target.display().to_string())
    }

    fn description(&self) -> String {
        format!(
            "Mount {} on {} ({}, {})",
            self.entry.device,
            self.entry.target.display(),
            self.entry.fstype,
            self.entry.options
        )
    }

    fn attributes(&self) -> Attributes {
        Attributes::from([
            ("device", self.entry.device.clone()),
            ("fstype", self.entry.fstype.clone()),
            ("options", self.entry.options.clone()),
            ("ensure", "mounted".to_string()),
            ("atboot", self.atboot.to_string()),
        ])
    }

    fn current_state(&self) -> Result<ResourceState> {
        let Some(live) = self.mounted()? else {
            return Ok(ResourceState::Absent);
        };

        if !self.mounted_from_source(&live)? {
            return Ok(ResourceState::Modified {
                from: format!("{} mounted", live.device),
                to: self.wanted(),
            });
        }

        if !self.persisted()? {
            return Ok(ResourceState::Modified {
                from: format!("{} mounted", live.device),
                to: self.wanted(),
            });
        }

        Ok(ResourceState::present(self.wanted()))
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present(self.wanted())
    }

    fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let mut result = ApplyResult::Unchanged;

        match self.mounted()? {
            Some(live) if !self.mounted_from_source(&live)? => {
                bail!(
                    "{} is already mounted from {}, expected {}",
                    self.entry.target.display(),
                    live.device,
                    self.entry.device
                );
            }
            Some(_) => {}
            None => {
                log::info!(
                    "Mounting {} on {}",
                    self.entry.device,
                    self.entry.target.display()
                );
                self.table.mount(&self.entry).with_context(|| {
                    format!("Failed to mount {}", self.entry.target.display())
                })?;
                result = ApplyResult::Created;
            }
        }

        if !self.persisted()? {
            self.table
                .persist(&self.entry)
                .context("Failed to update boot-time mount table")?;
            if result == ApplyResult::Unchanged {
                result = ApplyResult::Modified;
            }
        }

        Ok(result)
    }
}
