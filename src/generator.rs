use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use anyhow::{Context as _, Result};

use crate::{
    classify::classify,
    config::GeneratorConfig,
    device::DeviceEnumerator,
    host::HostEnvironment,
    intake::Intake,
    probe::{PartitionProbe, Probed},
    role::{root::add_root_mount, Role},
    types::DevNum,
};

/// Why a role was left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotEfiBoot,
    InInitrd,
    InContainer,
    LoaderPartitionUnknown,
    StaticallyConfigured(String),
    Busy(PathBuf),
    ProbeInconclusive(String),
    NotVfat,
    NoPartitionUuid,
    InvalidPartitionUuid(String),
    NotBootedFrom,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotEfiBoot => write!(f, "not an EFI boot"),
            SkipReason::InInitrd => write!(f, "running in initrd"),
            SkipReason::InContainer => write!(f, "running in a container"),
            SkipReason::LoaderPartitionUnknown => write!(f, "EFI loader partition unknown"),
            SkipReason::StaticallyConfigured(what) => write!(f, "{what} specified in fstab"),
            SkipReason::Busy(path) => write!(f, "{path:?} already populated"),
            SkipReason::ProbeInconclusive(node) => {
                write!(f, "no or ambiguous probe results for {node}")
            }
            SkipReason::NotVfat => write!(f, "partition is not a FAT filesystem"),
            SkipReason::NoPartitionUuid => write!(f, "partition does not have a UUID"),
            SkipReason::InvalidPartitionUuid(uuid) => {
                write!(f, "partition does not have a valid UUID: {uuid:?}")
            }
            SkipReason::NotBootedFrom => {
                write!(f, "partition does not appear to be the one we are booted from")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Emitted,
    Skipped(SkipReason),
}

/// Accumulated result of a generator pass. A failed role does not stop the
/// others.
#[derive(Debug, Default)]
pub struct PassStatus {
    emitted: Vec<String>,
    failed: Vec<String>,
}

impl PassStatus {
    pub fn record(&mut self, subject: impl Display, result: Result<Outcome>) {
        match result {
            Ok(Outcome::Emitted) => {
                tracing::info!("Generated units for {subject}");
                self.emitted.push(subject.to_string());
            }
            Ok(Outcome::Skipped(reason)) => {
                tracing::debug!("Ignoring {subject}: {reason}");
            }
            Err(error) => {
                tracing::error!("Failed to set up {subject}: {error:#}");
                self.failed.push(subject.to_string());
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Subjects units were generated for, in order.
    pub fn emitted(&self) -> &[String] {
        &self.emitted
    }

    pub fn failed(&self) -> &[String] {
        &self.failed
    }
}

/// One pass of discovering partitions and generating units for them.
pub struct Generator<'a> {
    pub config: &'a GeneratorConfig,
    pub enumerator: &'a dyn DeviceEnumerator,
    pub probe: &'a dyn PartitionProbe,
    pub host: &'a dyn HostEnvironment,
    pub intake: &'a dyn Intake,
}

impl Generator<'_> {
    pub fn run(&self) -> PassStatus {
        let mut status = PassStatus::default();

        if self.config.root_enabled {
            status.record(Role::Root, add_root_mount(self));
        } else {
            tracing::debug!("Root partition discovery disabled on the kernel command line");
        }

        // In the initrd, the partitions of the root disk are dealt with after
        // switching root
        if !self.host.in_initrd() {
            if let Err(error) = self.add_mounts(&mut status) {
                status.record("partitions of the root disk", Err(error));
            }
        }

        status
    }

    fn add_mounts(&self, status: &mut PassStatus) -> Result<()> {
        let root = match self
            .enumerator
            .block_device_of(Path::new("/"))
            .context("Failed to determine block device of root file system")?
        {
            Some(devnum) => devnum,
            None => match self
                .enumerator
                .block_device_of(Path::new("/usr"))
                .context("Failed to determine block device of /usr file system")?
            {
                Some(devnum) => devnum,
                None => {
                    tracing::debug!(
                        "Neither root nor /usr file system are on a (single) block device"
                    );
                    return Ok(());
                }
            },
        };

        self.enumerate_partitions(root, status)
    }

    fn enumerate_partitions(&self, root: DevNum, status: &mut PassStatus) -> Result<()> {
        let Some(disk) = self.enumerator.parent_disk(root)? else {
            return Ok(());
        };
        tracing::debug!("Root device {root} is on {:?}", disk.node);

        let table = match self
            .probe
            .probe_table(&disk.node)
            .with_context(|| format!("{:?}: failed to probe", disk.node))?
        {
            Probed::Found(table) => table,
            Probed::Ambiguous => {
                tracing::warn!("{:?}: probe gave ambiguous results, ignoring", disk.node);
                return Ok(());
            }
            Probed::Nothing => {
                tracing::debug!("{:?}: no partition table found, ignoring", disk.node);
                return Ok(());
            }
        };

        if !table.is_gpt() {
            tracing::debug!("{:?}: not a GPT partition table, ignoring", disk.node);
            return Ok(());
        }

        let siblings = self
            .enumerator
            .siblings(&disk)
            .with_context(|| format!("{:?}: failed to enumerate partitions", disk.node))?;

        for (rule, assignment) in classify(root, &disk, &siblings, &table) {
            status.record(rule.role, rule.strategy.activate(self, &assignment));
        }

        Ok(())
    }
}
