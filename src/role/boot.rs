use std::{path::Path, time::Duration};

use anyhow::{Context as _, Result};

use crate::{
    emit::{plan_automount, MountRequest},
    generator::{Generator, Outcome, SkipReason},
    guard::path_is_busy,
    guid::parse_guid,
    probe::Probed,
};

use super::{Role, RoleAssignment, RoleStrategy};

const BOOT_MOUNT_POINT: &str = "/boot";
const BOOT_MOUNT_OPTIONS: &str = "umask=0077";
const BOOT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Automounts the ESP on `/boot`, but only if the firmware confirms it is the
/// partition we were booted from.
pub struct EspStrategy;

impl RoleStrategy for EspStrategy {
    fn activate(&self, generator: &Generator, assignment: &RoleAssignment) -> Result<Outcome> {
        let host = generator.host;

        if !host.is_efi_boot() {
            return Ok(Outcome::Skipped(SkipReason::NotEfiBoot));
        }
        if host.in_initrd() {
            return Ok(Outcome::Skipped(SkipReason::InInitrd));
        }
        if host.in_container() {
            return Ok(Outcome::Skipped(SkipReason::InContainer));
        }

        let Some(loader_uuid) = host
            .loader_partition_uuid()
            .context("Failed to read ESP partition UUID")?
        else {
            return Ok(Outcome::Skipped(SkipReason::LoaderPartitionUnknown));
        };

        // An .automount would not be overridden by the .mount from fstab
        if host
            .fstab()
            .context("Failed to parse fstab")?
            .is_mount_point(Path::new(BOOT_MOUNT_POINT))
        {
            return Ok(Outcome::Skipped(SkipReason::StaticallyConfigured(
                BOOT_MOUNT_POINT.to_owned(),
            )));
        }
        if path_is_busy(host, Path::new(BOOT_MOUNT_POINT)) {
            return Ok(Outcome::Skipped(SkipReason::Busy(BOOT_MOUNT_POINT.into())));
        }

        let info = match generator
            .probe
            .probe_entry(Path::new(&assignment.node))
            .with_context(|| format!("Failed to probe {}", assignment.node))?
        {
            Probed::Found(info) => info,
            Probed::Ambiguous | Probed::Nothing => {
                return Ok(Outcome::Skipped(SkipReason::ProbeInconclusive(
                    assignment.node.clone(),
                )))
            }
        };

        if info.fs_type.as_deref() != Some("vfat") {
            return Ok(Outcome::Skipped(SkipReason::NotVfat));
        }
        let Some(part_uuid) = info.part_uuid else {
            return Ok(Outcome::Skipped(SkipReason::NoPartitionUuid));
        };
        let Some(part_uuid) = parse_guid(&part_uuid) else {
            return Ok(Outcome::Skipped(SkipReason::InvalidPartitionUuid(part_uuid)));
        };
        if part_uuid != loader_uuid {
            return Ok(Outcome::Skipped(SkipReason::NotBootedFrom));
        }

        let plan = plan_automount(
            &MountRequest {
                id: Role::Boot.id(),
                what: &assignment.node,
                r#where: BOOT_MOUNT_POINT,
                fs_type: Some("vfat"),
                rw: true,
                options: Some(BOOT_MOUNT_OPTIONS),
                description: Role::Boot.description(),
                milestone: None,
            },
            BOOT_IDLE_TIMEOUT,
        )?;
        generator.intake.submit(&plan)?;

        Ok(Outcome::Emitted)
    }
}
