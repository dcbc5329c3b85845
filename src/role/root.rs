use anyhow::{Context as _, Result};

use crate::{
    emit::{plan_mount, MountRequest},
    generator::{Generator, Outcome, SkipReason},
    unit::Milestone,
};

use super::Role;

/// Symlink maintained by udev, pointing to the root partition on the disk
/// the boot loader was started from.
pub const GPT_AUTO_ROOT_DEVICE: &str = "/dev/gpt-auto-root";

/// Mount the root partition the boot loader points us to. The device itself
/// is found by udev later, we only wait for it to show up.
pub fn add_root_mount(generator: &Generator) -> Result<Outcome> {
    let host = generator.host;

    if !host.is_efi_boot() {
        return Ok(Outcome::Skipped(SkipReason::NotEfiBoot));
    }

    if host
        .loader_partition_uuid()
        .context("Failed to read ESP partition UUID")?
        .is_none()
    {
        return Ok(Outcome::Skipped(SkipReason::LoaderPartitionUnknown));
    }

    let in_initrd = host.in_initrd();
    let (r#where, milestone) = if in_initrd {
        ("/sysroot", Milestone::InitrdRootFs)
    } else {
        ("/", Milestone::LocalFs)
    };

    let plan = plan_mount(&MountRequest {
        id: Role::Root.id(),
        what: GPT_AUTO_ROOT_DEVICE,
        r#where,
        fs_type: None,
        rw: generator.config.root_rw,
        options: None,
        description: Role::Root.description(),
        milestone: Some(milestone),
    })?;
    generator.intake.submit(&plan)?;

    Ok(Outcome::Emitted)
}
