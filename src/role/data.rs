use std::path::Path;

use anyhow::{bail, Context as _, Result};

use crate::{
    emit::{plan_mount, MountRequest},
    generator::{Generator, Outcome, SkipReason},
    guard::path_is_busy,
    probe::Probed,
    types::FilesystemInfo,
    unit::Milestone,
};

use super::{Role, RoleAssignment, RoleStrategy};

/// Mounts a data partition (`/home`, `/srv`) at its well-known place.
pub struct DataStrategy {
    pub role: Role,
}

impl RoleStrategy for DataStrategy {
    fn activate(&self, generator: &Generator, assignment: &RoleAssignment) -> Result<Outcome> {
        let Some(r#where) = self.role.mount_point(false) else {
            bail!("Role {} has no mount point", self.role);
        };

        if path_is_busy(generator.host, Path::new(r#where)) {
            return Ok(Outcome::Skipped(SkipReason::Busy(r#where.into())));
        }

        // Find out whether the partition needs unlocking first
        let fs_type = match generator
            .probe
            .probe_filesystem(Path::new(&assignment.node))
            .with_context(|| format!("Failed to probe {}", assignment.node))?
        {
            Probed::Found(FilesystemInfo {
                fs_type: Some(fs_type),
                ..
            }) => fs_type,
            // No superblock means an unformatted partition
            Probed::Found(_) | Probed::Ambiguous | Probed::Nothing => {
                return Ok(Outcome::Skipped(SkipReason::ProbeInconclusive(
                    assignment.node.clone(),
                )))
            }
        };

        let plan = plan_mount(&MountRequest {
            id: self.role.id(),
            what: &assignment.node,
            r#where,
            fs_type: Some(&fs_type),
            rw: assignment.rw,
            options: None,
            description: self.role.description(),
            milestone: Some(Milestone::LocalFs),
        })?;
        generator.intake.submit(&plan)?;

        Ok(Outcome::Emitted)
    }
}
