use anyhow::{Context as _, Result};

use crate::{
    emit::plan_swap,
    generator::{Generator, Outcome, SkipReason},
};

use super::{RoleAssignment, RoleStrategy};

pub struct SwapStrategy;

impl RoleStrategy for SwapStrategy {
    fn activate(&self, generator: &Generator, assignment: &RoleAssignment) -> Result<Outcome> {
        // Any swap in fstab turns automatic swap off
        let fstab = generator.host.fstab().context("Failed to parse fstab")?;
        if fstab.has_fstype("swap") {
            return Ok(Outcome::Skipped(SkipReason::StaticallyConfigured(
                "swap".to_owned(),
            )));
        }

        let plan = plan_swap(&assignment.node)?;
        generator.intake.submit(&plan)?;

        Ok(Outcome::Emitted)
    }
}
