use std::time::Duration;

use anyhow::Result;

use crate::{
    crypto::{resolve_crypto_layer, LUKS_FS_TYPE},
    unit::{
        name::unit_name_from_path, EmissionPlan, FsckRequest, Milestone, Relation, UnitBody,
        UnitDescriptor,
    },
};

/// Parameters of a mount to generate.
#[derive(Debug, Clone)]
pub struct MountRequest<'a> {
    /// Identity of the mount, also used as the name of the unlocked volume
    /// if the device is encrypted.
    pub id: &'a str,
    pub what: &'a str,
    pub r#where: &'a str,
    pub fs_type: Option<&'a str>,
    pub rw: bool,
    /// Mount options besides `rw`/`ro`.
    pub options: Option<&'a str>,
    pub description: &'a str,
    /// Milestone that requires the mount and is ordered after it.
    pub milestone: Option<Milestone>,
}

fn mount_options(options: Option<&str>, rw: bool) -> String {
    let mode = if rw { "rw" } else { "ro" };
    match options {
        Some(options) => format!("{options},{mode}"),
        None => mode.to_owned(),
    }
}

/// Plan a mount unit, preceded by unlocking the device if it is encrypted.
pub fn plan_mount(request: &MountRequest) -> Result<EmissionPlan> {
    tracing::debug!(
        "Adding {}: {} {}",
        request.r#where,
        request.what,
        request.fs_type.unwrap_or("n/a")
    );

    let mut plan = EmissionPlan::default();
    let name = unit_name_from_path(request.r#where, ".mount")?;

    let (what, fs_type) = if request.fs_type == Some(LUKS_FS_TYPE) {
        let layer = resolve_crypto_layer(request.id, request.what, request.rw, &name)?;
        plan.units.push(layer.unit);
        plan.drop_ins.push(layer.drop_in);
        (layer.mapped_device, None)
    } else {
        (request.what.to_owned(), request.fs_type.map(ToOwned::to_owned))
    };

    let mut unit = UnitDescriptor::new(
        name,
        request.description,
        UnitBody::Mount {
            what: what.clone(),
            r#where: request.r#where.to_owned(),
            fs_type: fs_type.clone(),
            options: mount_options(request.options, request.rw),
        },
    );
    if let Some(milestone) = request.milestone {
        unit = unit
            .depends(Relation::Before, milestone)
            .depended_on_by(milestone, Relation::Requires);
    }
    unit.fsck = Some(FsckRequest {
        what,
        r#where: request.r#where.to_owned(),
        fs_type,
    });

    plan.units.push(unit);
    Ok(plan)
}

/// Plan a mount that is only activated on access, and deactivated after
/// `idle_timeout` without use.
pub fn plan_automount(request: &MountRequest, idle_timeout: Duration) -> Result<EmissionPlan> {
    let options = match request.options {
        Some(options) => format!("{options},noauto"),
        None => "noauto".to_owned(),
    };
    let mut plan = plan_mount(&MountRequest {
        options: Some(&options),
        milestone: None,
        ..request.clone()
    })?;

    let unit = UnitDescriptor::new(
        unit_name_from_path(request.r#where, ".automount")?,
        request.description,
        UnitBody::Automount {
            r#where: request.r#where.to_owned(),
            idle_timeout_sec: idle_timeout.as_secs(),
        },
    )
    .depends(Relation::Before, Milestone::LocalFs)
    .depended_on_by(Milestone::LocalFs, Relation::Wants);

    plan.units.push(unit);
    Ok(plan)
}

pub fn plan_swap(what: &str) -> Result<EmissionPlan> {
    tracing::debug!("Adding swap: {what}");

    let unit = UnitDescriptor::new(
        unit_name_from_path(what, ".swap")?,
        "Swap Partition",
        UnitBody::Swap {
            what: what.to_owned(),
        },
    )
    .depends(Relation::Before, Milestone::Swap)
    .depended_on_by(Milestone::Swap, Relation::Wants);

    Ok(EmissionPlan {
        units: vec![unit],
        drop_ins: vec![],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home_request(fs_type: Option<&str>, rw: bool) -> MountRequest<'_> {
        MountRequest {
            id: "home",
            what: "/dev/sda3",
            r#where: "/home",
            fs_type,
            rw,
            options: None,
            description: "Home Partition",
            milestone: Some(Milestone::LocalFs),
        }
    }

    #[test]
    fn test_plan_mount() -> Result<()> {
        let plan = plan_mount(&home_request(Some("ext4"), true))?;

        assert_eq!(plan.units.len(), 1);
        assert!(plan.drop_ins.is_empty());

        let unit = &plan.units[0];
        assert_eq!(unit.name, "home.mount");
        assert_eq!(
            unit.body,
            UnitBody::Mount {
                what: "/dev/sda3".into(),
                r#where: "/home".into(),
                fs_type: Some("ext4".into()),
                options: "rw".into(),
            }
        );
        assert_eq!(
            unit.fsck,
            Some(FsckRequest {
                what: "/dev/sda3".into(),
                r#where: "/home".into(),
                fs_type: Some("ext4".into()),
            })
        );
        assert_eq!(unit.own_edges().count(), 1);
        assert_eq!(unit.reverse_edges().count(), 1);

        Ok(())
    }

    #[test]
    fn test_plan_read_only_mount() -> Result<()> {
        let plan = plan_mount(&home_request(None, false))?;
        assert!(matches!(
            &plan.units[0].body,
            UnitBody::Mount { options, fs_type: None, .. } if options == "ro"
        ));
        Ok(())
    }

    #[test]
    fn test_plan_encrypted_mount() -> Result<()> {
        let plan = plan_mount(&home_request(Some("crypto_LUKS"), true))?;

        assert_eq!(plan.units.len(), 2);
        assert_eq!(plan.drop_ins.len(), 1);

        let crypto = plan
            .unit("systemd-cryptsetup@home.service")
            .expect("crypto unit should be planned");
        assert!(crypto
            .own_edges()
            .any(|edge| edge.relation == Relation::Before && edge.to == "home.mount"));

        let mount = plan.unit("home.mount").expect("mount unit should be planned");
        assert_eq!(
            mount.body,
            UnitBody::Mount {
                what: "/dev/mapper/home".into(),
                r#where: "/home".into(),
                fs_type: None,
                options: "rw".into(),
            }
        );

        Ok(())
    }

    #[test]
    fn test_plan_automount() -> Result<()> {
        let request = MountRequest {
            id: "boot",
            what: "/dev/sda1",
            r#where: "/boot",
            fs_type: Some("vfat"),
            rw: true,
            options: Some("umask=0077"),
            description: "EFI System Partition Automount",
            milestone: None,
        };
        let plan = plan_automount(&request, Duration::from_secs(120))?;

        let mount = plan.unit("boot.mount").expect("mount unit should be planned");
        assert!(matches!(
            &mount.body,
            UnitBody::Mount { options, .. } if options == "umask=0077,noauto,rw"
        ));
        assert_eq!(mount.edges, vec![]);

        let automount = plan
            .unit("boot.automount")
            .expect("automount unit should be planned");
        assert_eq!(
            automount.body,
            UnitBody::Automount {
                r#where: "/boot".into(),
                idle_timeout_sec: 120,
            }
        );
        assert!(automount.reverse_edges().any(|edge| edge.from == "local-fs.target"
            && edge.relation == Relation::Wants));

        Ok(())
    }

    #[test]
    fn test_plan_swap() -> Result<()> {
        let plan = plan_swap("/dev/sda2")?;
        let unit = &plan.units[0];
        assert_eq!(unit.name, "dev-sda2.swap");
        assert_eq!(unit.description, "Swap Partition");
        assert!(unit.fsck.is_none());
        assert!(unit
            .reverse_edges()
            .any(|edge| edge.from == "swap.target" && edge.relation == Relation::Wants));
        Ok(())
    }
}
