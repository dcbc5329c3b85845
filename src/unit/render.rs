use anyhow::Result;
use strum::IntoEnumIterator as _;

use super::{name, FsckRequest, Relation, UnitBody, UnitDescriptor, GENERATOR_HEADER};

pub const SYSTEMD_CRYPTSETUP_PATH: &str = "/usr/lib/systemd/systemd-cryptsetup";
pub const SYSTEM_DATA_UNIT_PATH: &str = "/usr/lib/systemd/system";
pub const FSCK_ROOT_SERVICE: &str = "systemd-fsck-root.service";

/// How a filesystem check request turns into generated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsckDependency {
    /// Nothing to check.
    None,
    /// The root filesystem is checked by pulling `systemd-fsck-root.service`
    /// into `local-fs.target`.
    RootLink,
    /// The mount requires and is ordered after this check service.
    Service(String),
}

/// Decide how the device of a mount gets checked. `helper_exists` tells
/// whether a `fsck.<type>` helper is installed.
pub fn resolve_fsck(
    request: &FsckRequest,
    in_initrd: bool,
    helper_exists: &dyn Fn(&str) -> bool,
) -> Result<FsckDependency> {
    if !is_device_path(&request.what) {
        tracing::warn!(
            "Checking was requested for {:?}, but it is not a device",
            request.what
        );
        return Ok(FsckDependency::None);
    }

    if let Some(fs_type) = request.fs_type.as_deref().filter(|t| *t != "auto") {
        if !helper_exists(fs_type) {
            tracing::debug!(
                "Checking was requested for {:?}, but fsck.{fs_type} does not exist",
                request.what
            );
            return Ok(FsckDependency::None);
        }
    }

    if request.r#where == "/" {
        return Ok(FsckDependency::RootLink);
    }

    if in_initrd && request.r#where == "/sysroot" {
        return Ok(FsckDependency::Service(FSCK_ROOT_SERVICE.to_owned()));
    }

    Ok(FsckDependency::Service(name::unit_name_from_path_instance(
        "systemd-fsck",
        &request.what,
        ".service",
    )?))
}

fn is_device_path(path: &str) -> bool {
    path.starts_with("/dev/") || path.starts_with("/sys/")
}

/// Render the unit file for `unit`.
pub fn render_unit(unit: &UnitDescriptor, fsck: &FsckDependency) -> String {
    let mut out = format!("{GENERATOR_HEADER}\n\n[Unit]\n");
    out.push_str(&format!("Description={}\n", unit.description));
    if !unit.documentation.is_empty() {
        out.push_str(&format!("Documentation={}\n", unit.documentation.join(" ")));
    }
    if !unit.default_dependencies {
        out.push_str("DefaultDependencies=no\n");
    }

    for relation in Relation::iter() {
        let targets = unit
            .own_edges()
            .filter(|edge| edge.relation == relation)
            .map(|edge| edge.to.as_str())
            .collect::<Vec<_>>();
        if !targets.is_empty() {
            out.push_str(&format!("{relation}={}\n", targets.join(" ")));
        }
    }

    if let FsckDependency::Service(service) = fsck {
        out.push_str(&format!("Requires={service}\nAfter={service}\n"));
    }

    if unit.ignore_on_isolate {
        out.push_str("IgnoreOnIsolate=true\n");
    }

    out.push('\n');
    match &unit.body {
        UnitBody::Mount {
            what,
            r#where,
            fs_type,
            options,
        } => {
            out.push_str(&format!("[Mount]\nWhat={what}\nWhere={}\n", r#where));
            if let Some(fs_type) = fs_type {
                out.push_str(&format!("Type={fs_type}\n"));
            }
            out.push_str(&format!("Options={options}\n"));
        }
        UnitBody::Automount {
            r#where,
            idle_timeout_sec,
        } => {
            out.push_str(&format!(
                "[Automount]\nWhere={}\nTimeoutIdleSec={idle_timeout_sec}\n",
                r#where
            ));
        }
        UnitBody::Swap { what } => {
            out.push_str(&format!("[Swap]\nWhat={what}\n"));
        }
        UnitBody::CryptoUnlock {
            volume,
            source,
            read_only,
        } => {
            let mode = if *read_only { "read-only" } else { "" };
            out.push_str("[Service]\nType=oneshot\nRemainAfterExit=yes\nTimeoutSec=0\n");
            out.push_str(&format!(
                "ExecStart={SYSTEMD_CRYPTSETUP_PATH} attach '{volume}' '{source}' '' '{mode}'\n"
            ));
            out.push_str(&format!("ExecStop={SYSTEMD_CRYPTSETUP_PATH} detach '{volume}'\n"));
        }
    }

    out
}

/// Render a drop-in holding `settings` in `section`.
pub fn render_drop_in(section: &str, settings: &[(&str, &str)]) -> String {
    let mut out = format!("{GENERATOR_HEADER}\n\n[{section}]\n");
    for (key, value) in settings {
        out.push_str(&format!("{key}={value}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::unit::Milestone;

    use super::*;

    fn fsck_request(what: &str, r#where: &str, fs_type: Option<&str>) -> FsckRequest {
        FsckRequest {
            what: what.into(),
            r#where: r#where.into(),
            fs_type: fs_type.map(Into::into),
        }
    }

    #[rstest]
    #[case(fsck_request("/dev/sda3", "/home", Some("ext4")), false, FsckDependency::Service("systemd-fsck@dev-sda3.service".into()))]
    #[case(fsck_request("/dev/sda3", "/home", None), false, FsckDependency::Service("systemd-fsck@dev-sda3.service".into()))]
    #[case(fsck_request("/dev/sda3", "/home", Some("auto")), false, FsckDependency::Service("systemd-fsck@dev-sda3.service".into()))]
    #[case(fsck_request("/dev/sda3", "/home", Some("exotic")), false, FsckDependency::None)]
    #[case(fsck_request("server:/export", "/home", Some("ext4")), false, FsckDependency::None)]
    #[case(fsck_request("/dev/gpt-auto-root", "/", None), false, FsckDependency::RootLink)]
    #[case(fsck_request("/dev/gpt-auto-root", "/sysroot", None), true, FsckDependency::Service(FSCK_ROOT_SERVICE.into()))]
    #[case(fsck_request("/dev/gpt-auto-root", "/sysroot", None), false, FsckDependency::Service("systemd-fsck@dev-gpt\\x2dauto\\x2droot.service".into()))]
    fn test_resolve_fsck(
        #[case] request: FsckRequest,
        #[case] in_initrd: bool,
        #[case] expected: FsckDependency,
    ) -> Result<()> {
        let helper_exists = |fs_type: &str| matches!(fs_type, "ext4" | "vfat");
        assert_eq!(resolve_fsck(&request, in_initrd, &helper_exists)?, expected);
        Ok(())
    }

    #[test]
    fn test_render_mount() {
        let unit = UnitDescriptor::new(
            "home.mount",
            "Home Partition",
            UnitBody::Mount {
                what: "/dev/sda3".into(),
                r#where: "/home".into(),
                fs_type: Some("ext4".into()),
                options: "rw".into(),
            },
        )
        .depends(Relation::Before, Milestone::LocalFs)
        .depended_on_by(Milestone::LocalFs, Relation::Requires);

        assert_eq!(
            render_unit(
                &unit,
                &FsckDependency::Service("systemd-fsck@dev-sda3.service".into())
            ),
            "# Automatically generated by gpt-auto-generator

[Unit]
Description=Home Partition
Documentation=man:systemd-gpt-auto-generator(8)
Before=local-fs.target
Requires=systemd-fsck@dev-sda3.service
After=systemd-fsck@dev-sda3.service

[Mount]
What=/dev/sda3
Where=/home
Type=ext4
Options=rw
"
        );
    }

    #[test]
    fn test_render_crypto_unlock() {
        let mut unit = UnitDescriptor::new(
            "systemd-cryptsetup@srv.service",
            "Cryptography Setup for %I",
            UnitBody::CryptoUnlock {
                volume: "srv".into(),
                source: "/dev/sda4".into(),
                read_only: true,
            },
        )
        .depends(Relation::Conflicts, Milestone::Umount)
        .depends(Relation::BindsTo, "dev-mapper-srv.device")
        .depends(Relation::BindsTo, "dev-sda4.device")
        .depends(Relation::Before, Milestone::Umount)
        .depends(Relation::After, "dev-sda4.device");
        unit.default_dependencies = false;
        unit.ignore_on_isolate = true;

        assert_eq!(
            render_unit(&unit, &FsckDependency::None),
            "# Automatically generated by gpt-auto-generator

[Unit]
Description=Cryptography Setup for %I
Documentation=man:systemd-gpt-auto-generator(8)
DefaultDependencies=no
Conflicts=umount.target
BindsTo=dev-mapper-srv.device dev-sda4.device
Before=umount.target
After=dev-sda4.device
IgnoreOnIsolate=true

[Service]
Type=oneshot
RemainAfterExit=yes
TimeoutSec=0
ExecStart=/usr/lib/systemd/systemd-cryptsetup attach 'srv' '/dev/sda4' '' 'read-only'
ExecStop=/usr/lib/systemd/systemd-cryptsetup detach 'srv'
"
        );
    }

    #[test]
    fn test_render_drop_in() {
        assert_eq!(
            render_drop_in("Unit", &[("JobTimeoutSec", "0")]),
            "# Automatically generated by gpt-auto-generator\n\n[Unit]\nJobTimeoutSec=0\n"
        );
    }
}
