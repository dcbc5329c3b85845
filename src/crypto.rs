use anyhow::Result;

use crate::unit::{
    name::{unit_name_build, unit_name_escape, unit_name_from_path},
    render::render_drop_in,
    DropIn, Milestone, Relation, UnitBody, UnitDescriptor,
};

/// Filesystem type of an encrypted container that needs unlocking before use.
pub const LUKS_FS_TYPE: &str = "crypto_LUKS";

/// What it takes to access an encrypted partition through a mapped device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoLayer {
    /// The device node of the unlocked volume, e.g. `/dev/mapper/home`.
    pub mapped_device: String,
    pub unit: UnitDescriptor,
    pub drop_in: DropIn,
}

/// Set up unlocking of the encrypted partition `source` as volume `id`,
/// before the unit `consumer` uses it.
pub fn resolve_crypto_layer(
    id: &str,
    source: &str,
    rw: bool,
    consumer: &str,
) -> Result<CryptoLayer> {
    let source_device = unit_name_from_path(source, ".device")?;
    let escaped_id = unit_name_escape(id);
    let mapped_device_unit = format!("dev-mapper-{escaped_id}.device");
    let name = unit_name_build("systemd-cryptsetup", &escaped_id, ".service");

    tracing::debug!("Adding {name} to unlock {source} as {id}");

    let mut unit = UnitDescriptor::new(
        name,
        "Cryptography Setup for %I",
        UnitBody::CryptoUnlock {
            volume: id.to_owned(),
            source: source.to_owned(),
            read_only: !rw,
        },
    )
    .depends(Relation::Conflicts, Milestone::Umount)
    .depends(Relation::BindsTo, mapped_device_unit.as_str())
    .depends(Relation::BindsTo, source_device.as_str())
    .depends(Relation::Before, Milestone::Umount)
    .depends(Relation::Before, Milestone::Cryptsetup)
    .depends(Relation::Before, consumer)
    .depends(Relation::After, source_device.as_str())
    .depended_on_by(source_device.as_str(), Relation::Wants)
    .depended_on_by(Milestone::Cryptsetup, Relation::Requires)
    .depended_on_by(mapped_device_unit.as_str(), Relation::Requires);
    unit.documentation.push("man:systemd-cryptsetup@.service(8)".into());
    unit.default_dependencies = false;
    unit.ignore_on_isolate = true;

    // systemd-cryptsetup handles timeouts itself
    let drop_in = DropIn {
        unit: mapped_device_unit,
        name: "50-job-timeout-sec-0".to_owned(),
        content: render_drop_in("Unit", &[("JobTimeoutSec", "0")]),
    };

    Ok(CryptoLayer {
        mapped_device: format!("/dev/mapper/{id}"),
        unit,
        drop_in,
    })
}
