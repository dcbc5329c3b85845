use std::path::Path;

use crate::host::{HostEnvironment, MountPointState};

/// Whether something already occupies `path`, so that a generated mount
/// there would hide or fight with it.
pub fn path_is_busy(host: &dyn HostEnvironment, path: &Path) -> bool {
    match host.mount_point_state(path) {
        Ok(MountPointState::Missing) => false,
        Ok(MountPointState::MountPoint) => {
            tracing::debug!("{path:?} is already a mount point");
            true
        }
        Ok(MountPointState::NotMountPoint) => match host.dir_is_empty(path) {
            Ok(true) => false,
            Ok(false) => {
                tracing::debug!("{path:?} is not empty");
                true
            }
            Err(error) => {
                tracing::warn!("Failed to check if {path:?} is empty: {error:#}");
                true
            }
        },
        Err(error) => {
            tracing::warn!("Failed to determine whether {path:?} is a mount point: {error:#}");
            true
        }
    }
}
