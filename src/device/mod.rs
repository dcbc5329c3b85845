pub mod sysfs;

use std::path::Path;

use anyhow::Result;

use crate::types::{BlockDevice, DevNum};

pub use sysfs::SysfsEnumerator;

/// Walks the kernel's block device model.
pub trait DeviceEnumerator {
    /// The block device backing the filesystem mounted at `path`, or `None`
    /// if it is not a single, distinguishable block device.
    fn block_device_of(&self, path: &Path) -> Result<Option<DevNum>>;

    /// The whole disk holding the partition `devnum`, or `None` if `devnum`
    /// is not a partition of a disk.
    fn parent_disk(&self, devnum: DevNum) -> Result<Option<BlockDevice>>;

    /// All partitions of `disk`, in no particular order.
    fn siblings(&self, disk: &BlockDevice) -> Result<Vec<BlockDevice>>;
}
