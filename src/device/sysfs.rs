use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context as _, Result};
use nix::{errno::Errno, sys::stat};

use crate::types::{BlockDevice, DevNum};

use super::DeviceEnumerator;

/// Enumerate block devices through sysfs.
pub struct SysfsEnumerator {
    sysfs: PathBuf,
    devfs: PathBuf,
}

impl SysfsEnumerator {
    pub fn new(sysfs: impl Into<PathBuf>, devfs: impl Into<PathBuf>) -> Self {
        Self {
            sysfs: sysfs.into(),
            devfs: devfs.into(),
        }
    }

    fn device_link(&self, devnum: DevNum) -> PathBuf {
        self.sysfs.join("dev/block").join(devnum.to_string())
    }

    /// If `devnum` is stacked on exactly one other block device (dm-crypt,
    /// dm-verity, ...), return the device below it.
    fn single_slave(&self, devnum: DevNum) -> Result<Option<DevNum>> {
        let slaves_dir = self.device_link(devnum).join("slaves");
        let entries = match std::fs::read_dir(&slaves_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {slaves_dir:?}"));
            }
        };

        let slaves = entries
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read {slaves_dir:?}"))?;

        match slaves.as_slice() {
            [slave] => read_attr(slave, "dev")?.parse::<DevNum>().map(Some),
            _ => Ok(None),
        }
    }
}

impl Default for SysfsEnumerator {
    fn default() -> Self {
        Self::new("/sys", "/dev")
    }
}

impl DeviceEnumerator for SysfsEnumerator {
    fn block_device_of(&self, path: &Path) -> Result<Option<DevNum>> {
        let st = match stat::stat(path) {
            Ok(st) => st,
            Err(Errno::ENOENT) => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to stat {path:?}")),
        };

        let devnum = DevNum::new(stat::major(st.st_dev), stat::minor(st.st_dev));
        if devnum.major == 0 {
            tracing::debug!("{path:?} is not backed by a single block device ({devnum})");
            return Ok(None);
        }

        match self.single_slave(devnum)? {
            Some(slave) => {
                tracing::debug!("{path:?} is on {devnum}, which is stacked on {slave}");
                Ok(Some(slave))
            }
            None => Ok(Some(devnum)),
        }
    }

    fn parent_disk(&self, devnum: DevNum) -> Result<Option<BlockDevice>> {
        let link = self.device_link(devnum);
        let syspath = match std::fs::canonicalize(&link) {
            Ok(syspath) => syspath,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Device {devnum} is not known to sysfs, ignoring");
                return Ok(None);
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to resolve {link:?}")),
        };

        if !syspath.join("partition").exists() {
            tracing::debug!("{syspath:?}: not a partitioned device, ignoring");
            return Ok(None);
        }

        let Some(parent) = syspath.parent() else {
            return Ok(None);
        };

        let uevent = read_uevent(parent)?;
        match uevent.get("DEVTYPE").map(String::as_str) {
            Some("disk") => {}
            Some(devtype) => {
                tracing::debug!("{syspath:?}: parent is a {devtype}, not a raw disk, ignoring");
                return Ok(None);
            }
            None => {
                tracing::debug!("{syspath:?}: parent doesn't have a device type, ignoring");
                return Ok(None);
            }
        }

        let Some(devname) = uevent.get("DEVNAME") else {
            tracing::debug!("{syspath:?}: parent device does not have device node, ignoring");
            return Ok(None);
        };

        let disk_devnum: DevNum = read_attr(parent, "dev")?.parse()?;
        if disk_devnum.major == 0 {
            return Ok(None);
        }

        let disk = BlockDevice {
            devnum: disk_devnum,
            node: self.devfs.join(devname),
            syspath: parent.to_path_buf(),
            partition: None,
        };
        tracing::debug!("Device {devnum} is on disk {:?}", disk.node);

        Ok(Some(disk))
    }

    fn siblings(&self, disk: &BlockDevice) -> Result<Vec<BlockDevice>> {
        let mut siblings = vec![];

        let entries = std::fs::read_dir(&disk.syspath)
            .with_context(|| format!("Failed to enumerate partitions of {:?}", disk.node))?;
        for entry in entries {
            let path = entry?.path();
            if !path.join("partition").is_file() {
                continue;
            }

            let uevent = read_uevent(&path)?;
            let Some(devname) = uevent.get("DEVNAME") else {
                continue;
            };

            let partition = read_attr(&path, "partition")?
                .parse::<u32>()
                .with_context(|| format!("Bad partition number in {path:?}"))?;
            let devnum: DevNum = read_attr(&path, "dev")?.parse()?;
            if devnum.major == 0 {
                continue;
            }

            siblings.push(BlockDevice {
                devnum,
                node: self.devfs.join(devname),
                syspath: path,
                partition: Some(partition),
            });
        }

        Ok(siblings)
    }
}

fn read_attr(dir: &Path, name: &str) -> Result<String> {
    let path = dir.join(name);
    std::fs::read_to_string(&path)
        .map(|value| value.trim().to_owned())
        .with_context(|| format!("Failed to read sysfs attribute {path:?}"))
}

fn read_uevent(dir: &Path) -> Result<HashMap<String, String>> {
    Ok(read_attr(dir, "uevent")?
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect())
}
