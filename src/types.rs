use std::{fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Context as _, Result};

/// Kernel device number of a block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevNum {
    pub major: u64,
    pub minor: u64,
}

impl DevNum {
    pub const fn new(major: u64, minor: u64) -> Self {
        Self { major, minor }
    }
}

impl Display for DevNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

impl FromStr for DevNum {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (major, minor) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("Bad device number: {s:?}"))?;
        Ok(Self {
            major: major
                .parse()
                .with_context(|| format!("Bad major in device number: {s:?}"))?,
            minor: minor
                .parse()
                .with_context(|| format!("Bad minor in device number: {s:?}"))?,
        })
    }
}

/// A whole disk or one of its partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub devnum: DevNum,
    /// Device node, e.g. `/dev/sda2`
    pub node: PathBuf,
    /// Directory of this device in sysfs
    pub syspath: PathBuf,
    /// Partition number as reported by the kernel. `None` for whole disks.
    pub partition: Option<u32>,
}

/// GPT partition attribute bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartitionFlags(pub u64);

impl PartitionFlags {
    pub const READ_ONLY: u64 = 1 << 60;
    pub const NO_AUTO: u64 = 1 << 63;

    pub fn no_auto(&self) -> bool {
        self.0 & Self::NO_AUTO != 0
    }

    pub fn read_only(&self) -> bool {
        self.0 & Self::READ_ONLY != 0
    }
}

/// One entry of a partition table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartitionEntry {
    pub number: u32,
    /// Partition type GUID, as found in the table
    pub type_guid: String,
    pub flags: PartitionFlags,
    pub part_uuid: Option<String>,
    pub fs_type: Option<String>,
    pub fs_uuid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartitionTable {
    /// `gpt`, `dos`, ... or `None` if the device carries no partition table
    pub table_type: Option<String>,
    pub entries: Vec<PartitionEntry>,
}

impl PartitionTable {
    pub fn is_gpt(&self) -> bool {
        self.table_type.as_deref() == Some("gpt")
    }

    pub fn entry(&self, number: u32) -> Option<&PartitionEntry> {
        self.entries.iter().find(|entry| entry.number == number)
    }
}

/// Superblock information of a block device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilesystemInfo {
    pub fs_type: Option<String>,
    pub uuid: Option<String>,
}

/// Partition table entry details of a partition device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryInfo {
    pub fs_type: Option<String>,
    pub part_uuid: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devnum() -> Result<()> {
        assert_eq!("8:2".parse::<DevNum>()?, DevNum::new(8, 2));
        assert_eq!("259:0\n".parse::<DevNum>()?, DevNum::new(259, 0));
        assert!("8".parse::<DevNum>().is_err());
        assert!("a:b".parse::<DevNum>().is_err());
        assert_eq!(DevNum::new(253, 1).to_string(), "253:1");
        Ok(())
    }

    #[test]
    fn test_partition_flags() {
        assert!(PartitionFlags(PartitionFlags::NO_AUTO).no_auto());
        assert!(!PartitionFlags(PartitionFlags::NO_AUTO).read_only());
        assert!(PartitionFlags(PartitionFlags::READ_ONLY).read_only());
        assert!(!PartitionFlags::default().no_auto());
    }
}
