pub mod blkid;

use std::path::Path;

use anyhow::Result;

use crate::types::{EntryInfo, FilesystemInfo, PartitionTable};

pub use blkid::BlkidProbe;

/// Outcome of a probe that ran without I/O errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probed<T> {
    Found(T),
    /// More than one signature matched, nothing can be trusted.
    Ambiguous,
    /// No signature at all.
    Nothing,
}

impl<T> Probed<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Probed<U> {
        match self {
            Probed::Found(value) => Probed::Found(f(value)),
            Probed::Ambiguous => Probed::Ambiguous,
            Probed::Nothing => Probed::Nothing,
        }
    }
}

/// Reads partition tables and signatures from block devices.
pub trait PartitionProbe {
    /// Probe the partition table of a whole disk.
    fn probe_table(&self, disk: &Path) -> Result<Probed<PartitionTable>>;

    /// Probe the superblock of a device to find out what it contains.
    fn probe_filesystem(&self, device: &Path) -> Result<Probed<FilesystemInfo>>;

    /// Probe the partition table entry of a partition device, together with
    /// the type of its content.
    fn probe_entry(&self, device: &Path) -> Result<Probed<EntryInfo>>;
}
