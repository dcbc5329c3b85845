use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{anyhow, bail, Context as _, Result};
use gpt::disk::LogicalBlockSize;

use crate::{
    fs::cmd::CheckCommandOutput as _,
    types::{EntryInfo, FilesystemInfo, PartitionEntry, PartitionFlags, PartitionTable},
};

use super::{PartitionProbe, Probed};

const BLKID_BINARY_PATH: &str = "/usr/sbin/blkid";

/// blkid exit code when nothing could be identified
const BLKID_EXIT_NOTHING: i32 = 2;
/// blkid exit code for ambivalent low-level probing results
const BLKID_EXIT_AMBIVALENT: i32 = 8;

/// Probe devices with low-level `blkid` probing, reading GPT entries directly
/// from the disk.
pub struct BlkidProbe {
    binary: PathBuf,
}

impl BlkidProbe {
    pub fn new() -> Self {
        Self {
            binary: which::which("blkid").unwrap_or(BLKID_BINARY_PATH.into()),
        }
    }

    fn low_level_probe(&self, device: &Path) -> Result<Probed<HashMap<String, String>>> {
        Command::new(&self.binary)
            .args(["--probe", "--output", "export"])
            .arg(device)
            .run_with_status_checker(|code, stdout, _| probed_from_exit_code(code, &stdout))
            .with_context(|| format!("Failed to probe {device:?}"))
    }
}

impl Default for BlkidProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionProbe for BlkidProbe {
    fn probe_table(&self, disk: &Path) -> Result<Probed<PartitionTable>> {
        let props = match self.low_level_probe(disk)? {
            Probed::Found(props) => props,
            Probed::Ambiguous => return Ok(Probed::Ambiguous),
            Probed::Nothing => return Ok(Probed::Nothing),
        };

        let table_type = props.get("PTTYPE").cloned();
        let entries = if table_type.as_deref() == Some("gpt") {
            read_gpt_entries(disk)?
        } else {
            vec![]
        };

        Ok(Probed::Found(PartitionTable {
            table_type,
            entries,
        }))
    }

    fn probe_filesystem(&self, device: &Path) -> Result<Probed<FilesystemInfo>> {
        // On a partition, blkid also reports the partition entry. Without a
        // superblock that is all there is.
        Ok(match self.low_level_probe(device)? {
            Probed::Found(mut props) => match props.remove("TYPE") {
                Some(fs_type) => Probed::Found(FilesystemInfo {
                    fs_type: Some(fs_type),
                    uuid: props.remove("UUID"),
                }),
                None => Probed::Nothing,
            },
            Probed::Ambiguous => Probed::Ambiguous,
            Probed::Nothing => Probed::Nothing,
        })
    }

    fn probe_entry(&self, device: &Path) -> Result<Probed<EntryInfo>> {
        Ok(self.low_level_probe(device)?.map(|mut props| EntryInfo {
            fs_type: props.remove("TYPE"),
            part_uuid: props.remove("PART_ENTRY_UUID"),
        }))
    }
}

fn probed_from_exit_code(code: i32, stdout: &[u8]) -> Result<Probed<HashMap<String, String>>> {
    match code {
        0 => Ok(Probed::Found(parse_export(&String::from_utf8_lossy(stdout)))),
        BLKID_EXIT_NOTHING => Ok(Probed::Nothing),
        BLKID_EXIT_AMBIVALENT => Ok(Probed::Ambiguous),
        _ => bail!("Bad exit code"),
    }
}

/// Parse the `KEY=value` lines of `blkid --output export`.
fn parse_export(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_owned(), unescape(value)))
        .collect()
}

/// blkid escapes shell-unsafe characters in exported values with a backslash.
fn unescape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => result.extend(chars.next()),
            c => result.push(c),
        }
    }
    result
}

fn read_gpt_entries(disk: &Path) -> Result<Vec<PartitionEntry>> {
    let mut last_error = anyhow!("No logical block size to try");

    for lb_size in [LogicalBlockSize::Lb512, LogicalBlockSize::Lb4096] {
        let gpt_disk = match gpt::GptConfig::new()
            .writable(false)
            .logical_block_size(lb_size.clone())
            .open(disk)
        {
            Ok(gpt_disk) => gpt_disk,
            Err(error) => {
                tracing::debug!(?error, ?lb_size, "Cannot read GPT of {disk:?}");
                last_error = anyhow::Error::from(error);
                continue;
            }
        };

        let entries = gpt_disk
            .partitions()
            .iter()
            // Unused slots carry the nil type
            .filter(|(_, partition)| !partition.part_type_guid.guid.is_nil())
            .map(|(number, partition)| PartitionEntry {
                number: *number,
                type_guid: partition.part_type_guid.guid.to_string(),
                flags: PartitionFlags(partition.flags),
                part_uuid: Some(partition.part_guid.to_string()),
                fs_type: None,
                fs_uuid: None,
            })
            .collect();

        return Ok(entries);
    }

    Err(last_error).with_context(|| format!("Failed to list partitions of {disk:?}"))
}
