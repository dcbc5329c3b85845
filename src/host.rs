use std::{
    io::{BufRead, ErrorKind},
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{bail, Context as _, Result};

use crate::{fs::cmd::CheckCommandOutput as _, fstab::Fstab, guid};

const INITRD_RELEASE_PATH: &str = "/etc/initrd-release";
const CONTAINER_MARKER_PATH: &str = "/run/systemd/container";
const EFI_FIRMWARE_PATH: &str = "/sys/firmware/efi";
const EFIVARS_PATH: &str = "/sys/firmware/efi/efivars";
const FSTAB_PATH: &str = "/etc/fstab";
const DETECT_VIRT_BINARY_PATH: &str = "/usr/bin/systemd-detect-virt";

/// Whether a path is an active mount point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountPointState {
    Missing,
    MountPoint,
    NotMountPoint,
}

/// Facts about the running system the generator bases its decisions on.
pub trait HostEnvironment {
    /// Whether we run in the initrd, before the real root is mounted.
    fn in_initrd(&self) -> bool;

    fn in_container(&self) -> bool;

    fn is_efi_boot(&self) -> bool;

    /// The partition entry UUID of the partition the boot loader was started
    /// from, as published by the boot loader in an EFI variable. `None` if the
    /// variable is not set.
    fn loader_partition_uuid(&self) -> Result<Option<uuid::Uuid>>;

    fn fstab(&self) -> Result<Fstab>;

    fn mount_point_state(&self, path: &Path) -> Result<MountPointState>;

    fn dir_is_empty(&self, path: &Path) -> Result<bool>;
}

/// The host we are running on.
pub struct LiveHost {
    in_initrd: bool,
}

impl LiveHost {
    pub fn new() -> Self {
        Self {
            in_initrd: Path::new(INITRD_RELEASE_PATH).exists(),
        }
    }

    fn loader_variable_path() -> PathBuf {
        Path::new(EFIVARS_PATH).join(format!(
            "LoaderDevicePartUUID-{}",
            guid::LOADER_VENDOR.as_hyphenated()
        ))
    }
}

impl Default for LiveHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostEnvironment for LiveHost {
    fn in_initrd(&self) -> bool {
        self.in_initrd
    }

    fn in_container(&self) -> bool {
        if std::env::var_os("container").is_some_and(|value| !value.is_empty()) {
            return true;
        }
        if Path::new(CONTAINER_MARKER_PATH).exists() {
            return true;
        }

        let binary = which::which("systemd-detect-virt").unwrap_or(DETECT_VIRT_BINARY_PATH.into());
        match Command::new(binary)
            .args(["--container", "--quiet"])
            .run_with_status_checker(|code, _, _| Ok(code == 0))
        {
            Ok(in_container) => in_container,
            Err(error) => {
                tracing::debug!("Cannot detect container environment, assuming none: {error:#}");
                false
            }
        }
    }

    fn is_efi_boot(&self) -> bool {
        Path::new(EFI_FIRMWARE_PATH).exists()
    }

    fn loader_partition_uuid(&self) -> Result<Option<uuid::Uuid>> {
        let path = Self::loader_variable_path();
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to read EFI variable {path:?}")),
        };

        decode_efi_uuid_variable(&raw)
            .map(Some)
            .with_context(|| format!("Failed to parse EFI variable {path:?}"))
    }

    fn fstab(&self) -> Result<Fstab> {
        match std::fs::read_to_string(FSTAB_PATH) {
            Ok(content) => Ok(Fstab::parse(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Fstab::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {FSTAB_PATH}")),
        }
    }

    fn mount_point_state(&self, path: &Path) -> Result<MountPointState> {
        mount_point_state_in(path, || {
            mnt::MountIter::new_from_proc().context("Failed to read mount table")
        })
    }

    fn dir_is_empty(&self, path: &Path) -> Result<bool> {
        let mut entries =
            std::fs::read_dir(path).with_context(|| format!("Failed to open directory {path:?}"))?;
        Ok(entries.next().is_none())
    }
}

/// Look `path` up in the mount table returned by `mounts`. Symlinks in `path`
/// are resolved first, entries that fail to parse are errors.
fn mount_point_state_in<R: BufRead>(
    path: &Path,
    mounts: impl FnOnce() -> Result<mnt::MountIter<R>>,
) -> Result<MountPointState> {
    match std::fs::symlink_metadata(path) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(MountPointState::Missing),
        Err(e) => return Err(e).with_context(|| format!("Failed to stat {path:?}")),
    }
    let path =
        std::fs::canonicalize(path).with_context(|| format!("Failed to resolve {path:?}"))?;

    for entry in mounts()? {
        let entry = entry.context("Failed to parse mount table")?;
        if entry.file == path {
            return Ok(MountPointState::MountPoint);
        }
    }

    Ok(MountPointState::NotMountPoint)
}

/// EFI variables start with 4 bytes of attributes, followed by the payload,
/// here a UTF-16LE string.
fn decode_efi_uuid_variable(raw: &[u8]) -> Result<uuid::Uuid> {
    let Some(payload) = raw.get(4..) else {
        bail!("Variable is too short ({} bytes)", raw.len());
    };
    if payload.len() % 2 != 0 {
        bail!("Payload has odd length ({} bytes)", payload.len());
    }

    let units = payload
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0)
        .collect::<Vec<_>>();
    let text = String::from_utf16(&units).context("Payload is not valid UTF-16")?;

    guid::parse_guid(&text).with_context(|| format!("Not a valid UUID: {text:?}"))
}
