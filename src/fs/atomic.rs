use std::{
    fs::Permissions,
    io::Write as _,
    os::unix::fs::PermissionsExt as _,
    path::Path,
};

use anyhow::{Context as _, Result};

/// Create `path` with `contents`, failing if anything already exists there.
///
/// The content is written to a temporary file in the same directory first and
/// then linked into place, so readers either see the complete file or nothing.
pub fn create_new_file(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("Path {path:?} has no parent directory"))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".#gpt-auto-")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temporary file in {dir:?}"))?;

    tmp.write_all(contents)
        .and_then(|_| tmp.flush())
        .with_context(|| format!("Failed to write file {path:?}"))?;
    tmp.as_file()
        .set_permissions(Permissions::from_mode(0o644))
        .with_context(|| format!("Failed to set permissions of {path:?}"))?;

    tmp.persist_noclobber(path)
        .with_context(|| format!("Failed to create file {path:?}"))?;

    Ok(())
}
