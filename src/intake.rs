use std::{
    io::ErrorKind,
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context as _, Result};
use scopeguard::ScopeGuard;

use crate::{
    fs::atomic::create_new_file,
    unit::{
        render::{
            render_unit, resolve_fsck, FsckDependency, FSCK_ROOT_SERVICE, SYSTEM_DATA_UNIT_PATH,
        },
        EmissionPlan, Milestone,
    },
};

/// Hands generated units over to the service manager.
pub trait Intake {
    /// Apply all of `plan`, or nothing of it.
    fn submit(&self, plan: &EmissionPlan) -> Result<()>;
}

/// Something created on disk while applying a plan.
#[derive(Debug)]
enum Artifact {
    File(PathBuf),
    Dir(PathBuf),
}

impl Artifact {
    fn remove(&self) {
        let (path, result) = match self {
            Artifact::File(path) => (path, std::fs::remove_file(path)),
            Artifact::Dir(path) => (path, std::fs::remove_dir(path)),
        };
        if let Err(error) = result {
            tracing::warn!("Failed to remove {path:?} while rolling back: {error}");
        }
    }
}

type Artifacts = ScopeGuard<Vec<Artifact>, fn(Vec<Artifact>)>;

fn roll_back(artifacts: Vec<Artifact>) {
    for artifact in artifacts.iter().rev() {
        artifact.remove();
    }
}

/// Writes units into a generator output directory, expressing dependencies
/// on other units as `.wants/` and `.requires/` symlinks.
pub struct DirectoryIntake {
    dest: PathBuf,
    in_initrd: bool,
    fsck_helper_exists: Box<dyn Fn(&str) -> bool>,
}

impl DirectoryIntake {
    pub fn new(dest: impl Into<PathBuf>, in_initrd: bool) -> Self {
        Self {
            dest: dest.into(),
            in_initrd,
            fsck_helper_exists: Box::new(fsck_helper_exists),
        }
    }

    /// Replace the lookup of `fsck.<type>` helpers.
    pub fn with_fsck_helper_lookup(mut self, lookup: impl Fn(&str) -> bool + 'static) -> Self {
        self.fsck_helper_exists = Box::new(lookup);
        self
    }

    fn create_file(&self, path: &Path, content: &str, artifacts: &mut Artifacts) -> Result<()> {
        create_new_file(path, content.as_bytes())
            .with_context(|| format!("Failed to create unit file {path:?}"))?;
        artifacts.push(Artifact::File(path.to_path_buf()));
        Ok(())
    }

    fn ensure_dir(&self, dir: &Path, artifacts: &mut Artifacts) -> Result<()> {
        match std::fs::create_dir(dir) {
            Ok(()) => {
                artifacts.push(Artifact::Dir(dir.to_path_buf()));
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to create directory {dir:?}")),
        }
    }

    fn create_link(&self, target: &Path, link: &Path, artifacts: &mut Artifacts) -> Result<()> {
        if let Some(dir) = link.parent() {
            self.ensure_dir(dir, artifacts)?;
        }
        symlink(target, link).with_context(|| format!("Failed to create symlink {link:?}"))?;
        artifacts.push(Artifact::File(link.to_path_buf()));
        Ok(())
    }
}

fn fsck_helper_exists(fs_type: &str) -> bool {
    which::which(format!("fsck.{fs_type}")).is_ok()
}

impl Intake for DirectoryIntake {
    fn submit(&self, plan: &EmissionPlan) -> Result<()> {
        let rendered = plan
            .units
            .iter()
            .map(|unit| {
                let fsck = match &unit.fsck {
                    Some(request) => {
                        resolve_fsck(request, self.in_initrd, self.fsck_helper_exists.as_ref())?
                    }
                    None => FsckDependency::None,
                };
                let content = render_unit(unit, &fsck);
                Ok((unit, fsck, content))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut artifacts: Artifacts = scopeguard::guard(vec![], roll_back as fn(Vec<Artifact>));

        // All files go in before anything links to them
        for (unit, _, content) in &rendered {
            self.create_file(&self.dest.join(&unit.name), content, &mut artifacts)?;
        }

        for drop_in in &plan.drop_ins {
            let path = self.dest.join(drop_in.relative_path());
            if let Some(dir) = path.parent() {
                self.ensure_dir(dir, &mut artifacts)?;
            }
            self.create_file(&path, &drop_in.content, &mut artifacts)?;
        }

        for (unit, fsck, _) in &rendered {
            for edge in unit.reverse_edges() {
                let Some(suffix) = edge.relation.link_dir_suffix() else {
                    bail!(
                        "Cannot add {} dependency of {} on {} without modifying it",
                        edge.relation,
                        edge.from,
                        edge.to
                    );
                };
                let link = self
                    .dest
                    .join(format!("{}{suffix}", edge.from))
                    .join(&unit.name);
                self.create_link(&Path::new("..").join(&unit.name), &link, &mut artifacts)?;
            }

            if *fsck == FsckDependency::RootLink {
                let link = self
                    .dest
                    .join(format!("{}.wants", Milestone::LocalFs))
                    .join(FSCK_ROOT_SERVICE);
                self.create_link(
                    &Path::new(SYSTEM_DATA_UNIT_PATH).join(FSCK_ROOT_SERVICE),
                    &link,
                    &mut artifacts,
                )?;
            }
        }

        let artifacts = ScopeGuard::into_inner(artifacts);
        tracing::debug!("Created {} files and directories", artifacts.len());

        Ok(())
    }
}
