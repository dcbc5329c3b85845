pub mod name;
pub mod render;

use std::path::PathBuf;

pub const GENERATOR_HEADER: &str = "# Automatically generated by gpt-auto-generator";
pub const GENERATOR_DOCUMENTATION: &str = "man:systemd-gpt-auto-generator(8)";

/// Well-known synchronization points of the boot transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Milestone {
    #[strum(serialize = "local-fs.target")]
    LocalFs,
    #[strum(serialize = "initrd-root-fs.target")]
    InitrdRootFs,
    #[strum(serialize = "swap.target")]
    Swap,
    #[strum(serialize = "cryptsetup.target")]
    Cryptsetup,
    #[strum(serialize = "umount.target")]
    Umount,
}

impl From<Milestone> for String {
    fn from(milestone: Milestone) -> Self {
        milestone.to_string()
    }
}

/// Dependency kinds, spelled as the `[Unit]` setting that expresses them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter)]
pub enum Relation {
    Conflicts,
    BindsTo,
    Requires,
    Wants,
    Before,
    After,
}

impl Relation {
    /// Suffix of the directory through which a unit can declare this
    /// relation to a unit without editing it, if there is one.
    pub fn link_dir_suffix(&self) -> Option<&'static str> {
        match self {
            Relation::Requires => Some(".requires"),
            Relation::Wants => Some(".wants"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub from: String,
    pub relation: Relation,
    pub to: String,
}

/// Ask for the device of a mount to be checked before it is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsckRequest {
    pub what: String,
    pub r#where: String,
    pub fs_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitBody {
    Mount {
        what: String,
        r#where: String,
        fs_type: Option<String>,
        options: String,
    },
    Automount {
        r#where: String,
        idle_timeout_sec: u64,
    },
    Swap {
        what: String,
    },
    CryptoUnlock {
        volume: String,
        source: String,
        read_only: bool,
    },
}

/// A unit file to be generated, together with the dependencies it takes part
/// in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDescriptor {
    pub name: String,
    pub description: String,
    pub documentation: Vec<String>,
    pub default_dependencies: bool,
    pub ignore_on_isolate: bool,
    pub edges: Vec<DependencyEdge>,
    pub fsck: Option<FsckRequest>,
    pub body: UnitBody,
}

impl UnitDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, body: UnitBody) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            documentation: vec![GENERATOR_DOCUMENTATION.to_owned()],
            default_dependencies: true,
            ignore_on_isolate: false,
            edges: vec![],
            fsck: None,
            body,
        }
    }

    /// Add a dependency of this unit on `to`.
    pub fn depends(mut self, relation: Relation, to: impl Into<String>) -> Self {
        self.edges.push(DependencyEdge {
            from: self.name.clone(),
            relation,
            to: to.into(),
        });
        self
    }

    /// Add a dependency of `from` on this unit.
    pub fn depended_on_by(mut self, from: impl Into<String>, relation: Relation) -> Self {
        self.edges.push(DependencyEdge {
            from: from.into(),
            relation,
            to: self.name.clone(),
        });
        self
    }

    /// Dependencies declared in this unit's own file.
    pub fn own_edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter().filter(|edge| edge.from == self.name)
    }

    /// Dependencies other units take on this one.
    pub fn reverse_edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges
            .iter()
            .filter(|edge| edge.from != self.name && edge.to == self.name)
    }
}

/// Extra settings for a unit this generator does not own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropIn {
    pub unit: String,
    pub name: String,
    pub content: String,
}

impl DropIn {
    /// Location of the drop-in, relative to the generator directory.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.d", self.unit)).join(format!("{}.conf", self.name))
    }
}

/// Everything that has to be generated to activate one role. Applied
/// all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmissionPlan {
    pub units: Vec<UnitDescriptor>,
    pub drop_ins: Vec<DropIn>,
}

impl EmissionPlan {
    pub fn unit(&self, name: &str) -> Option<&UnitDescriptor> {
        self.units.iter().find(|unit| unit.name == name)
    }
}
