pub mod boot;
pub mod data;
pub mod root;
pub mod swap;

use anyhow::Result;
use uuid::Uuid;

use crate::{
    generator::{Generator, Outcome},
    guid::{GPT_ESP, GPT_HOME, GPT_SRV, GPT_SWAP},
    types::PartitionFlags,
};

/// What a partition can be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Root,
    Boot,
    Home,
    #[strum(serialize = "srv")]
    ServerData,
    Swap,
}

impl Role {
    /// Short name, also the name of the unlocked volume for encrypted
    /// partitions.
    pub fn id(&self) -> &'static str {
        (*self).into()
    }

    pub fn mount_point(&self, in_initrd: bool) -> Option<&'static str> {
        match self {
            Role::Root if in_initrd => Some("/sysroot"),
            Role::Root => Some("/"),
            Role::Boot => Some("/boot"),
            Role::Home => Some("/home"),
            Role::ServerData => Some("/srv"),
            Role::Swap => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Root => "Root Partition",
            Role::Boot => "EFI System Partition Automount",
            Role::Home => "Home Partition",
            Role::ServerData => "Server Data Partition",
            Role::Swap => "Swap Partition",
        }
    }
}

/// Verdict on whether a partition's flags allow using it for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { rw: bool },
    Rejected(&'static str),
}

/// The partition chosen for a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    pub role: Role,
    pub node: String,
    pub number: u32,
    pub rw: bool,
}

/// Turns a role assignment into generated units.
pub trait RoleStrategy: Sync {
    fn activate(&self, generator: &Generator, assignment: &RoleAssignment) -> Result<Outcome>;
}

pub struct RoleRule {
    pub type_guid: Uuid,
    pub role: Role,
    pub admit: fn(PartitionFlags) -> Admission,
    pub strategy: &'static dyn RoleStrategy,
}

/// Partition types we know what to do with, in the order their roles are
/// activated.
pub static ROLE_TABLE: [RoleRule; 4] = [
    RoleRule {
        type_guid: GPT_SWAP,
        role: Role::Swap,
        admit: admit_swap,
        strategy: &swap::SwapStrategy,
    },
    RoleRule {
        type_guid: GPT_ESP,
        role: Role::Boot,
        admit: admit_esp,
        strategy: &boot::EspStrategy,
    },
    RoleRule {
        type_guid: GPT_HOME,
        role: Role::Home,
        admit: admit_data,
        strategy: &data::DataStrategy { role: Role::Home },
    },
    RoleRule {
        type_guid: GPT_SRV,
        role: Role::ServerData,
        admit: admit_data,
        strategy: &data::DataStrategy {
            role: Role::ServerData,
        },
    },
];

pub fn rule_for(type_guid: &Uuid) -> Option<&'static RoleRule> {
    ROLE_TABLE.iter().find(|rule| rule.type_guid == *type_guid)
}

fn admit_swap(flags: PartitionFlags) -> Admission {
    if flags.no_auto() {
        Admission::Rejected("marked no-auto")
    } else if flags.read_only() {
        Admission::Rejected("marked as read-only swap partition, which is bogus")
    } else {
        Admission::Admitted { rw: true }
    }
}

/// `no-auto` is often set on the ESP to hide it from other operating
/// systems, so it is not honoured here.
fn admit_esp(_flags: PartitionFlags) -> Admission {
    Admission::Admitted { rw: true }
}

fn admit_data(flags: PartitionFlags) -> Admission {
    if flags.no_auto() {
        Admission::Rejected("marked no-auto")
    } else {
        Admission::Admitted {
            rw: !flags.read_only(),
        }
    }
}
