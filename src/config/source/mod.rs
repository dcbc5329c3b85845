pub mod proc;

use anyhow::Result;

pub use proc::ProcCmdlineSource;

use super::GeneratorConfig;

/// Where the kernel command line of this boot comes from.
pub trait CmdlineSource {
    fn source_debug_string(&self) -> String;

    fn get_cmdline(&self) -> Result<String>;

    fn get_config(&self) -> Result<GeneratorConfig> {
        self.get_cmdline()
            .map(|cmdline| GeneratorConfig::from_cmdline(&cmdline))
    }
}

/// A fixed command line, used when the caller already knows it.
pub struct StaticCmdlineSource {
    cmdline: String,
}

impl StaticCmdlineSource {
    pub fn new(cmdline: impl Into<String>) -> Self {
        Self {
            cmdline: cmdline.into(),
        }
    }
}

impl CmdlineSource for StaticCmdlineSource {
    fn source_debug_string(&self) -> String {
        format!("static: {:?}", self.cmdline)
    }

    fn get_cmdline(&self) -> Result<String> {
        Ok(self.cmdline.clone())
    }
}
