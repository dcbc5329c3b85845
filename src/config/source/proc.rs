use std::path::PathBuf;

use anyhow::{Context as _, Result};

use super::CmdlineSource;

pub const PROC_CMDLINE_PATH: &str = "/proc/cmdline";

/// Environment variable that replaces the kernel command line, for testing
/// the generator on a running system.
pub const CMDLINE_OVERRIDE_ENV: &str = "SYSTEMD_PROC_CMDLINE";

pub struct ProcCmdlineSource {
    path: PathBuf,
    env_override: Option<String>,
}

impl ProcCmdlineSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            env_override: None,
        }
    }

    pub fn new_with_default_path() -> Self {
        Self {
            path: PathBuf::from(PROC_CMDLINE_PATH),
            env_override: std::env::var(CMDLINE_OVERRIDE_ENV).ok(),
        }
    }
}

impl CmdlineSource for ProcCmdlineSource {
    fn source_debug_string(&self) -> String {
        match &self.env_override {
            Some(_) => format!("env: {CMDLINE_OVERRIDE_ENV}"),
            None => format!("file: {:?}", self.path),
        }
    }

    fn get_cmdline(&self) -> Result<String> {
        if let Some(cmdline) = &self.env_override {
            return Ok(cmdline.clone());
        }

        std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read kernel command line from {:?}", self.path))
    }
}
