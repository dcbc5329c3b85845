pub mod cmdline;
pub mod source;

use cmdline::{parse_boolean, CmdlineItem};

/// Value of `root=` that keeps root partition discovery enabled.
pub const ROOT_GPT_AUTO: &str = "gpt-auto";

/// Settings of one generator pass, derived from the kernel command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Whether the generator should do anything at all.
    pub enabled: bool,

    /// Whether a root mount should be generated from the firmware boot
    /// partition. Disabled as soon as `root=` names something else.
    pub root_enabled: bool,

    /// Mount the root partition read-write.
    pub root_rw: bool,

    /// Log at debug level.
    pub verbose: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root_enabled: true,
            root_rw: false,
            verbose: false,
        }
    }
}

impl GeneratorConfig {
    pub fn from_cmdline(cmdline: &str) -> Self {
        let mut config = Self::default();
        for item in cmdline::split(cmdline) {
            config.apply(&item);
        }
        config
    }

    fn apply(&mut self, item: &CmdlineItem) {
        match (item.key.as_str(), item.value.as_deref()) {
            ("systemd.gpt_auto" | "rd.systemd.gpt_auto", Some(value)) => {
                match parse_boolean(value) {
                    Some(enabled) => self.enabled = enabled,
                    None => tracing::warn!(
                        "Failed to parse gpt-auto switch {value:?}, ignoring"
                    ),
                }
            }
            ("root", Some(value)) => self.root_enabled = value == ROOT_GPT_AUTO,
            ("rw", None) => self.root_rw = true,
            ("ro", None) => self.root_rw = false,
            ("debug", None) => self.verbose = true,
            ("systemd.log_level", Some(level)) => self.verbose = level == "debug",
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cmdline() {
        assert_eq!(GeneratorConfig::from_cmdline(""), GeneratorConfig::default());
        assert_eq!(
            GeneratorConfig::from_cmdline("quiet splash\n"),
            GeneratorConfig::default()
        );
    }

    #[test]
    fn test_enable_switch() {
        assert!(!GeneratorConfig::from_cmdline("systemd.gpt_auto=0").enabled);
        assert!(!GeneratorConfig::from_cmdline("rd.systemd.gpt_auto=no").enabled);
        assert!(
            GeneratorConfig::from_cmdline("systemd.gpt_auto=off systemd.gpt_auto=yes").enabled
        );
        // Unparseable values are ignored
        assert!(GeneratorConfig::from_cmdline("systemd.gpt_auto=maybe").enabled);
        // A bare key carries no value
        assert!(GeneratorConfig::from_cmdline("systemd.gpt_auto").enabled);
    }

    #[test]
    fn test_root_override() {
        let config = GeneratorConfig::from_cmdline("root=/dev/sda2 rw");
        assert!(!config.root_enabled);
        assert!(config.root_rw);

        let config = GeneratorConfig::from_cmdline("root=gpt-auto");
        assert!(config.root_enabled);
        assert!(!config.root_rw);

        let config = GeneratorConfig::from_cmdline("rw ro");
        assert!(!config.root_rw);

        // `rw=1` is not the bare `rw` switch
        let config = GeneratorConfig::from_cmdline("rw=1");
        assert!(!config.root_rw);
    }

    #[test]
    fn test_verbose() {
        assert!(GeneratorConfig::from_cmdline("debug").verbose);
        assert!(GeneratorConfig::from_cmdline("systemd.log_level=debug").verbose);
        assert!(!GeneratorConfig::from_cmdline("systemd.log_level=info").verbose);
    }
}
