use std::path::PathBuf;

use clap::Parser;

use crate::build::CLAP_LONG_VERSION;

/// Output directory used when started without arguments, for manual testing.
pub const DEFAULT_DEST: &str = "/tmp";

/// Generate mount units for the partitions of the root disk that are
/// identified by their GPT partition type.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[clap(long_version = CLAP_LONG_VERSION)]
pub struct Cli {
    /// Directory for units of normal priority.
    #[arg(requires = "late")]
    pub normal: Option<PathBuf>,

    /// Directory for units that override everything else.
    pub early: Option<PathBuf>,

    /// Directory for units that are overridden by everything else. Units are
    /// written here.
    pub late: Option<PathBuf>,
}

impl Cli {
    /// Where generated units go.
    pub fn dest(&self) -> PathBuf {
        self.late
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEST))
    }
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    #[test]
    fn test_no_arguments() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["gpt-auto-generator"])?;
        assert_eq!(cli.dest(), PathBuf::from("/tmp"));
        Ok(())
    }

    #[test]
    fn test_three_arguments() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "gpt-auto-generator",
            "/run/systemd/generator",
            "/run/systemd/generator.early",
            "/run/systemd/generator.late",
        ])?;
        assert_eq!(cli.dest(), PathBuf::from("/run/systemd/generator.late"));
        Ok(())
    }

    #[test]
    fn test_wrong_argument_count() {
        for args in [
            vec!["gpt-auto-generator", "/a"],
            vec!["gpt-auto-generator", "/a", "/b"],
            vec!["gpt-auto-generator", "/a", "/b", "/c", "/d"],
        ] {
            let error = Cli::try_parse_from(&args).expect_err("should be rejected");
            assert_ne!(error.kind(), ErrorKind::DisplayHelp);
            assert_eq!(error.exit_code(), 2, "{args:?}");
        }
    }
}
