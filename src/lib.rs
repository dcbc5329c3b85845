pub mod classify;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod device;
pub mod emit;
pub mod fs;
pub mod fstab;
pub mod generator;
pub mod guard;
pub mod guid;
pub mod host;
pub mod intake;
pub mod probe;
pub mod role;
pub mod types;
pub mod unit;

use std::process::ExitCode;

use clap::Parser as _;
use config::{
    source::{CmdlineSource as _, ProcCmdlineSource},
    GeneratorConfig,
};
use device::SysfsEnumerator;
use generator::Generator;
use host::{HostEnvironment as _, LiveHost};
use intake::DirectoryIntake;
use nix::sys::stat::{umask, Mode};
use probe::BlkidProbe;
use shadow_rs::shadow;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

shadow!(build);

pub fn run() -> ExitCode {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let (filter, reload_handle) = tracing_subscriber::reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Usage errors exit here, before anything is probed
    let args = cli::Cli::parse();
    let dest = args.dest();

    umask(Mode::from_bits_truncate(0o022));

    let host = LiveHost::new();
    if host.in_container() {
        tracing::debug!("In a container, exiting");
        return ExitCode::SUCCESS;
    }

    let cmdline_source = ProcCmdlineSource::new_with_default_path();
    let config = cmdline_source.get_config().unwrap_or_else(|error| {
        tracing::warn!("Failed to parse kernel command line, ignoring: {error:#}");
        GeneratorConfig::default()
    });

    if config.verbose {
        match reload_handle.modify(|filter| {
            *filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into())
        }) {
            Ok(()) => tracing::info!("Log level set to DEBUG"),
            Err(error) => tracing::warn!("Failed to update log level to DEBUG: {error}"),
        }
    }

    tracing::debug!(
        "gpt-auto-generator version: v{}  commit: {}  buildtime: {}",
        build::PKG_VERSION,
        build::COMMIT_HASH,
        build::BUILD_TIME
    );
    tracing::debug!(
        "Using kernel command line from {}",
        cmdline_source.source_debug_string()
    );

    if !config.enabled {
        tracing::debug!("Disabled, exiting");
        return ExitCode::SUCCESS;
    }

    let enumerator = SysfsEnumerator::default();
    let probe = BlkidProbe::new();
    let intake = DirectoryIntake::new(&dest, host.in_initrd());
    tracing::debug!("Writing units to {dest:?}");

    let status = Generator {
        config: &config,
        enumerator: &enumerator,
        probe: &probe,
        host: &host,
        intake: &intake,
    }
    .run();

    if status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
