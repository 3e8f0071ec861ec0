//! `tunbridge`: zero-impairment bridge between two tunnel devices.
//!
//! Opens both device paths, then hands their descriptors to
//! `netimpair::bridge::run_bridge`, which forwards packets in both
//! directions through the same scheduler core used by `netimpair`,
//! configured as the degenerate delay=0/shaping-off/loss=0/qlim=1 case.

use std::fs::OpenOptions;
use std::os::unix::io::IntoRawFd;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use netimpair::{bridge::run_bridge, control::ControlSurface};
use netimpair_common::Error;

/// Zero-impairment bridge between two tunnel devices.
#[derive(Parser)]
#[command(name = "tunbridge")]
#[command(about = "Forward packets between two tunnel devices with no delay, shaping, or loss")]
#[command(version)]
struct Cli {
    /// First tunnel device path
    device_a: String,

    /// Second tunnel device path
    device_b: String,

    /// Quiet: suppress info-level logging
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn open_device(path: &str) -> Result<std::os::unix::io::RawFd, Error> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map(IntoRawFd::into_raw_fd)
        .map_err(|source| Error::Device {
            path: path.to_string(),
            source,
        })
}

fn run(cli: Cli) -> Result<(), Error> {
    let fd_a = open_device(&cli.device_a)?;
    let fd_b = open_device(&cli.device_b)?;

    info!(a = %cli.device_a, b = %cli.device_b, "bridging tunnel devices");

    let control = Arc::new(ControlSurface::new());
    control.install_signal_handlers().map_err(Error::Poll)?;

    run_bridge(fd_a, fd_b, control)?;

    info!("stopped cleanly");
    Ok(())
}
