//! `netimpair`: delay/shape/loss emulator CLI entrypoint.
//!
//! Parses flags into `RawArgs`, validates them into an `ImpairConfig`,
//! opens the tunnel device, installs signal handlers, and drives the
//! scheduler until a stop is requested.

use std::fs::OpenOptions;
use std::os::unix::io::IntoRawFd;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use netimpair::{
    control::ControlSurface, device::RawTunnelDevice, config::RawArgs, scheduler::{Scheduler, SchedulerConfig},
};
use netimpair_common::Error;

/// Userspace tunnel-interposed network impairment emulator: delay, shaping,
/// loss and bounded queueing.
#[derive(Parser)]
#[command(name = "netimpair")]
#[command(about = "Delay/shape/loss network impairment emulator over a tunnel device")]
#[command(version)]
struct Cli {
    /// Tunnel device path
    #[arg(short = 'n', long = "device", default_value = "/dev/tun0")]
    device: String,

    /// Fixed propagation delay in milliseconds
    #[arg(short = 'd', long = "delay-ms", default_value_t = 200)]
    delay_ms: u64,

    /// Queue capacity in packets
    #[arg(short = 'l', long = "qlim", default_value_t = 500)]
    qlim: usize,

    /// Shaping rate in bits/sec, optionally suffixed b|Kb|Mb|Gb
    #[arg(short = 's', long = "shaping")]
    shaping: Option<String>,

    /// Per-packet loss probability in [0, 1]
    #[arg(short = 'p', long = "loss-prob")]
    loss_prob: Option<f64>,

    /// Per-bit error rate in [0, 1]
    #[arg(short = 'b', long = "bit-error-rate")]
    bit_error_rate: Option<f64>,

    /// Quiet: disable periodic stats reporting
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Increase verbosity (stackable; -vv dumps packet bytes)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Periodic stats report interval in seconds (0 disables)
    #[arg(short = 'r', long = "report-interval", default_value_t = 0)]
    report_interval_secs: u64,

    /// PRNG seed for the loss emulator (defaults to startup time)
    #[arg(long = "seed")]
    seed: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        })
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

fn run(cli: Cli) -> Result<(), Error> {
    let raw = RawArgs {
        device_path: cli.device,
        delay_ms: cli.delay_ms,
        qlim: cli.qlim,
        shaping_rate: cli.shaping,
        per_packet_loss: cli.loss_prob,
        per_bit_error_rate: cli.bit_error_rate,
        verbosity: cli.verbose as i32,
        quiet: cli.quiet,
        report_interval_secs: cli.report_interval_secs,
        seed: cli.seed,
    };
    let config = raw.build()?;

    info!(
        device = %config.device_path,
        delay_ms = config.delay.as_millis() as u64,
        qlim = config.qlim,
        shaping_bytes_per_sec = config.shaping_bytes_per_sec,
        "starting netimpair"
    );

    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&config.device_path)
        .map_err(|source| Error::Device {
            path: config.device_path.clone(),
            source,
        })?
        .into_raw_fd();
    let device = RawTunnelDevice::from_raw_fd(fd);

    let control = Arc::new(ControlSurface::new());
    control
        .install_signal_handlers()
        .map_err(Error::Poll)?;

    let scheduler_config = SchedulerConfig {
        qlim: config.qlim,
        delay: config.delay,
        shaping_bytes_per_sec: config.shaping_bytes_per_sec,
        report_interval: config.report_interval,
        seed: config.seed,
        loss: config.loss,
        verbosity: config.verbosity,
    };

    let mut scheduler = Scheduler::new(device, scheduler_config, control);
    scheduler.run()?;

    info!("stopped cleanly");
    Ok(())
}
