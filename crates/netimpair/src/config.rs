//! Validated, immutable configuration for the delay/shape/loss scheduler.
//!
//! Built once at startup from parsed CLI flags. Validation (range checks,
//! the bit-error-rate sanity clamp, mutual exclusivity of `-b`/`-p`) happens
//! here, before the event loop starts, producing a typed `Error::Config`
//! rather than a panic.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use netimpair_common::Error;

use crate::loss::{bit_error_rate_is_sane, scale_probability, LossMode};

/// Validated configuration for a delay-mode run.
///
/// Derives `Serialize`/`Deserialize` so a run's effective configuration can
/// be logged or embedded in diagnostic output alongside a stats report;
/// nothing in this crate reads it back from disk (persistence across
/// restarts is explicitly out of scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpairConfig {
    pub device_path: String,
    pub delay: Duration,
    pub qlim: usize,
    pub shaping_bytes_per_sec: u64,
    pub loss: LossMode,
    pub verbosity: i32,
    pub report_interval: Duration,
    pub seed: u64,
}

impl Default for ImpairConfig {
    fn default() -> Self {
        Self {
            device_path: "/dev/tun0".to_string(),
            delay: Duration::from_millis(200),
            qlim: 500,
            shaping_bytes_per_sec: 0,
            loss: LossMode::Off,
            verbosity: 0,
            report_interval: Duration::ZERO,
            seed: startup_seed(),
        }
    }
}

/// Default PRNG seed: startup wall-clock microseconds. Determinism across
/// runs is not required by default; pass `--seed` for reproducible tests.
fn startup_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Raw, not-yet-validated values as parsed straight off the CLI. Kept
/// separate from `ImpairConfig` so `build()` is the single place validation
/// happens and can return a typed error instead of panicking mid-parse.
#[derive(Debug, Clone, Default)]
pub struct RawArgs {
    pub device_path: String,
    pub delay_ms: u64,
    pub qlim: usize,
    pub shaping_rate: Option<String>,
    pub per_packet_loss: Option<f64>,
    pub per_bit_error_rate: Option<f64>,
    pub verbosity: i32,
    pub quiet: bool,
    pub report_interval_secs: u64,
    pub seed: Option<u64>,
}

impl RawArgs {
    /// Validate and build an `ImpairConfig`, or return a `Config` error
    /// describing the first problem found.
    pub fn build(self) -> Result<ImpairConfig, Error> {
        if self.per_packet_loss.is_some() && self.per_bit_error_rate.is_some() {
            return Err(Error::Config(
                "-b (per-bit error rate) and -p (per-packet loss) are mutually exclusive"
                    .to_string(),
            ));
        }

        let loss = if let Some(rate) = self.per_bit_error_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(Error::Config(format!(
                    "per-bit error rate {rate} must be in [0, 1]"
                )));
            }
            if !bit_error_rate_is_sane(rate) {
                return Err(Error::Config(format!(
                    "per-bit error rate {rate} is too large: rate * 1500 * 8 must be < 2^31"
                )));
            }
            LossMode::PerBit {
                threshold: scale_probability(rate),
            }
        } else if let Some(prob) = self.per_packet_loss {
            if !(0.0..=1.0).contains(&prob) {
                return Err(Error::Config(format!(
                    "per-packet loss probability {prob} must be in [0, 1]"
                )));
            }
            LossMode::PerPacket {
                threshold: scale_probability(prob),
            }
        } else {
            LossMode::Off
        };

        let shaping_bytes_per_sec = match self.shaping_rate {
            Some(s) => parse_shaping_rate(&s)?,
            None => 0,
        };

        if self.qlim == 0 {
            return Err(Error::Config("queue capacity -l must be at least 1".to_string()));
        }

        let verbosity = if self.quiet { -1 } else { self.verbosity };

        Ok(ImpairConfig {
            device_path: if self.device_path.is_empty() {
                "/dev/tun0".to_string()
            } else {
                self.device_path
            },
            delay: Duration::from_millis(self.delay_ms),
            qlim: self.qlim,
            shaping_bytes_per_sec,
            loss,
            verbosity,
            report_interval: if self.quiet {
                Duration::ZERO
            } else {
                Duration::from_secs(self.report_interval_secs)
            },
            seed: self.seed.unwrap_or_else(startup_seed),
        })
    }
}

/// Parse a `-s` shaping rate in bits/sec with an optional SI suffix
/// (`b`, `Kb`, `Mb`, `Gb`), dividing by 8 to get bytes/sec.
pub fn parse_shaping_rate(input: &str) -> Result<u64, Error> {
    let input = input.trim();
    let (number, multiplier) = if let Some(n) = input.strip_suffix("Gb") {
        (n, 1_000_000_000u64)
    } else if let Some(n) = input.strip_suffix("Mb") {
        (n, 1_000_000u64)
    } else if let Some(n) = input.strip_suffix("Kb") {
        (n, 1_000u64)
    } else if let Some(n) = input.strip_suffix('b') {
        (n, 1u64)
    } else {
        (input, 1u64)
    };

    let bits_per_sec: f64 = number
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid shaping rate: {input}")))?;

    if bits_per_sec < 0.0 {
        return Err(Error::Config(format!("shaping rate must not be negative: {input}")));
    }

    let bits_per_sec = bits_per_sec * multiplier as f64;
    Ok((bits_per_sec / 8.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_bits_per_sec() {
        assert_eq!(parse_shaping_rate("8000b").unwrap(), 1000);
        assert_eq!(parse_shaping_rate("8000").unwrap(), 1000);
    }

    #[test]
    fn parses_si_suffixes() {
        assert_eq!(parse_shaping_rate("8Kb").unwrap(), 1000);
        assert_eq!(parse_shaping_rate("8Mb").unwrap(), 1_000_000);
        assert_eq!(parse_shaping_rate("8Gb").unwrap(), 1_000_000_000);
    }

    #[test]
    fn rejects_garbage_rate() {
        assert!(parse_shaping_rate("not-a-rate").is_err());
    }

    #[test]
    fn mutually_exclusive_loss_modes_rejected() {
        let raw = RawArgs {
            per_packet_loss: Some(0.1),
            per_bit_error_rate: Some(0.1),
            qlim: 500,
            ..Default::default()
        };
        assert!(raw.build().is_err());
    }

    #[test]
    fn oversized_bit_error_rate_rejected() {
        let raw = RawArgs {
            per_bit_error_rate: Some(0.9),
            qlim: 500,
            ..Default::default()
        };
        assert!(raw.build().is_err());
    }

    #[test]
    fn qlim_zero_rejected() {
        let raw = RawArgs {
            qlim: 0,
            ..Default::default()
        };
        assert!(raw.build().is_err());
    }

    #[test]
    fn quiet_disables_verbosity_and_periodic_reports() {
        let raw = RawArgs {
            qlim: 500,
            quiet: true,
            report_interval_secs: 5,
            ..Default::default()
        };
        let cfg = raw.build().unwrap();
        assert_eq!(cfg.verbosity, -1);
        assert_eq!(cfg.report_interval, Duration::ZERO);
    }

    #[test]
    fn defaults_match_cli_surface_defaults() {
        let cfg = ImpairConfig::default();
        assert_eq!(cfg.device_path, "/dev/tun0");
        assert_eq!(cfg.delay, Duration::from_millis(200));
        assert_eq!(cfg.qlim, 500);
        assert_eq!(cfg.shaping_bytes_per_sec, 0);
    }
}
