//! Loss emulator: per-packet or per-bit-error-rate drop decisions.
//!
//! Probabilities are stored as fixed-point 31-bit thresholds compared against
//! a uniform PRNG draw, rather than drawing a fresh `f64` per packet.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// 2^31, the width of the fixed-point probability space.
pub const THRESHOLD_SCALE: u64 = 1 << 31;

/// Configured loss behavior. At most one mode is active; per-bit mode takes
/// precedence over per-packet mode if both were somehow set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum LossMode {
    Off,
    /// Fixed per-packet drop probability, pre-scaled to a 31-bit threshold.
    PerPacket { threshold: u32 },
    /// Per-bit error rate, pre-scaled to a 31-bit threshold; compared against
    /// `threshold * payload_bits`.
    PerBit { threshold: u32 },
}

pub struct LossEmulator {
    mode: LossMode,
    rng: StdRng,
}

impl LossEmulator {
    pub fn new(mode: LossMode, seed: u64) -> Self {
        Self {
            mode,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw a uniform 31-bit integer from the PRNG.
    fn draw(&mut self) -> u64 {
        (self.rng.gen::<u32>() >> 1) as u64
    }

    /// Decide whether to drop a packet of `payload_len` bytes (address-family
    /// prefix already excluded).
    pub fn should_drop(&mut self, payload_len: usize) -> bool {
        match self.mode {
            LossMode::Off => false,
            LossMode::PerPacket { threshold } => self.draw() < threshold as u64,
            LossMode::PerBit { threshold } => {
                let bits = payload_len as u64 * 8;
                let effective = (threshold as u64).saturating_mul(bits);
                self.draw() < effective.min(THRESHOLD_SCALE)
            }
        }
    }
}

/// Pre-scale a probability in `[0, 1]` to a 31-bit fixed-point threshold.
pub fn scale_probability(p: f64) -> u32 {
    (p.clamp(0.0, 1.0) * THRESHOLD_SCALE as f64) as u32
}

/// Configuration-time sanity check for per-bit error rate: reject if the
/// precomputed 31-bit threshold (`bit_err = rate * 2^31`) would saturate or
/// overflow the fixed-point threshold space for a maximum-size ~1500-byte
/// frame, i.e. if `bit_err * 1500 * 8 >= 2^31` (equivalently `rate >= 1/12000`).
/// The clamp is applied to the precomputed threshold, not the raw float rate,
/// since it's `bit_err` that actually gets multiplied by `payload_bits` in
/// `should_drop`.
pub fn bit_error_rate_is_sane(rate: f64) -> bool {
    let threshold = scale_probability(rate) as u64;
    threshold.saturating_mul(1500 * 8) < THRESHOLD_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_never_drops() {
        let mut e = LossEmulator::new(LossMode::Off, 1);
        for _ in 0..1000 {
            assert!(!e.should_drop(1000));
        }
    }

    #[test]
    fn full_probability_always_drops() {
        let threshold = scale_probability(1.0);
        let mut e = LossEmulator::new(LossMode::PerPacket { threshold }, 1);
        for _ in 0..1000 {
            assert!(e.should_drop(1000));
        }
    }

    #[test]
    fn zero_probability_never_drops() {
        let threshold = scale_probability(0.0);
        let mut e = LossEmulator::new(LossMode::PerPacket { threshold }, 1);
        for _ in 0..1000 {
            assert!(!e.should_drop(1000));
        }
    }

    #[test]
    fn per_packet_drop_fraction_converges_to_configured_rate() {
        let p = 0.2;
        let threshold = scale_probability(p);
        let mut e = LossEmulator::new(LossMode::PerPacket { threshold }, 42);
        let n = 50_000;
        let dropped = (0..n).filter(|_| e.should_drop(1000)).count();
        let fraction = dropped as f64 / n as f64;
        assert!((fraction - p).abs() < 0.02, "fraction={fraction}");
    }

    #[test]
    fn per_bit_drop_fraction_converges_to_min_one_b_times_l() {
        let ber = 0.00001;
        let threshold = scale_probability(ber);
        let payload_len = 125; // 1000 bits
        let mut e = LossEmulator::new(LossMode::PerBit { threshold }, 7);
        let n = 50_000;
        let dropped = (0..n).filter(|_| e.should_drop(payload_len)).count();
        let fraction = dropped as f64 / n as f64;
        let expected = (ber * (payload_len * 8) as f64).min(1.0);
        assert!((fraction - expected).abs() < 0.02, "fraction={fraction}");
    }

    #[test]
    fn sanity_clamp_rejects_too_large_bit_error_rate() {
        // Sane: well under the rate * 1500 * 8 < 1 bound (rate < ~8.3e-5).
        assert!(bit_error_rate_is_sane(0.00001));
        // Insane: comfortably over the bound.
        assert!(!bit_error_rate_is_sane(0.0001));
    }
}
