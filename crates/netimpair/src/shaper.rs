//! Virtual transmission clock and fixed-delay application.
//!
//! `Shaper` owns `shape_time`, the wall-clock instant at which the most
//! recently admitted packet would finish transmitting over the virtual link
//! at the configured rate. New arrivals cannot depart before that virtual
//! line clears.

use std::time::{Duration, SystemTime};

/// Models the shaping + fixed-delay stage applied to every admitted packet.
pub struct Shaper {
    /// Bytes/sec the virtual link can sustain; 0 disables shaping.
    rate_bytes_per_sec: u64,
    /// Fixed propagation delay added to every packet.
    delay: Duration,
    /// Monotonically non-decreasing virtual transmission clock.
    shape_time: SystemTime,
}

/// Result of running a packet through the shaper: its computed departure
/// time, and whether it was shaped (had to wait behind the virtual line).
pub struct Timing {
    pub departure: SystemTime,
    pub shaped: bool,
}

impl Shaper {
    pub fn new(rate_bytes_per_sec: u64, delay: Duration) -> Self {
        Self {
            rate_bytes_per_sec,
            delay,
            shape_time: SystemTime::now(),
        }
    }

    /// Compute the scheduled departure time for a packet of `payload_len` bytes
    /// (address-family prefix already excluded) arriving at `now`.
    ///
    /// 1. If shaping is disabled or the virtual line has already cleared,
    ///    snap `shape_time` to `now`. Otherwise the packet is "shaped": it
    ///    must wait behind packets already queued on the virtual line.
    /// 2. The packet's departure base is `shape_time`.
    /// 3. If shaping is enabled, advance `shape_time` by `payload_len / rate`.
    /// 4. Add the fixed `delay` to the base to get the departure time.
    pub fn schedule(&mut self, payload_len: usize, now: SystemTime) -> Timing {
        let shaping_enabled = self.rate_bytes_per_sec > 0;
        let shaped = shaping_enabled && self.shape_time > now;

        if !shaping_enabled || self.shape_time <= now {
            self.shape_time = now;
        }

        let base = self.shape_time;

        if shaping_enabled {
            let secs = payload_len as f64 / self.rate_bytes_per_sec as f64;
            self.shape_time += Duration::from_secs_f64(secs);
        }

        Timing {
            departure: base + self.delay,
            shaped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shaping_disabled_departs_after_delay_only() {
        let now = SystemTime::now();
        let mut shaper = Shaper::new(0, Duration::from_millis(100));
        let t = shaper.schedule(1000, now);
        assert!(!t.shaped);
        assert_eq!(t.departure, now + Duration::from_millis(100));
    }

    #[test]
    fn first_packet_on_idle_line_is_not_shaped() {
        let now = SystemTime::now();
        let mut shaper = Shaper::new(1000, Duration::ZERO);
        let t = shaper.schedule(1000, now);
        assert!(!t.shaped);
        assert_eq!(t.departure, now);
    }

    #[test]
    fn back_to_back_packets_are_shaped_and_serialize() {
        let now = SystemTime::now();
        let mut shaper = Shaper::new(1000, Duration::ZERO); // 1000 B/s
        let first = shaper.schedule(1000, now);
        let second = shaper.schedule(1000, now);
        assert!(!first.shaped);
        assert!(second.shaped);
        assert_eq!(second.departure, now + Duration::from_secs(1));
    }

    #[test]
    fn shape_time_never_lags_real_time() {
        let t0 = SystemTime::now();
        let mut shaper = Shaper::new(1000, Duration::ZERO);
        let _ = shaper.schedule(1000, t0);
        // A much later arrival should snap shape_time forward, not depart
        // before `now`.
        let t1 = t0 + Duration::from_secs(10);
        let timing = shaper.schedule(1000, t1);
        assert!(!timing.shaped);
        assert_eq!(timing.departure, t1);
    }

    #[test]
    fn delay_is_added_on_top_of_shaping() {
        let now = SystemTime::now();
        let mut shaper = Shaper::new(1000, Duration::from_millis(50));
        let first = shaper.schedule(1000, now);
        let second = shaper.schedule(1000, now);
        assert_eq!(first.departure, now + Duration::from_millis(50));
        assert_eq!(
            second.departure,
            now + Duration::from_secs(1) + Duration::from_millis(50)
        );
    }
}
