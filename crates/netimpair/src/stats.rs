//! Cumulative counters and periodic delta reporting.

use std::time::SystemTime;

/// Cumulative counters, incremented in place by the scheduler and loss
/// emulator. All counters are 64-bit; wraparound is not a concern at
/// realistic rates.
#[derive(Debug, Clone)]
pub struct Stats {
    pub time: SystemTime,
    pub rcvd_packets: u64,
    pub rcvd_bytes: u64,
    pub sent_packets: u64,
    pub sent_bytes: u64,
    pub shaped: u64,
    pub dropped: u64,
    /// Sum, in milliseconds, of `now - head.departure` over every reinjected packet.
    pub discrepancy_ms_sum: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            time: SystemTime::now(),
            rcvd_packets: 0,
            rcvd_bytes: 0,
            sent_packets: 0,
            sent_bytes: 0,
            shaped: 0,
            dropped: 0,
            discrepancy_ms_sum: 0,
        }
    }
}

/// A delta report computed between two `Stats` snapshots.
#[derive(Debug, Clone)]
pub struct Report {
    pub interval: std::time::Duration,
    pub rcvd_packets: u64,
    pub rcvd_bytes: u64,
    pub sent_packets: u64,
    pub sent_bytes: u64,
    pub shaped: u64,
    pub dropped: u64,
    pub queue_len: usize,
    /// Average throughput over the interval, in bits/sec.
    pub throughput_bps: f64,
    /// Average discrepancy over sent packets in the interval, in milliseconds.
    pub avg_discrepancy_ms: f64,
}

/// Tracks cumulative counters plus the last-reported snapshot needed to
/// compute deltas.
pub struct StatsCollector {
    current: Stats,
    last: Stats,
}

impl StatsCollector {
    pub fn new() -> Self {
        let initial = Stats::default();
        Self {
            current: initial.clone(),
            last: initial,
        }
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.current.rcvd_packets += 1;
        self.current.rcvd_bytes += bytes as u64;
    }

    pub fn record_shaped(&mut self) {
        self.current.shaped += 1;
    }

    pub fn record_dropped(&mut self) {
        self.current.dropped += 1;
    }

    pub fn record_sent(&mut self, bytes: usize, discrepancy_ms: u64) {
        self.current.sent_packets += 1;
        self.current.sent_bytes += bytes as u64;
        self.current.discrepancy_ms_sum += discrepancy_ms;
    }

    pub fn snapshot(&self) -> &Stats {
        &self.current
    }

    /// Compute a delta report against the last snapshot, queue occupancy
    /// supplied by the caller, then roll `last` forward to the current
    /// snapshot (`now`).
    pub fn report(&mut self, now: SystemTime, queue_len: usize) -> Report {
        let interval = now
            .duration_since(self.last.time)
            .unwrap_or(std::time::Duration::ZERO);

        let d_rcvd_packets = self.current.rcvd_packets - self.last.rcvd_packets;
        let d_rcvd_bytes = self.current.rcvd_bytes - self.last.rcvd_bytes;
        let d_sent_packets = self.current.sent_packets - self.last.sent_packets;
        let d_sent_bytes = self.current.sent_bytes - self.last.sent_bytes;
        let d_shaped = self.current.shaped - self.last.shaped;
        let d_dropped = self.current.dropped - self.last.dropped;
        let d_discrepancy = self.current.discrepancy_ms_sum - self.last.discrepancy_ms_sum;

        let throughput_bps = if interval.as_secs_f64() > 0.0 {
            (d_sent_bytes * 8) as f64 / interval.as_secs_f64()
        } else {
            0.0
        };

        let avg_discrepancy_ms = if d_sent_packets > 0 {
            d_discrepancy as f64 / d_sent_packets as f64
        } else {
            0.0
        };

        self.current.time = now;
        self.last = self.current.clone();

        Report {
            interval,
            rcvd_packets: d_rcvd_packets,
            rcvd_bytes: d_rcvd_bytes,
            sent_packets: d_sent_packets,
            sent_bytes: d_sent_bytes,
            shaped: d_shaped,
            dropped: d_dropped,
            queue_len,
            throughput_bps,
            avg_discrepancy_ms,
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a report as plain, human-readable text with no stable machine
/// format.
pub fn format_report(report: &Report) -> String {
    format!(
        "recv={}pkts/{}B sent={}pkts/{}B shaped={} dropped={} queue={} \
         throughput={:.1}bps avg_discrepancy={:.2}ms over {:.3}s",
        report.rcvd_packets,
        report.rcvd_bytes,
        report.sent_packets,
        report.sent_bytes,
        report.shaped,
        report.dropped,
        report.queue_len,
        report.throughput_bps,
        report.avg_discrepancy_ms,
        report.interval.as_secs_f64(),
    )
}
