//! Single-threaded, poll-driven event loop tying the packet buffer, delay
//! queue, shaper, loss emulator, stats collector, and control surface
//! together around a `TunnelDevice`.
//!
//! Every iteration:
//!   1. compute how long to block: until the queue head is due, or the next
//!      periodic report, whichever is sooner; block indefinitely if both are
//!      absent;
//!   2. `poll()` the device for readability, restarting on `EINTR`;
//!   3. sample `now` once, after `poll` returns, and use that single sample
//!      for every time comparison this iteration;
//!   4. drain every packet at the head of the queue whose departure is
//!      `<= now`, writing each to the device;
//!   5. if the device was readable, accept at most one new arrival: run it
//!      through the loss emulator, then the shaper, then enqueue it (or
//!      tail-drop on a full queue);
//!   6. emit a periodic report if the interval has elapsed, or an immediate
//!      one if a `SIGUSR1` dump was requested;
//!   7. stop cleanly (flushing the queue) once `ControlSurface::stop_requested`
//!      is observed, which only happens at an iteration boundary, never
//!      inside a signal handler.

use std::os::unix::io::AsRawFd;
use std::time::{Duration, SystemTime};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, info, trace, warn};

use netimpair_common::{Error, Result};

use crate::control::SharedControl;
use crate::device::TunnelDevice;
use crate::loss::LossEmulator;
use crate::packet::{Packet, PacketPool};
use crate::queue::DelayQueue;
use crate::shaper::Shaper;
use crate::stats::{format_report, StatsCollector};

/// Everything the loop needs beyond the device itself.
pub struct SchedulerConfig {
    pub qlim: usize,
    pub delay: Duration,
    pub shaping_bytes_per_sec: u64,
    pub report_interval: Duration,
    pub seed: u64,
    pub loss: crate::loss::LossMode,
    /// Verbosity level from the CLI surface; `>= 2` dumps packet bytes at
    /// `trace` level on every read and write.
    pub verbosity: i32,
}

/// Drives a single `TunnelDevice` through the shape/delay/loss/queue pipeline.
pub struct Scheduler<D: TunnelDevice> {
    device: D,
    queue: DelayQueue,
    shaper: Shaper,
    loss: LossEmulator,
    stats: StatsCollector,
    control: SharedControl,
    report_interval: Duration,
    last_report: SystemTime,
    pool: PacketPool,
    verbosity: i32,
}

impl<D: TunnelDevice> Scheduler<D> {
    pub fn new(device: D, config: SchedulerConfig, control: SharedControl) -> Self {
        Self {
            device,
            queue: DelayQueue::new(config.qlim),
            shaper: Shaper::new(config.shaping_bytes_per_sec, config.delay),
            loss: LossEmulator::new(config.loss, config.seed),
            stats: StatsCollector::new(),
            control,
            report_interval: config.report_interval,
            last_report: SystemTime::now(),
            pool: PacketPool::new(),
            verbosity: config.verbosity,
        }
    }

    /// Run until `ControlSurface::stop_requested()` is observed, then flush
    /// the queue and return.
    pub fn run(&mut self) -> Result<()> {
        loop {
            if self.control.stop_requested() {
                break;
            }

            let timeout_ms = self.compute_timeout_ms();
            match self.poll_device(timeout_ms) {
                Ok(readable) => {
                    let now = SystemTime::now();
                    self.drain_ready(now);
                    if readable {
                        self.accept_arrival(now);
                    }
                    self.maybe_report(now);
                }
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(Error::Poll(e)),
            }
        }

        self.queue.flush();
        info!("stop requested, queue flushed");
        Ok(())
    }

    /// Milliseconds to block in `poll`: until the queue head is due, capped
    /// by the next periodic report, or `-1` (block indefinitely) if neither
    /// applies.
    fn compute_timeout_ms(&self) -> i32 {
        let now = SystemTime::now();

        let until_head = self.queue.head_departure().map(|dep| {
            dep.duration_since(now).unwrap_or(Duration::ZERO)
        });

        let until_report = if self.report_interval.is_zero() {
            None
        } else {
            let elapsed = now.duration_since(self.last_report).unwrap_or(Duration::ZERO);
            Some(self.report_interval.saturating_sub(elapsed))
        };

        let shortest = match (until_head, until_report) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };

        match shortest {
            Some(d) => d.as_millis().min(i32::MAX as u128) as i32,
            None => -1,
        }
    }

    /// Poll the device for readability, restarting transparently on `EINTR`
    /// is left to the caller (it needs to re-check `stop_requested` between
    /// retries).
    fn poll_device(&mut self, timeout_ms: i32) -> std::result::Result<bool, Errno> {
        let borrowed = unsafe {
            std::os::fd::BorrowedFd::borrow_raw(self.device.as_raw_fd())
        };
        let mut fds = [PollFd::new(&borrowed, PollFlags::POLLIN)];
        // `PollTimeout` only holds a u16 of milliseconds; clamp rather than
        // overflow. A clamped timeout just means an extra spurious wake-up
        // before `compute_timeout_ms` recomputes the real remaining wait, so
        // this is safe for report intervals or queue gaps longer than ~65s.
        let timeout = if timeout_ms < 0 {
            PollTimeout::NONE
        } else {
            PollTimeout::from(timeout_ms.min(u16::MAX as i32) as u16)
        };
        let n = poll(&mut fds, timeout)?;
        if n <= 0 {
            return Ok(false);
        }
        let revents = fds[0].revents().unwrap_or_else(PollFlags::empty);
        Ok(revents.contains(PollFlags::POLLIN))
    }

    /// Write every packet at the head of the queue whose departure is due.
    fn drain_ready(&mut self, now: SystemTime) {
        while let Some(dep) = self.queue.head_departure() {
            if dep > now {
                break;
            }
            let packet = self.queue.dequeue().expect("head_departure implies dequeue succeeds");
            self.reinject(packet, now);
        }
    }

    fn reinject(&mut self, packet: Packet, now: SystemTime) {
        let discrepancy_ms = now
            .duration_since(packet.departure)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;

        if self.verbosity >= 2 {
            trace!(seq = packet.seq, bytes = ?packet.bytes, "reinjecting packet");
        }

        match self.device.write_packet(&packet.bytes) {
            Ok(n) if n == packet.bytes.len() => {
                self.stats.record_sent(n, discrepancy_ms);
            }
            Ok(n) => {
                warn!(written = n, expected = packet.bytes.len(), "short write to tunnel device");
                self.stats.record_sent(n, discrepancy_ms);
            }
            Err(e) => {
                warn!(error = %e, "write to tunnel device failed, packet lost");
            }
        }

        self.pool.release(packet);
    }

    /// Read and admit at most one arrival per iteration. The read buffer
    /// comes from `pool` rather than a fresh allocation; it's returned to
    /// the pool on every exit path (loss, overflow) except the one where it
    /// ends up owned by the queue.
    fn accept_arrival(&mut self, now: SystemTime) {
        let mut buf = self.pool.take();
        let n = match self.device.read_packet(&mut buf) {
            Ok(0) => return,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "read from tunnel device failed");
                return;
            }
        };
        buf.truncate(n);

        let packet = Packet::new(buf);
        self.stats.record_received(packet.len());

        if self.verbosity >= 2 {
            trace!(seq = packet.seq, bytes = ?packet.bytes, "accepted arrival");
        }

        if self.loss.should_drop(packet.payload_len()) {
            self.stats.record_dropped();
            debug!(seq = packet.seq, "packet dropped by loss emulator");
            self.pool.release(packet);
            return;
        }

        let timing = self.shaper.schedule(packet.payload_len(), now);
        if timing.shaped {
            self.stats.record_shaped();
        }

        let mut packet = packet;
        packet.departure = timing.departure;

        if let Err(dropped) = self.queue.enqueue(packet) {
            self.stats.record_dropped();
            debug!(seq = dropped.seq, "packet tail-dropped, queue full");
            self.pool.release(dropped);
        }
    }

    fn maybe_report(&mut self, now: SystemTime) {
        let interval_elapsed = !self.report_interval.is_zero()
            && now.duration_since(self.last_report).unwrap_or(Duration::ZERO) >= self.report_interval;
        let dump_requested = self.control.take_dump_requested();

        if interval_elapsed || dump_requested {
            let report = self.stats.report(now, self.queue.len());
            info!("{}", format_report(&report));
            self.last_report = now;
        }
    }
}
