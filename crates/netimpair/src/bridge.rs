//! Degenerate bridge mode: two devices, no delay, no shaping, no loss.
//!
//! `tunbridge` forwards packets in both directions between two tunnel
//! devices. Rather than a separate forwarding loop, each direction is driven
//! by the same `Scheduler` used for delay-mode, configured with a capacity-1
//! queue, no shaping, and no delay — read and write still pass through the
//! packet/queue/stats pipeline, just with the shaping and loss stages
//! effectively disabled. The two directions are independent pollable
//! descriptors, so each runs its own `Scheduler` on its own thread; a shared
//! `ControlSurface` lets `SIGINT`/`SIGHUP` stop both at once.

use std::io;
use std::os::fd::BorrowedFd;
use std::os::unix::io::{AsRawFd, RawFd};
use std::thread;
use std::time::Duration;

use netimpair_common::Result;

use crate::control::SharedControl;
use crate::device::TunnelDevice;
use crate::loss::LossMode;
use crate::scheduler::{Scheduler, SchedulerConfig};

/// A one-directional leg of the bridge: reads off `read_fd`, writes to
/// `write_fd`. Polling watches `read_fd` only, which is what `poll()` needs
/// to know when a new packet has arrived to forward.
pub struct BridgeLeg {
    read_fd: RawFd,
    write_fd: RawFd,
}

impl BridgeLeg {
    pub fn new(read_fd: RawFd, write_fd: RawFd) -> Self {
        Self { read_fd, write_fd }
    }
}

impl AsRawFd for BridgeLeg {
    fn as_raw_fd(&self) -> RawFd {
        self.read_fd
    }
}

impl TunnelDevice for BridgeLeg {
    fn read_packet(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let borrowed = unsafe { BorrowedFd::borrow_raw(self.read_fd) };
        nix::unistd::read(&borrowed, buf).map_err(io::Error::from)
    }

    fn write_packet(&mut self, buf: &[u8]) -> io::Result<usize> {
        let borrowed = unsafe { BorrowedFd::borrow_raw(self.write_fd) };
        nix::unistd::write(&borrowed, buf).map_err(io::Error::from)
    }
}

/// Configuration shared by both legs: always delay=0, shaping off, loss
/// off, qlim=1, regardless of what the caller passes for anything else.
fn bridge_scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        qlim: 1,
        delay: Duration::ZERO,
        shaping_bytes_per_sec: 0,
        report_interval: Duration::ZERO,
        seed: 0,
        loss: LossMode::Off,
        verbosity: 0,
    }
}

/// Run both directions of the bridge until `control` signals a stop.
/// Blocks until both legs' schedulers return.
pub fn run_bridge(fd_a: RawFd, fd_b: RawFd, control: SharedControl) -> Result<()> {
    let leg_a_to_b = BridgeLeg::new(fd_a, fd_b);
    let leg_b_to_a = BridgeLeg::new(fd_b, fd_a);

    let control_a = control.clone();
    let control_b = control;

    let handle_a = thread::spawn(move || {
        let mut scheduler = Scheduler::new(leg_a_to_b, bridge_scheduler_config(), control_a);
        scheduler.run()
    });
    let handle_b = thread::spawn(move || {
        let mut scheduler = Scheduler::new(leg_b_to_a, bridge_scheduler_config(), control_b);
        scheduler.run()
    });

    handle_a
        .join()
        .expect("bridge leg a->b thread panicked")?;
    handle_b
        .join()
        .expect("bridge leg b->a thread panicked")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::pipe;
    use std::os::unix::io::IntoRawFd;

    #[test]
    fn forwards_a_packet_from_one_leg_to_the_other() {
        // Pipes only carry data one direction, so a real bidirectional
        // tun-style fd isn't representable; this test exercises one leg's
        // forwarding via a pipe pair directly, independent of `run_bridge`'s
        // thread plumbing.
        let (in_rfd, in_wfd) = pipe().unwrap();
        let (out_rfd, out_wfd) = pipe().unwrap();

        let mut leg = BridgeLeg::new(in_rfd.into_raw_fd(), out_wfd.into_raw_fd());
        nix::unistd::write(&in_wfd, b"hello").unwrap();

        let mut buf = [0u8; 64];
        let n = leg.read_packet(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");

        let n = leg.write_packet(&buf[..n]).unwrap();
        assert_eq!(n, 5);

        let mut out = [0u8; 64];
        let n = nix::unistd::read(&out_rfd, &mut out).unwrap();
        assert_eq!(&out[..n], b"hello");
    }
}
