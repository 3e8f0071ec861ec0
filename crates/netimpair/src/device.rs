//! Tunnel device interface.
//!
//! The scheduler depends only on a byte-oriented, pollable descriptor that
//! yields one packet per read and accepts one packet per write. Opening,
//! `ioctl`-configuring (`TUNSETIFF` and friends), and closing the real OS
//! tunnel device happens before construction; `RawTunnelDevice` below is a
//! thin wrapper around an already-open file descriptor so the core can stay
//! generic over the `TunnelDevice` trait and be driven by OS pipes in tests.

use std::io;
use std::os::fd::BorrowedFd;
use std::os::unix::io::{AsRawFd, RawFd};

use nix::unistd::{read, write};

use crate::packet::MAX_PKTSIZE;

/// A bidirectional, pollable, byte-oriented datagram descriptor.
pub trait TunnelDevice: AsRawFd {
    /// Read exactly one packet (up to `MAX_PKTSIZE` bytes, address-family
    /// prefix included). Returns `Ok(0)` on EOF/short read; the caller treats
    /// that as a read failure to be logged and skipped, not fatal.
    fn read_packet(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write exactly one packet, address-family prefix intact. Returns the
    /// number of bytes actually written; a short write is logged by the
    /// caller as a warning and counted as sent with the actual byte count.
    fn write_packet(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// A tunnel device backed by an already-open raw file descriptor (a real
/// `/dev/tunN` character device, or in tests, one end of a pipe/socketpair).
pub struct RawTunnelDevice {
    fd: RawFd,
}

impl RawTunnelDevice {
    /// Wrap an already-open, already-configured descriptor. Ownership of the
    /// fd (closing it on drop) is the caller's responsibility unless
    /// `into_owned` semantics are added.
    pub fn from_raw_fd(fd: RawFd) -> Self {
        Self { fd }
    }
}

impl AsRawFd for RawTunnelDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl TunnelDevice for RawTunnelDevice {
    fn read_packet(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        debug_assert!(buf.len() >= MAX_PKTSIZE);
        let borrowed = unsafe { BorrowedFd::borrow_raw(self.fd) };
        read(&borrowed, buf).map_err(io::Error::from)
    }

    fn write_packet(&mut self, buf: &[u8]) -> io::Result<usize> {
        let borrowed = unsafe { BorrowedFd::borrow_raw(self.fd) };
        write(&borrowed, buf).map_err(io::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::pipe;
    use std::os::unix::io::IntoRawFd;

    #[test]
    fn round_trips_bytes_unmodified_through_a_pipe() {
        let (read_fd, write_fd) = pipe().unwrap();
        let mut reader = RawTunnelDevice::from_raw_fd(read_fd.into_raw_fd());
        let mut writer = RawTunnelDevice::from_raw_fd(write_fd.into_raw_fd());

        let payload = [1u8, 2, 3, 4, 42, 43, 44];
        let n = writer.write_packet(&payload).unwrap();
        assert_eq!(n, payload.len());

        let mut buf = vec![0u8; MAX_PKTSIZE];
        let n = reader.read_packet(&mut buf).unwrap();
        assert_eq!(&buf[..n], &payload[..]);
    }
}
