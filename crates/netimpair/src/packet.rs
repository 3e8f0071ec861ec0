//! Packet buffer: opaque frame storage with length, sequence, and departure metadata.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::SystemTime;

/// Default buffer capacity: one tunnel MTU plus the 4-byte address-family prefix.
pub const MAX_PKTSIZE: usize = 2048;

/// Capacity for the alternate build that tolerates jumbograms.
pub const MAX_PKTSIZE_JUMBO: usize = 65544;

/// Bytes of leading address-family prefix every tunnel device frame carries.
pub const AF_PREFIX_LEN: usize = 4;

static NEXT_SEQ: AtomicU32 = AtomicU32::new(0);

/// Assigns the next sequence number from the process-wide monotone counter.
///
/// Wraps silently at `u32::MAX`; sequence numbers are diagnostic only and
/// never used as a uniqueness key.
fn next_seq() -> u32 {
    NEXT_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// An opaque frame read from (or destined for) the tunnel device.
///
/// `bytes` includes the 4-byte address-family prefix. No field is mutated
/// after enqueue except by dequeue/drop.
#[derive(Debug, Clone)]
pub struct Packet {
    pub bytes: Vec<u8>,
    pub seq: u32,
    pub departure: SystemTime,
}

impl Packet {
    /// Build a packet from bytes already read off the device, assigning the next
    /// sequence number. `departure` is filled in later by the shaper/delay stage.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            seq: next_seq(),
            departure: SystemTime::now(),
        }
    }

    /// Total length in bytes, including the address-family prefix.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Payload length excluding the 4-byte address-family prefix, used for
    /// shaping and bit-error-rate calculations. Saturates to 0 for runt frames.
    pub fn payload_len(&self) -> usize {
        self.len().saturating_sub(AF_PREFIX_LEN)
    }
}

/// A small free-list of packet buffers, recycled on dequeue to avoid a fresh
/// heap allocation per packet. `Scheduler::accept_arrival` takes the read
/// buffer from here and every exit path releases it back, except the one
/// where the buffer ends up owned by a queued `Packet` until it's reinjected.
#[derive(Default)]
pub struct PacketPool {
    free: Vec<Vec<u8>>,
}

impl PacketPool {
    pub fn new() -> Self {
        Self { free: Vec::new() }
    }

    /// Take a buffer from the pool (or allocate one) sized for `MAX_PKTSIZE`.
    pub fn take(&mut self) -> Vec<u8> {
        match self.free.pop() {
            Some(mut buf) => {
                buf.clear();
                buf.resize(MAX_PKTSIZE, 0);
                buf
            }
            None => vec![0u8; MAX_PKTSIZE],
        }
    }

    /// Return a packet's backing buffer to the pool for reuse.
    pub fn release(&mut self, packet: Packet) {
        if self.free.len() < 64 {
            self.free.push(packet.bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Packet::new(vec![0u8; 8]);
        let b = Packet::new(vec![0u8; 8]);
        assert!(b.seq > a.seq || b.seq == 0);
    }

    #[test]
    fn payload_len_subtracts_af_prefix() {
        let p = Packet::new(vec![0u8; 104]);
        assert_eq!(p.len(), 104);
        assert_eq!(p.payload_len(), 100);
    }

    #[test]
    fn payload_len_saturates_on_runt_frame() {
        let p = Packet::new(vec![0u8; 2]);
        assert_eq!(p.payload_len(), 0);
    }

    #[test]
    fn pool_recycles_buffers() {
        let mut pool = PacketPool::new();
        let buf = pool.take();
        assert_eq!(buf.len(), MAX_PKTSIZE);
        let p = Packet::new(buf);
        pool.release(p);
        let buf2 = pool.take();
        assert_eq!(buf2.len(), MAX_PKTSIZE);
    }
}
