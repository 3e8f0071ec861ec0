//! Delay queue: a bounded FIFO of packets, ordered by scheduled departure time.
//!
//! Because every enqueued packet's departure is `max(now, shape_clock) + delay`,
//! `shape_clock` is non-decreasing, and `delay` is constant, enqueue order equals
//! departure-time order (see `Scheduler`/`Shaper`). A plain FIFO therefore suffices;
//! the head is always the next packet to become ready. This is a load-bearing
//! invariant — a future extension that introduces per-packet jitter would need a
//! min-heap keyed on departure time instead.

use std::collections::VecDeque;
use std::time::SystemTime;

use crate::packet::Packet;

/// Bounded FIFO of packets awaiting reinjection, with tail-drop overflow policy.
pub struct DelayQueue {
    items: VecDeque<Packet>,
    qlim: usize,
}

impl DelayQueue {
    pub fn new(qlim: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(qlim.min(1024)),
            qlim,
        }
    }

    /// Append `packet` to the tail. Returns `Err(packet)` if the queue is already
    /// at capacity — the caller is expected to treat this as a tail-drop and
    /// increment its dropped counter; already-queued packets are never evicted.
    pub fn enqueue(&mut self, packet: Packet) -> Result<(), Packet> {
        if self.items.len() >= self.qlim {
            return Err(packet);
        }
        self.items.push_back(packet);
        Ok(())
    }

    /// Remove and return the head of the queue, if any.
    pub fn dequeue(&mut self) -> Option<Packet> {
        self.items.pop_front()
    }

    /// Peek the head's scheduled departure time without removing it.
    pub fn head_departure(&self) -> Option<SystemTime> {
        self.items.front().map(|p| p.departure)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.qlim
    }

    /// Drop all queued packets, e.g. at shutdown.
    pub fn flush(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn packet_at(t: SystemTime) -> Packet {
        let mut p = Packet::new(vec![0u8; 16]);
        p.departure = t;
        p
    }

    #[test]
    fn enqueue_dequeue_is_fifo() {
        let mut q = DelayQueue::new(4);
        let now = SystemTime::now();
        q.enqueue(packet_at(now)).unwrap();
        q.enqueue(packet_at(now + Duration::from_millis(1))).unwrap();
        let first = q.dequeue().unwrap();
        let second = q.dequeue().unwrap();
        assert!(first.departure <= second.departure);
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn overflow_tail_drops_new_arrival() {
        let mut q = DelayQueue::new(2);
        let now = SystemTime::now();
        q.enqueue(packet_at(now)).unwrap();
        q.enqueue(packet_at(now)).unwrap();
        let rejected = q.enqueue(packet_at(now));
        assert!(rejected.is_err());
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut q = DelayQueue::new(3);
        let now = SystemTime::now();
        for _ in 0..10 {
            let _ = q.enqueue(packet_at(now));
            assert!(q.len() <= q.capacity());
        }
    }

    #[test]
    fn head_departure_tracks_front() {
        let mut q = DelayQueue::new(4);
        assert!(q.head_departure().is_none());
        let now = SystemTime::now();
        q.enqueue(packet_at(now)).unwrap();
        assert_eq!(q.head_departure(), Some(now));
    }

    #[test]
    fn flush_drops_everything() {
        let mut q = DelayQueue::new(4);
        let now = SystemTime::now();
        q.enqueue(packet_at(now)).unwrap();
        q.enqueue(packet_at(now)).unwrap();
        q.flush();
        assert_eq!(q.len(), 0);
    }
}
