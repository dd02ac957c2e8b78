//! Time-ordered MIDI event queue between input threads and the audio thread.
//!
//! ```text
//! input threads                         audio thread
//!     │                                      │
//!     ▼                                      ▼
//! MidiProducer ──ArrayQueue (bounded)──▶ MidiConsumer
//!   enqueue()     force_push drops         pending heap ordered by
//!                 the oldest entry         (time, enqueue sequence)
//!                                          drain_up_to(block_end)
//! ```
//!
//! The hand-off is a fixed-capacity lock-free queue. When it is full the
//! producer displaces the oldest pending event and bumps the dropped counter
//! instead of waiting. The consumer moves handed-off events into a binary heap
//! whose storage is reserved up front, so draining never allocates. If the
//! heap is full too, the earliest-enqueued event is evicted, the same policy
//! as the hand-off.

use crate::event::{MidiEvent, ScheduledEvent};
use crossbeam::queue::ArrayQueue;
use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default hand-off capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug)]
struct Pending {
    seq: u64,
    scheduled: ScheduledEvent,
}

impl Pending {
    #[inline]
    fn key(&self) -> (u64, u64) {
        (self.scheduled.time, self.seq)
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.key().cmp(&other.key())
    }
}

struct Shared {
    handoff: ArrayQueue<Pending>,
    next_seq: AtomicU64,
    dropped: AtomicU64,
}

/// Outcome of [`MidiProducer::enqueue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// The queue was full; the oldest pending event was dropped to make room.
    DroppedOldest,
}

/// Creates a queue with the given hand-off capacity.
///
/// # Panics
/// Panics if `capacity` is zero.
pub fn midi_queue(capacity: usize) -> (MidiProducer, MidiConsumer) {
    assert!(capacity > 0, "MIDI queue capacity must be non-zero");
    let shared = Arc::new(Shared {
        handoff: ArrayQueue::new(capacity),
        next_seq: AtomicU64::new(0),
        dropped: AtomicU64::new(0),
    });
    let producer = MidiProducer {
        shared: Arc::clone(&shared),
    };
    let consumer = MidiConsumer {
        shared,
        pending: BinaryHeap::with_capacity(capacity),
        capacity,
    };
    (producer, consumer)
}

/// Producer side. Cheap to clone; every clone feeds the same consumer.
#[derive(Clone)]
pub struct MidiProducer {
    shared: Arc<Shared>,
}

impl MidiProducer {
    /// Schedules `event` for plugin `target` at absolute sample `time`.
    ///
    /// Never blocks. Events with equal `time` are delivered in the order they
    /// were enqueued.
    pub fn enqueue(&self, time: u64, target: u64, event: MidiEvent) -> Enqueued {
        self.enqueue_scheduled(ScheduledEvent::new(time, target, event))
    }

    pub fn enqueue_scheduled(&self, scheduled: ScheduledEvent) -> Enqueued {
        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        match self.shared.handoff.force_push(Pending { seq, scheduled }) {
            None => Enqueued::Queued,
            Some(_displaced) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                Enqueued::DroppedOldest
            }
        }
    }

    /// Total events dropped because a buffer was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.shared.handoff.capacity()
    }
}

impl std::fmt::Debug for MidiProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiProducer")
            .field("capacity", &self.capacity())
            .field("in_flight", &self.shared.handoff.len())
            .field("dropped", &self.dropped())
            .finish()
    }
}

/// Consumer side, owned by the audio thread.
pub struct MidiConsumer {
    shared: Arc<Shared>,
    pending: BinaryHeap<Reverse<Pending>>,
    capacity: usize,
}

impl MidiConsumer {
    /// Moves every event with `time < block_end` into `out`, ordered by time
    /// and then by enqueue order. Returns the number of events written.
    ///
    /// RT-safe as long as `out` has spare capacity: events that do not fit in
    /// `out` stay queued for the next call rather than growing the vector.
    pub fn drain_up_to(&mut self, block_end: u64, out: &mut Vec<ScheduledEvent>) -> usize {
        self.collect_handoff();

        let mut written = 0;
        while out.len() < out.capacity() {
            match self.pending.peek() {
                Some(Reverse(next)) if next.scheduled.time < block_end => {}
                _ => break,
            }
            if let Some(Reverse(next)) = self.pending.pop() {
                out.push(next.scheduled);
                written += 1;
            }
        }
        written
    }

    /// Allocating variant of [`drain_up_to`](Self::drain_up_to) for control
    /// threads and tests.
    pub fn drain(&mut self, block_end: u64) -> Vec<ScheduledEvent> {
        self.collect_handoff();
        let due = self
            .pending
            .iter()
            .filter(|Reverse(p)| p.scheduled.time < block_end)
            .count();
        let mut out = Vec::with_capacity(due);
        self.drain_up_to(block_end, &mut out);
        out
    }

    /// Events waiting in the consumer, excluding anything still in the hand-off.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Discards every queued event.
    pub fn clear(&mut self) {
        while self.shared.handoff.pop().is_some() {}
        self.pending.clear();
    }

    fn collect_handoff(&mut self) {
        while let Some(incoming) = self.shared.handoff.pop() {
            if self.pending.len() >= self.capacity {
                self.evict_oldest();
            }
            self.pending.push(Reverse(incoming));
        }
    }

    /// Drops the earliest-enqueued pending event, whatever its due time.
    /// The heap is rebuilt in place, so its storage is reused.
    fn evict_oldest(&mut self) {
        let oldest = self.pending.iter().map(|Reverse(p)| p.seq).min();
        if let Some(oldest) = oldest {
            self.pending.retain(|Reverse(p)| p.seq != oldest);
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}
