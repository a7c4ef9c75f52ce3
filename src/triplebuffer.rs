// Lock-free triple buffer: one producer (capture thread), one consumer (render thread).
//
// Three slots hold payloads of type `T` (in production, GPU-resident frame textures;
// in tests, any small Copy/Default type). Three atomic indices track which slot the
// producer writes next, which is ready for the consumer, and which the consumer
// currently holds. -1 encodes "none" for ready/display.
//
// Memory-order contract: publish() is a release store of the slot contents (the
// caller must finish writing the slot before calling publish); acquire() is the
// matching acquire load, so the consumer is guaranteed to observe every byte the
// producer wrote before that publish.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

const NONE: i64 = -1;

/// Three-slot lock-free exchange with per-slot monotonic frame IDs.
///
/// `T` holds the actual slot payload and must be `Sync` so the consumer may read a
/// slot the producer is not currently writing to. The triple buffer itself does not
/// allocate or own the slot contents' lifetime beyond `Default`-initializing them;
/// callers replace slot contents in place (e.g. `CopyResource` into a cached texture)
/// rather than constructing a new `T` per publish.
pub struct TripleBuffer<T> {
    slots: [T; 3],
    /// Slot index [0,2] the producer will write next.
    write: AtomicI64,
    /// Slot index most recently published and not yet acquired, or NONE.
    ready: AtomicI64,
    /// Slot index currently owned by the consumer, or NONE.
    display: AtomicI64,
    /// Per-slot frame ID, stamped by the most recent publish of that slot.
    frame_ids: [AtomicU64; 3],
}

impl<T: Default> TripleBuffer<T> {
    pub fn new() -> Self
    where
        T: Default,
    {
        Self {
            slots: [T::default(), T::default(), T::default()],
            write: AtomicI64::new(0),
            ready: AtomicI64::new(NONE),
            display: AtomicI64::new(NONE),
            frame_ids: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
        }
    }
}

impl<T> TripleBuffer<T> {
    /// Current write-slot index. Side-effect free.
    pub fn write_index(&self) -> usize {
        self.write.load(Ordering::Relaxed) as usize
    }

    /// Direct access to the slot the producer is about to overwrite. Callers must
    /// finish all writes before calling `publish`.
    pub fn write_slot(&self) -> &T {
        &self.slots[self.write_index()]
    }

    /// Mutable access to the slot the producer is about to overwrite. Sound because
    /// the only other reader of `slots`, the consumer, is restricted by `publish`'s
    /// recycle logic to never pick the current write index as its display slot; with
    /// a single producer thread this is the sole writer of that slot at any time.
    #[allow(clippy::mut_from_ref)]
    pub fn write_slot_mut(&self) -> &mut T {
        let w = self.write_index();
        unsafe { &mut *(&self.slots[w] as *const T as *mut T) }
    }

    /// Mark the current write slot ready under `id`, then advance the write index to
    /// a slot that is neither the new ready slot nor the current display slot.
    /// Never blocks.
    pub fn publish(&self, id: u64) {
        let w = self.write.load(Ordering::Relaxed);
        self.frame_ids[w as usize].store(id, Ordering::Relaxed);

        // Release: every write to slots[w] the caller performed before this call
        // must be visible to whichever thread later performs the matching acquire
        // load in `acquire()`.
        let prev_ready = self.ready.swap(w, Ordering::Release);

        let display = self.display.load(Ordering::Acquire);

        // Recycle the slot that just stopped being ready, unless the consumer is
        // currently holding it as its display slot (display is only ever updated by
        // the consumer, so this load can be stale by one acquire at most — the
        // invariant we rely on is that display never equals the slot we're about to
        // pick unless the consumer already released it, which happened-before this
        // load via the consumer's own acquire()).
        let next_write = if prev_ready != NONE && prev_ready != display {
            prev_ready
        } else {
            // Scan for the one slot that is neither the slot we just published (w)
            // nor the consumer's display slot. With three slots and two excluded
            // values this always terminates in at most 3 iterations.
            (0..3i64)
                .find(|&s| s != w && s != display)
                .expect("triple buffer has 3 slots, at most 2 are excluded")
        };

        self.write.store(next_write, Ordering::Relaxed);
    }

    /// Exchange the ready slot for "none"; if one was available, it becomes the new
    /// display slot. Returns the (possibly stale) display slot index and its frame ID,
    /// or `None` if the consumer has never acquired anything yet.
    pub fn acquire(&self) -> Option<(usize, u64)> {
        let acquired = self.ready.swap(NONE, Ordering::Acquire);
        if acquired != NONE {
            // The consumer now owns `acquired`; publish() observes this via its own
            // load of `display` before picking a recycle target.
            self.display.store(acquired, Ordering::Release);
        }

        let display = self.display.load(Ordering::Relaxed);
        if display == NONE {
            return None;
        }
        let id = self.frame_ids[display as usize].load(Ordering::Relaxed);
        Some((display as usize, id))
    }

    /// Direct access to the slot the consumer currently holds (after at least one
    /// successful `acquire`). Panics if nothing has ever been acquired; callers must
    /// check `acquire()`'s return value first.
    pub fn display_slot(&self) -> &T {
        let d = self.display.load(Ordering::Relaxed);
        assert_ne!(d, NONE, "display_slot() called before any acquire()");
        &self.slots[d as usize]
    }

    /// Frame ID of the current ready slot, or 0 if none is ready.
    pub fn peek_ready_id(&self) -> u64 {
        let r = self.ready.load(Ordering::Relaxed);
        if r == NONE {
            0
        } else {
            self.frame_ids[r as usize].load(Ordering::Relaxed)
        }
    }

    /// Snapshot of (write, ready, display) for invariant checks and tests.
    pub fn indices(&self) -> (i64, i64, i64) {
        (
            self.write.load(Ordering::Relaxed),
            self.ready.load(Ordering::Relaxed),
            self.display.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn invariant_distinct(write: i64, ready: i64, display: i64) {
        if write >= 0 && ready >= 0 {
            assert_ne!(write, ready);
        }
        if write >= 0 && display >= 0 {
            assert_ne!(write, display);
        }
        if ready >= 0 && display >= 0 {
            assert_ne!(ready, display);
        }
    }

    #[test]
    fn fresh_buffer_has_no_ready_or_display() {
        let tb: TripleBuffer<u64> = TripleBuffer::new();
        let (w, r, d) = tb.indices();
        assert_eq!(r, NONE);
        assert_eq!(d, NONE);
        assert!((0..3).contains(&w));
        assert!(tb.acquire().is_none());
        assert_eq!(tb.peek_ready_id(), 0);
    }

    #[test]
    fn publish_then_acquire_round_trips_id() {
        let tb: TripleBuffer<u64> = TripleBuffer::new();
        tb.publish(7);
        assert_eq!(tb.peek_ready_id(), 7);
        let (slot, id) = tb.acquire().unwrap();
        assert_eq!(id, 7);
        assert_eq!(*tb.display_slot(), 0); // payload itself is untouched by publish()
        let _ = slot;
    }

    #[test]
    fn acquire_with_nothing_ready_keeps_previous_display() {
        let tb: TripleBuffer<u64> = TripleBuffer::new();
        tb.publish(1);
        let (first_slot, first_id) = tb.acquire().unwrap();
        assert_eq!(first_id, 1);

        // Nothing new published: ready is NONE, so acquire() must report the same
        // display slot/id rather than losing it (idle-desktop duplication case).
        let (slot, id) = tb.acquire().unwrap();
        assert_eq!(slot, first_slot);
        assert_eq!(id, first_id);
    }

    #[test]
    fn indices_stay_pairwise_distinct_across_sequence() {
        let tb: TripleBuffer<u64> = TripleBuffer::new();
        let (w, r, d) = tb.indices();
        invariant_distinct(w, r, d);

        for id in 1..=20u64 {
            tb.publish(id);
            let (w, r, d) = tb.indices();
            invariant_distinct(w, r, d);

            if id % 3 == 0 {
                tb.acquire();
                let (w, r, d) = tb.indices();
                invariant_distinct(w, r, d);
            }
        }
    }

    #[test]
    fn frame_ids_never_regress_under_concurrent_access() {
        let tb = Arc::new(TripleBuffer::<u64>::new());
        let producer = {
            let tb = Arc::clone(&tb);
            thread::spawn(move || {
                for id in 1..=5000u64 {
                    tb.publish(id);
                }
            })
        };

        let consumer = {
            let tb = Arc::clone(&tb);
            thread::spawn(move || {
                let mut last_seen = 0u64;
                let mut observed_any = false;
                for _ in 0..20_000 {
                    if let Some((_, id)) = tb.acquire() {
                        observed_any = true;
                        // Frame IDs observed by successive acquires never regress, and
                        // are never an uninitialized (0) slot once something has been
                        // published.
                        assert!(id >= last_seen, "frame id regressed: {id} < {last_seen}");
                        last_seen = id;
                    }
                }
                (observed_any, last_seen)
            })
        };

        producer.join().unwrap();
        let (observed_any, last_seen) = consumer.join().unwrap();
        assert!(observed_any, "consumer never observed a published frame");
        assert!(last_seen >= 1);
    }

    #[test]
    fn recycled_slot_is_never_the_consumers_display_slot() {
        // Regression test for the "pick any slot not equal to ready or display" step:
        // publish repeatedly without ever acquiring, which forces publish() to scan
        // for a free slot every time (display stays NONE the whole run, but once the
        // consumer does acquire, subsequent publishes must still respect it).
        let tb: TripleBuffer<u64> = TripleBuffer::new();
        for id in 1..=10u64 {
            tb.publish(id);
        }
        let (display_slot, _) = tb.acquire().unwrap();

        for id in 11..=50u64 {
            tb.publish(id);
            let (w, _, d) = tb.indices();
            assert_ne!(w, d, "producer picked the consumer's own display slot");
            assert_eq!(d, display_slot as i64, "display slot moved without an acquire");
        }
    }
}
