// One-second stats aggregation (C7): presented / captured / unique / duplicate /
// dropped frame counters plus min/avg/max skip-delta, sampled and reset every second.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomics updated by the capture and render threads; read and reset once per second
/// by whichever side owns the reporting loop (the render/main thread).
#[derive(Default)]
pub struct StatsCounters {
    captured: AtomicU64,
    presented: AtomicU64,
    unique: AtomicU64,
    duplicate: AtomicU64,
    skip_min: AtomicU64,
    skip_max: AtomicU64,
    skip_sum: AtomicU64,
    skip_count: AtomicU64,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self {
            skip_min: AtomicU64::new(u64::MAX),
            ..Default::default()
        }
    }

    /// Called by the capture engine once per accepted (content-bearing) frame.
    pub fn record_captured(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Called by the render loop once per presented frame, with whether the acquired
    /// frame ID differed from the previously rendered one and, if so, the skip delta.
    pub fn record_presented(&self, unique: bool, skip_delta: Option<u64>) {
        self.presented.fetch_add(1, Ordering::Relaxed);
        if unique {
            self.unique.fetch_add(1, Ordering::Relaxed);
            if let Some(delta) = skip_delta {
                self.skip_sum.fetch_add(delta, Ordering::Relaxed);
                self.skip_count.fetch_add(1, Ordering::Relaxed);
                self.skip_max.fetch_max(delta, Ordering::Relaxed);
                self.skip_min.fetch_min(delta, Ordering::Relaxed);
            }
        } else {
            self.duplicate.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drain all counters and compute the one-second summary line's fields. Resets
    /// everything so the next interval starts from zero.
    pub fn drain(&self) -> IntervalStats {
        let captured = self.captured.swap(0, Ordering::Relaxed);
        let presented = self.presented.swap(0, Ordering::Relaxed);
        let unique = self.unique.swap(0, Ordering::Relaxed);
        let duplicate = self.duplicate.swap(0, Ordering::Relaxed);
        let skip_min = self.skip_min.swap(u64::MAX, Ordering::Relaxed);
        let skip_max = self.skip_max.swap(0, Ordering::Relaxed);
        let skip_sum = self.skip_sum.swap(0, Ordering::Relaxed);
        let skip_count = self.skip_count.swap(0, Ordering::Relaxed);

        let dropped = captured.saturating_sub(presented);
        let (skip_min, skip_max, skip_avg) = if skip_count == 0 {
            (0, 0, 0.0)
        } else {
            (skip_min, skip_max, skip_sum as f64 / skip_count as f64)
        };

        IntervalStats {
            captured,
            presented,
            unique,
            duplicate,
            dropped,
            skip_min,
            skip_max,
            skip_avg,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalStats {
    pub captured: u64,
    pub presented: u64,
    pub unique: u64,
    pub duplicate: u64,
    pub dropped: u64,
    pub skip_min: u64,
    pub skip_max: u64,
    pub skip_avg: f64,
}

impl IntervalStats {
    /// Format matching the mandated stdout contract:
    /// `Out:N Cap:N Uniq:N Dup:N Drop:N Skip:min-max(avg)`
    pub fn format_line(&self) -> String {
        format!(
            "Out:{} Cap:{} Uniq:{} Dup:{} Drop:{} Skip:{}-{}({:.1})",
            self.presented,
            self.captured,
            self.unique,
            self.duplicate,
            self.dropped,
            self.skip_min,
            self.skip_max,
            self.skip_avg
        )
    }
}

/// One-second ticker over a counters set shared with the capture thread: call `poll()`
/// from the render loop; when it returns `Some`, print the drained summary line.
pub struct StatsMonitor {
    counters: std::sync::Arc<StatsCounters>,
    last_tick: Instant,
}

impl StatsMonitor {
    pub fn new(counters: std::sync::Arc<StatsCounters>) -> Self {
        Self {
            counters,
            last_tick: Instant::now(),
        }
    }

    pub fn counters(&self) -> &std::sync::Arc<StatsCounters> {
        &self.counters
    }

    /// Returns the interval summary exactly once per elapsed second, `None` otherwise.
    pub fn poll(&mut self) -> Option<IntervalStats> {
        if self.last_tick.elapsed().as_secs() >= 1 {
            self.last_tick = Instant::now();
            Some(self.counters.drain())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_plus_duplicate_equals_presented() {
        let c = StatsCounters::new();
        for _ in 0..60 {
            c.record_captured();
        }
        for i in 0..60 {
            let unique = i % 2 == 0;
            c.record_presented(unique, unique.then_some(1));
        }
        let s = c.drain();
        assert_eq!(s.unique + s.duplicate, s.presented);
        assert_eq!(s.presented, 60);
        assert_eq!(s.unique, 30);
        assert_eq!(s.duplicate, 30);
    }

    #[test]
    fn drop_is_never_negative() {
        let c = StatsCounters::new();
        for _ in 0..10 {
            c.record_captured();
        }
        for _ in 0..60 {
            c.record_presented(false, None);
        }
        let s = c.drain();
        // captured < presented: saturating_sub keeps this at 0, never underflows.
        assert_eq!(s.dropped, 0);
    }

    #[test]
    fn idle_desktop_is_all_duplicates() {
        let c = StatsCounters::new();
        for _ in 0..60 {
            c.record_presented(false, None);
        }
        let s = c.drain();
        assert_eq!(s.unique, 0);
        assert_eq!(s.duplicate, 60);
        assert_eq!(s.presented, 60);
    }

    #[test]
    fn skip_min_max_avg_tracks_uniform_skips() {
        let c = StatsCounters::new();
        for _ in 0..60 {
            c.record_presented(true, Some(2));
        }
        let s = c.drain();
        assert_eq!(s.skip_min, 2);
        assert_eq!(s.skip_max, 2);
        assert_eq!(s.skip_avg, 2.0);
    }

    #[test]
    fn format_line_matches_wire_contract() {
        let c = StatsCounters::new();
        for _ in 0..60 {
            c.record_captured();
            c.record_presented(true, Some(1));
        }
        let s = c.drain();
        assert_eq!(s.format_line(), "Out:60 Cap:60 Uniq:60 Dup:0 Drop:0 Skip:1-1(1.0)");
    }

    #[test]
    fn drained_interval_resets_counters() {
        let c = StatsCounters::new();
        c.record_captured();
        c.record_presented(true, Some(3));
        let _ = c.drain();
        let second = c.drain();
        assert_eq!(second.captured, 0);
        assert_eq!(second.presented, 0);
        assert_eq!(second.skip_min, 0);
        assert_eq!(second.skip_max, 0);
    }
}
