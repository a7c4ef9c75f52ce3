// Pacing controller (C4): decides when each render iteration proceeds.
//
// The waitable-swapchain wait itself lives with the swap chain (render::swapchain);
// this module holds the *smart frame selection* policy and the microsecond spin,
// both of which are pure scheduling decisions independent of any D3D11 object.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use windows::Win32::System::Threading::Sleep;

/// Running flag, polled at every suspension point by both threads. A single atomic,
/// set to 0 by a signal handler or ESC key; both threads observe it cooperatively.
#[derive(Default)]
pub struct RunningFlag(std::sync::atomic::AtomicBool);

impl RunningFlag {
    pub fn new() -> Self {
        Self(std::sync::atomic::AtomicBool::new(true))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Tracks the capture-side frame ID the pacing controller last observed, and the
/// render-side frame ID last actually rendered, to implement smart frame selection.
pub struct PacingController {
    target_frame_skip: u64,
    smart_select: bool,
    fixed_delay: bool,
    delay_micros: u32,
    last_observed_capture_id: AtomicU64,
    last_rendered_id: AtomicU64,
}

impl PacingController {
    pub fn new(target_frame_skip: u64, smart_select: bool, fixed_delay: bool, delay_micros: u32) -> Self {
        Self {
            target_frame_skip: target_frame_skip.max(1),
            smart_select,
            fixed_delay,
            delay_micros,
            last_observed_capture_id: AtomicU64::new(0),
            last_rendered_id: AtomicU64::new(0),
        }
    }

    /// Step 2/3 of the per-iteration policy: given the current capture frame ID `c`,
    /// spin-delay if smart selection decides the target frame hasn't landed yet, or
    /// unconditionally if fixed delay is the active strategy instead.
    pub fn maybe_delay(&self, current_capture_id: u64) {
        if self.smart_select && self.target_frame_skip > 1 {
            let last_observed = self.last_observed_capture_id.load(Ordering::Relaxed);
            let last_rendered = self.last_rendered_id.load(Ordering::Relaxed);

            let desktop_active = current_capture_id > last_observed;
            let target_not_yet_captured = current_capture_id < last_rendered + self.target_frame_skip;

            if desktop_active && target_not_yet_captured {
                spin_delay_micros(self.delay_micros);
            }
            self.last_observed_capture_id
                .store(current_capture_id, Ordering::Relaxed);
        } else if self.fixed_delay {
            spin_delay_micros(self.delay_micros);
        }
    }

    /// Step 6: record which frame ID was actually rendered this iteration, and
    /// compute the skip delta against the previous one (None on the very first
    /// render, or when the acquired frame is a duplicate of the last one rendered).
    pub fn record_rendered(&self, frame_id: u64) -> RenderOutcome {
        let last = self.last_rendered_id.swap(frame_id, Ordering::Relaxed);
        if last == 0 {
            // Sentinel: nothing has been rendered before this call (frame IDs are
            // strictly monotonic from 1, so a real previous frame is never 0).
            // There is no prior frame to diff against, so this doesn't count as a
            // skip-delta observation.
            return RenderOutcome { unique: false, skip_delta: None };
        }
        if frame_id != last {
            RenderOutcome {
                unique: true,
                skip_delta: Some(frame_id.saturating_sub(last)),
            }
        } else {
            RenderOutcome { unique: false, skip_delta: None }
        }
    }
}

pub struct RenderOutcome {
    pub unique: bool,
    pub skip_delta: Option<u64>,
}

/// Busy-wait for approximately `micros` microseconds using a monotonic high-resolution
/// counter, per the "monotonic high-resolution counter" requirement. Falls back to a
/// coarse `Sleep(0)` yield once the remaining budget drops below a scheduler quantum,
/// avoiding burning a full core for a 1000us interval on systems with a ~1ms timer.
fn spin_delay_micros(micros: u32) {
    if micros == 0 {
        return;
    }
    let target = std::time::Duration::from_micros(micros as u64);
    let start = Instant::now();
    while start.elapsed() < target {
        // SAFETY: Sleep(0) is always safe; it yields the remainder of the current
        // time slice without blocking for any fixed duration.
        unsafe { Sleep(0) };
    }
}

/// target-frame-skip = round(source_hz / target_hz), clamped to >= 1, per the Format
/// descriptor definition in the data model.
pub fn compute_target_frame_skip(source_hz: f64, target_hz: f64) -> u64 {
    if target_hz <= 0.0 {
        return 1;
    }
    (source_hz / target_hz).round().max(1.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_frame_skip_matches_common_ratios() {
        assert_eq!(compute_target_frame_skip(60.0, 60.0), 1);
        assert_eq!(compute_target_frame_skip(120.0, 60.0), 2);
        assert_eq!(compute_target_frame_skip(144.0, 60.0), 2); // rounds to nearest
        assert_eq!(compute_target_frame_skip(240.0, 60.0), 4);
    }

    #[test]
    fn target_frame_skip_never_below_one() {
        assert_eq!(compute_target_frame_skip(30.0, 60.0), 1);
        assert_eq!(compute_target_frame_skip(0.0, 60.0), 1);
    }

    #[test]
    fn record_rendered_reports_skip_delta_for_new_frame() {
        let pc = PacingController::new(2, true, false, 1000);
        let outcome = pc.record_rendered(1);
        assert!(!outcome.unique); // first call: 0 -> 1, but treated as initial
        let outcome = pc.record_rendered(3);
        assert!(outcome.unique);
        assert_eq!(outcome.skip_delta, Some(2));
    }

    #[test]
    fn record_rendered_reports_duplicate_for_same_frame() {
        let pc = PacingController::new(2, true, false, 1000);
        pc.record_rendered(5);
        let outcome = pc.record_rendered(5);
        assert!(!outcome.unique);
        assert_eq!(outcome.skip_delta, None);
    }

    #[test]
    fn running_flag_starts_true_and_stops() {
        let flag = RunningFlag::new();
        assert!(flag.is_running());
        flag.stop();
        assert!(!flag.is_running());
    }
}
