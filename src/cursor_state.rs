// Cursor state (part of C2/C6): {visible, position, shape} updated exclusively by the
// capture engine and consumed exclusively by the render engine, via a single-writer/
// single-reader dirty-flag handshake. Position and visibility are read every render
// iteration (cheap atomics); the shape payload only changes occasionally, so it sits
// behind a small mutex rather than something lock-free — the dirty flag itself is the
// lock-free part of the handshake the design calls for.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;

use crate::capture::duplication::PointerShape;

pub struct CursorState {
    visible: AtomicBool,
    pos_x: AtomicI32,
    pos_y: AtomicI32,
    dirty: AtomicBool,
    shape: Mutex<Option<PointerShape>>,
}

impl CursorState {
    pub fn new() -> Self {
        Self {
            visible: AtomicBool::new(false),
            pos_x: AtomicI32::new(0),
            pos_y: AtomicI32::new(0),
            dirty: AtomicBool::new(false),
            shape: Mutex::new(None),
        }
    }

    /// Called by the capture engine whenever `LastMouseUpdateTime` was non-zero.
    pub fn update_position(&self, x: i32, y: i32, visible: bool) {
        self.pos_x.store(x, Ordering::Relaxed);
        self.pos_y.store(y, Ordering::Relaxed);
        self.visible.store(visible, Ordering::Relaxed);
    }

    /// Called by the capture engine whenever a new pointer shape buffer was retrieved.
    /// Raises the dirty flag with a release store so the render side is guaranteed to
    /// observe the new shape bytes once it observes the flag via `take_if_dirty`.
    pub fn update_shape(&self, shape: PointerShape) {
        *self.shape.lock().expect("cursor shape mutex poisoned") = Some(shape);
        self.dirty.store(true, Ordering::Release);
    }

    /// Current position/visibility, read every render iteration regardless of dirtiness.
    pub fn position(&self) -> (i32, i32, bool) {
        (
            self.pos_x.load(Ordering::Relaxed),
            self.pos_y.load(Ordering::Relaxed),
            self.visible.load(Ordering::Relaxed),
        )
    }

    /// Whether any shape has ever been recorded (independent of dirtiness), used to
    /// decide whether the cursor compositor has anything to draw at all.
    pub fn has_shape(&self) -> bool {
        self.shape.lock().expect("cursor shape mutex poisoned").is_some()
    }

    /// Atomically clear the dirty flag and, if it had been set, return a clone of the
    /// current shape for the render side to rebuild its texture from. Returns `None`
    /// both when nothing is dirty and when nothing has ever been recorded.
    pub fn take_if_dirty(&self) -> Option<PointerShape> {
        if self.dirty.swap(false, Ordering::Acquire) {
            self.shape.lock().expect("cursor shape mutex poisoned").clone()
        } else {
            None
        }
    }
}

impl Default for CursorState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(tag: u8) -> PointerShape {
        PointerShape {
            shape_type: 1,
            width: 2,
            height: 2,
            pitch: 8,
            hotspot_x: 0,
            hotspot_y: 0,
            bytes: vec![tag; 16],
        }
    }

    #[test]
    fn fresh_state_has_no_shape_and_is_not_dirty() {
        let c = CursorState::new();
        assert!(!c.has_shape());
        assert!(c.take_if_dirty().is_none());
    }

    #[test]
    fn update_shape_raises_dirty_exactly_once() {
        let c = CursorState::new();
        c.update_shape(shape(7));
        assert!(c.has_shape());

        let taken = c.take_if_dirty();
        assert!(taken.is_some());
        assert_eq!(taken.unwrap().bytes[0], 7);

        // Second call observes the flag already cleared: no repeat rebuild.
        assert!(c.take_if_dirty().is_none());
        // But the shape itself is still there for position-only updates.
        assert!(c.has_shape());
    }

    #[test]
    fn position_updates_are_independent_of_dirty_handshake() {
        let c = CursorState::new();
        c.update_position(10, 20, true);
        assert_eq!(c.position(), (10, 20, true));
        assert!(c.take_if_dirty().is_none());
    }
}
