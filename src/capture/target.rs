// Capture target resolution: monitor index -> HMONITOR.

use anyhow::{bail, Context, Result};
use windows::core::BOOL;
use windows::Win32::Foundation::{HWND, LPARAM, RECT};
use windows::Win32::Graphics::Gdi::*;
use windows::Win32::UI::HiDpi::{
    SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
};

// ---------------------------------------------------------------------------
// DPI
// ---------------------------------------------------------------------------

/// Enable Per-Monitor DPI awareness
///
/// Ensures capturing physical resolution rather than scaled logical resolution.
/// Repeated calls are safe (silently ignored if already set).
pub fn enable_dpi_awareness() {
    unsafe {
        // SAFETY: best-effort call, failure indicates it was already set
        let _ = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);
    }
}

// ---------------------------------------------------------------------------
// Monitor lookup
// ---------------------------------------------------------------------------

/// Find monitor by index
///
/// Indices are ordered by system enumeration order, not guaranteed that `0` is the primary monitor.
pub fn find_monitor(index: usize) -> Result<HMONITOR> {
    let monitors = enumerate_monitors()?;

    if monitors.is_empty() {
        bail!("No monitors detected");
    }

    monitors.get(index).copied().with_context(|| {
        format!(
            "Monitor index {} out of range (found {})",
            index,
            monitors.len()
        )
    })
}

/// All attached monitors, in system enumeration order. Exposed for the external
/// CLI collaborator's monitor-selection prompt; the engine itself only ever needs
/// `find_monitor`.
pub fn enumerate_monitors() -> Result<Vec<HMONITOR>> {
    unsafe {
        let mut monitors = Vec::new();
        let ok = EnumDisplayMonitors(
            Some(HDC::default()),
            None,
            Some(enum_monitor_proc),
            LPARAM(&mut monitors as *mut _ as isize),
        );

        if !ok.as_bool() {
            bail!("EnumDisplayMonitors failed");
        }

        Ok(monitors)
    }
}

unsafe extern "system" fn enum_monitor_proc(
    hmonitor: HMONITOR,
    _: HDC,
    _: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    // SAFETY: lparam points to a Vec<HMONITOR> on the caller's stack in enumerate_monitors().
    // The Vec's lifetime spans the entire EnumDisplayMonitors call, and the callback
    // executes synchronously on the same thread.
    let monitors = &mut *(lparam.0 as *mut Vec<HMONITOR>);
    monitors.push(hmonitor);
    BOOL(1)
}

/// Monitor that currently contains the largest portion of `hwnd`, falling back to
/// the nearest monitor if the window straddles none directly. Used by the minimal
/// binary to keep the mirror window's own monitor out of the default source pick.
pub fn window_monitor(hwnd: HWND) -> HMONITOR {
    unsafe { MonitorFromWindow(hwnd, MONITOR_DEFAULTTONEAREST) }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_monitor_index_0() {
        enable_dpi_awareness();
        let hmonitor = find_monitor(0).unwrap();
        assert!(!hmonitor.0.is_null(), "Monitor handle should be valid");
    }

    #[test]
    fn test_find_monitor_out_of_range() {
        let result = find_monitor(999);
        assert!(result.is_err());
    }
}
