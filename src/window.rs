// Minimal mirror window (external collaborator, kept intentionally thin): a
// borderless, topmost window placed at the target
// monitor's origin, sized to its full resolution. Owns nothing beyond its own HWND
// lifetime; shutdown is cooperative via the shared `RunningFlag`, matching the
// ESC-key / WM_DESTROY / Ctrl+C handling the lifecycle design calls for.

use std::sync::Arc;

use anyhow::Context as _;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::VK_ESCAPE;
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::pacing::RunningFlag;

const CLASS_NAME: PCWSTR = windows::core::w!("MirrorWallWindowClass");

/// Create the borderless topmost output window at `(x, y, width, height)` in screen
/// coordinates (the caller resolves these from the target monitor's `MONITORINFO`
/// rectangle). `running` is stashed in the window's user data so the window
/// procedure can flip it on WM_DESTROY or Escape.
pub fn create_window(x: i32, y: i32, width: i32, height: i32, running: Arc<RunningFlag>) -> anyhow::Result<HWND> {
    unsafe {
        let instance = GetModuleHandleW(None).context("GetModuleHandleW failed")?;

        let class = WNDCLASSW {
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(window_proc),
            hInstance: instance.into(),
            lpszClassName: CLASS_NAME,
            ..Default::default()
        };
        // RegisterClassW fails harmlessly if a previous instance already registered
        // this class (e.g. repeated construction within one process during tests).
        let _ = RegisterClassW(&class);

        let hwnd = CreateWindowExW(
            WS_EX_TOPMOST,
            CLASS_NAME,
            windows::core::w!("mirrorwall"),
            WS_POPUP | WS_VISIBLE,
            x,
            y,
            width,
            height,
            None,
            None,
            Some(instance.into()),
            None,
        )
        .context("CreateWindowExW failed")?;

        let running_ptr = Arc::into_raw(running) as isize;
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, running_ptr);

        let _ = ShowWindow(hwnd, SW_SHOW);

        Ok(hwnd)
    }
}

/// Drain and dispatch the window message queue for the calling thread without
/// blocking. Returns `false` once `WM_QUIT` has been observed, signalling the
/// message pump itself wants the caller to stop (mirrors what `RunningFlag` already
/// reflects in the common case, but is checked independently in case the window was
/// closed directly rather than via the running flag).
pub fn pump_messages() -> bool {
    unsafe {
        let mut msg = MSG::default();
        while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
            if msg.message == WM_QUIT {
                return false;
            }
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
    true
}

unsafe extern "system" fn window_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match msg {
        WM_DESTROY => {
            if let Some(running) = running_flag(hwnd) {
                running.stop();
            }
            PostQuitMessage(0);
            LRESULT(0)
        }
        WM_KEYDOWN if wparam.0 as u16 == VK_ESCAPE.0 => {
            if let Some(running) = running_flag(hwnd) {
                running.stop();
            }
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

/// Recover the `RunningFlag` stashed at window creation without taking ownership
/// away from the `Arc` the engine itself still holds (the pointer is reconstructed
/// into a temporary `Arc` and immediately forgotten again, matching the standard
/// "weak reborrow" pattern for data parked in `GWLP_USERDATA`).
unsafe fn running_flag(hwnd: HWND) -> Option<Arc<RunningFlag>> {
    let raw = GetWindowLongPtrW(hwnd, GWLP_USERDATA);
    if raw == 0 {
        return None;
    }
    let ptr = raw as *const RunningFlag;
    let arc = Arc::from_raw(ptr);
    let clone = Arc::clone(&arc);
    std::mem::forget(arc);
    Some(clone)
}
