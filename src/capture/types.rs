// 捕获模块公共类型定义

use anyhow::{bail, Context, Result};
use windows::core::BOOL;
use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Gdi::{
    EnumDisplaySettingsW, GetMonitorInfoW, DEVMODEW, ENUM_CURRENT_SETTINGS, HMONITOR, MONITORINFO,
    MONITORINFOEXW,
};

use super::hdr_detection::is_monitor_hdr;
use super::target::enumerate_monitors;

/// Resolved source- or target-monitor identity, everything the capture/render
/// engines need to know about a monitor besides its live `HMONITOR` (which this
/// also carries, stored as `isize` so the descriptor can cross the capture/render
/// thread boundary freely).
#[derive(Debug, Clone)]
pub struct MonitorDescriptor {
    handle_ptr: isize,
    /// Index into the system enumeration order this descriptor was resolved from.
    pub index: usize,
    /// GDI device name, e.g. `\\.\DISPLAY1`.
    pub name: String,
    pub is_primary: bool,
    pub width: u32,
    pub height: u32,
    /// Reported refresh rate in Hz, from the active display mode. Used only to seed
    /// the format descriptor's source-hz field for frame-skip calculation; display
    /// configs that report 0 or 1 Hz (some virtual/remote adapters) fall back to 60.
    pub refresh_hz: f64,
    /// Whether Windows currently reports this output as HDR-enabled. Informational
    /// only: the render engine's format decision comes from the captured texture's
    /// own pixel format, never from this field.
    pub reported_hdr: bool,
}

impl MonitorDescriptor {
    pub fn handle(&self) -> HMONITOR {
        HMONITOR(self.handle_ptr as *mut _)
    }
}

/// Resolve a monitor descriptor for the monitor at `index` in system enumeration
/// order. Combines GDI monitor-info, the active display mode's refresh rate, and
/// a DisplayConfig reported-HDR probe.
pub fn resolve_monitor(index: usize) -> Result<MonitorDescriptor> {
    let monitors = enumerate_monitors()?;
    let handle = *monitors
        .get(index)
        .with_context(|| format!("monitor index {index} out of range (found {})", monitors.len()))?;

    let mut info = MONITORINFOEXW {
        monitorInfo: MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFOEXW>() as u32,
            ..Default::default()
        },
        ..Default::default()
    };
    let ok = unsafe { GetMonitorInfoW(handle, &mut info.monitorInfo as *mut _ as *mut _) };
    if !BOOL(ok.0).as_bool() {
        bail!("GetMonitorInfoW failed for monitor index {index}");
    }

    let name = String::from_utf16_lossy(&info.szDevice)
        .trim_end_matches('\0')
        .to_string();
    let is_primary = (info.monitorInfo.dwFlags & 1) != 0; // MONITORINFOF_PRIMARY
    let rect: RECT = info.monitorInfo.rcMonitor;
    let width = (rect.right - rect.left).max(0) as u32;
    let height = (rect.bottom - rect.top).max(0) as u32;

    let refresh_hz = query_refresh_hz(&info.szDevice).unwrap_or(60.0);
    let reported_hdr = is_monitor_hdr(handle).unwrap_or(false);

    Ok(MonitorDescriptor {
        handle_ptr: handle.0 as isize,
        index,
        name,
        is_primary,
        width,
        height,
        refresh_hz,
        reported_hdr,
    })
}

fn query_refresh_hz(device_name: &[u16; 32]) -> Result<f64> {
    let mut mode = DEVMODEW {
        dmSize: std::mem::size_of::<DEVMODEW>() as u16,
        ..Default::default()
    };
    let ok = unsafe {
        EnumDisplaySettingsW(
            windows::core::PCWSTR(device_name.as_ptr()),
            ENUM_CURRENT_SETTINGS,
            &mut mode,
        )
    };
    if !ok.as_bool() {
        bail!("EnumDisplaySettingsW failed");
    }
    let hz = mode.dmDisplayFrequency as f64;
    if hz <= 1.0 {
        bail!("reported refresh rate not meaningful: {hz}");
    }
    Ok(hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_monitor_0_has_nonzero_dimensions() {
        let d = resolve_monitor(0).unwrap();
        assert!(d.width > 0);
        assert!(d.height > 0);
        assert!(d.refresh_hz >= 1.0);
    }

    #[test]
    fn resolve_monitor_out_of_range_errors() {
        assert!(resolve_monitor(999).is_err());
    }
}
