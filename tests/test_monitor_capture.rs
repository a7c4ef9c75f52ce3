// Integration test: monitor enumeration and descriptor resolution.
//
// Requires at least one attached display; run on a real desktop session, not a
// headless CI runner without a GPU/monitor attached.

use mirrorwall::capture::target::enumerate_monitors;
use mirrorwall::capture::{enable_dpi_awareness, resolve_monitor};

#[test]
fn enumerate_monitors_finds_at_least_one() {
    enable_dpi_awareness();
    let monitors = enumerate_monitors().expect("EnumDisplayMonitors failed");
    assert!(!monitors.is_empty(), "expected at least one attached monitor");
}

#[test]
fn resolve_monitor_0_has_positive_geometry() {
    enable_dpi_awareness();
    let desc = resolve_monitor(0).expect("failed to resolve monitor 0");
    assert!(desc.width > 0 && desc.height > 0);
    assert!(desc.refresh_hz > 0.0, "refresh rate should fall back to 60 if unreported");
    assert!(!desc.name.is_empty());
}

#[test]
fn resolve_monitor_out_of_range_is_an_error() {
    let result = resolve_monitor(999);
    assert!(result.is_err());
}

#[test]
fn exactly_one_monitor_is_reported_primary() {
    enable_dpi_awareness();
    let monitors = enumerate_monitors().expect("EnumDisplayMonitors failed");
    let primaries = (0..monitors.len())
        .filter_map(|i| resolve_monitor(i).ok())
        .filter(|d| d.is_primary)
        .count();
    assert_eq!(primaries, 1, "exactly one monitor should be the Windows primary");
}
