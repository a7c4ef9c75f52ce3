// Mirror engine (ties together C1-C7): owns the render-side device/swap chain, the
// capture thread handle, the pacing controller and the stats monitor, and drives the
// per-iteration loop the concurrency & resource model describes end to end.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use windows::Win32::Foundation::HWND;

use crate::capture::thread::{spawn_capture_thread, CaptureHandle};
use crate::capture::types::{resolve_monitor, MonitorDescriptor};
use crate::config::{MirrorConfig, DUPLICATION_TIMEOUT_MS, FIRST_FRAME_TIMEOUT_SECS};
use crate::d3d11;
use crate::pacing::{compute_target_frame_skip, PacingController, RunningFlag};
use crate::render::RenderEngine;
use crate::stats::{StatsCounters, StatsMonitor};
use crate::white_level;
use crate::window;

/// Everything the running mirror session needs, assembled once at startup and driven
/// by `run()` until the shared `RunningFlag` is cleared.
pub struct MirrorEngine {
    config: MirrorConfig,
    capture: CaptureHandle,
    render: RenderEngine,
    pacing: PacingController,
    stats: StatsMonitor,
    running: Arc<RunningFlag>,
}

impl MirrorEngine {
    /// Resolve both monitors, spawn the capture thread, build the render side against
    /// `hwnd`, and block (up to `FIRST_FRAME_TIMEOUT_SECS`) until the first frame's
    /// geometry has been published, matching the startup ordering in the concurrency
    /// & resource model section.
    pub fn new(mut config: MirrorConfig, auto_detect_white: bool, hwnd: HWND, running: Arc<RunningFlag>) -> anyhow::Result<Self> {
        config.validate()?;

        let source = resolve_monitor(config.source_index).context("failed to resolve source monitor")?;
        let target = resolve_monitor(config.target_index).context("failed to resolve target monitor")?;

        if auto_detect_white {
            config.sdr_white_nits = white_level::query_sdr_white_level(target.handle());
        }

        // The canonical startup banner is the bin crate's `println!` output (the
        // mandated stdout wire format); this is a lower-volume diagnostic echo of the
        // same resolution for anyone running with `RUST_LOG=debug`.
        log::debug!(
            "mirroring source[{}] \"{}\" ({}x{}@{:.1}Hz) -> target[{}] \"{}\" ({}x{})",
            source.index,
            source.name,
            source.width,
            source.height,
            source.refresh_hz,
            target.index,
            target.name,
            target.width,
            target.height,
        );

        let stats_counters = Arc::new(StatsCounters::new());

        let capture = spawn_capture_thread(source.handle(), DUPLICATION_TIMEOUT_MS, Arc::clone(&stats_counters), Arc::clone(&running))
            .context("failed to start capture thread")?;

        wait_for_first_frame(&capture, &running)?;

        let render_device = d3d11::create_d3d11_device().context("failed to create render-side D3D11 device")?;
        let render = RenderEngine::new(render_device, hwnd, target.width, target.height, config.use_waitable_swapchain)
            .context("failed to build render engine")?;

        let target_frame_skip = compute_target_frame_skip(source.refresh_hz, target_refresh_hz(&target));
        let pacing = PacingController::new(
            target_frame_skip,
            config.use_smart_frame_selection,
            config.use_frame_delay,
            config.frame_delay_micros,
        );

        let stats = StatsMonitor::new(stats_counters);

        Ok(Self { config, capture, render, pacing, stats, running })
    }

    /// Run the per-iteration loop until the shared running flag is cleared (ESC,
    /// window close, Ctrl+C, or a fatal capture-thread error). Pumps the Win32
    /// message queue once per iteration (message pump), applies the pacing
    /// controller's delay, renders whatever frame is current, records stats, and
    /// prints the one-second summary line on the mandated cadence.
    pub fn run(&mut self) -> anyhow::Result<()> {
        while self.running.is_running() {
            if !window::pump_messages() {
                self.running.stop();
                break;
            }

            let capture_id = self.capture.buffer.peek_ready_id();
            if capture_id != 0 {
                self.pacing.maybe_delay(capture_id);
            }

            match self.render.render_once(&self.capture, &self.config, DUPLICATION_TIMEOUT_MS) {
                Ok(Some(frame_id)) => {
                    let outcome = self.pacing.record_rendered(frame_id);
                    self.stats.counters().record_presented(outcome.unique, outcome.skip_delta);
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("render iteration failed: {e:#}");
                }
            }

            if let Some(interval) = self.stats.poll() {
                println!("{}", interval.format_line());
            }
        }

        Ok(())
    }

    /// Join the capture thread on the way out, matching the clean-teardown ordering
    /// the concurrency & resource model section calls for.
    pub fn shutdown(self) {
        self.running.stop();
        self.capture.join();
    }
}

fn target_refresh_hz(target: &MonitorDescriptor) -> f64 {
    if target.refresh_hz >= 1.0 {
        target.refresh_hz
    } else {
        60.0
    }
}

fn wait_for_first_frame(capture: &CaptureHandle, running: &Arc<RunningFlag>) -> anyhow::Result<()> {
    let deadline = Instant::now() + Duration::from_secs(FIRST_FRAME_TIMEOUT_SECS);
    while Instant::now() < deadline {
        if !running.is_running() {
            anyhow::bail!("capture thread exited before producing a first frame");
        }
        if capture.buffer.peek_ready_id() != 0 {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    anyhow::bail!("timed out waiting {FIRST_FRAME_TIMEOUT_SECS}s for the first captured frame");
}
