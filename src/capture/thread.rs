// Capture thread (C2): owns its own D3D11 device, the DXGI duplication engine, and the
// producer side of the triple buffer. One dedicated OS thread, matching the
// "display-capture thread" role in the pipeline design.
//
// This thread's device is deliberately distinct from the render thread's: the two
// communicate only through (a) the lock-free triple buffer of slot *indices* and frame
// IDs, (b) a one-shot geometry handshake carrying NT-shareable texture handles the
// render side opens on its own device, and (c) the cursor-state dirty-flag handshake.
// Neither thread ever touches the other's device or immediate context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use anyhow::Context as _;
use windows::Win32::Foundation::HMONITOR;

use crate::capture::duplication::{DuplicationEngine, SharedGeometry};
use crate::cursor_state::CursorState;
use crate::d3d11;
use crate::error::CaptureError;
use crate::pacing::RunningFlag;
use crate::stats::StatsCounters;
use crate::triplebuffer::TripleBuffer;

/// Handle returned to the engine: the shared triple buffer (indices/frame-IDs only —
/// the slot *textures* live on each side's own device), the geometry handshake cell and
/// its version counter, the cursor state, and the join handle for clean shutdown.
pub struct CaptureHandle {
    pub buffer: Arc<TripleBuffer<()>>,
    pub geometry: Arc<Mutex<Option<SharedGeometry>>>,
    pub geometry_version: Arc<AtomicU64>,
    pub cursor: Arc<CursorState>,
    join: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    pub fn join(mut self) {
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Spawn the capture thread and return the handle the render side polls for frames.
/// `monitor` is resolved by the caller (the engine) before spawning; resolving the
/// handle is internal plumbing, not an interactive selection the capture thread
/// itself performs.
pub fn spawn_capture_thread(
    monitor: HMONITOR,
    timeout_ms: u32,
    stats: Arc<StatsCounters>,
    running: Arc<RunningFlag>,
) -> anyhow::Result<CaptureHandle> {
    let buffer = Arc::new(TripleBuffer::<()>::new());
    let geometry = Arc::new(Mutex::new(None));
    let geometry_version = Arc::new(AtomicU64::new(0));
    let cursor = Arc::new(CursorState::new());

    let producer_buffer = Arc::clone(&buffer);
    let producer_geometry = Arc::clone(&geometry);
    let producer_version = Arc::clone(&geometry_version);
    let producer_cursor = Arc::clone(&cursor);
    let producer_stats = Arc::clone(&stats);
    let producer_running = Arc::clone(&running);

    let join = std::thread::Builder::new()
        .name("mirrorwall-capture".into())
        .spawn(move || {
            capture_loop(
                monitor,
                timeout_ms,
                producer_buffer,
                producer_geometry,
                producer_version,
                producer_cursor,
                producer_stats,
                producer_running,
            )
        })
        .context("failed to spawn capture thread")?;

    Ok(CaptureHandle {
        buffer,
        geometry,
        geometry_version,
        cursor,
        join: Some(join),
    })
}

fn capture_loop(
    monitor: HMONITOR,
    timeout_ms: u32,
    buffer: Arc<TripleBuffer<()>>,
    geometry: Arc<Mutex<Option<SharedGeometry>>>,
    geometry_version: Arc<AtomicU64>,
    cursor: Arc<CursorState>,
    stats: Arc<StatsCounters>,
    running: Arc<RunningFlag>,
) {
    let capture_device = match d3d11::create_d3d11_device() {
        Ok(ctx) => ctx,
        Err(e) => {
            log::error!("capture thread: failed to create D3D11 device: {e:#}");
            running.stop();
            return;
        }
    };

    let mut engine = match DuplicationEngine::new(capture_device.device, capture_device.context, monitor, timeout_ms) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("capture thread: failed to start duplication: {e:#}");
            running.stop();
            return;
        }
    };

    let mut frame_id = 0u64;

    while running.is_running() {
        let write_idx = buffer.write_index();

        match engine.acquire(write_idx) {
            Ok(outcome) => {
                if outcome.geometry_changed {
                    let snapshot = engine.shared_geometry().expect("acquire just rebuilt the slots");
                    *geometry.lock().expect("geometry mutex poisoned") = Some(snapshot);
                    // SeqCst: this is a rare, once-per-(re)init event, not the steady-
                    // state hot path; paying for a total order here removes any need to
                    // reason about cross-atomic visibility against the triple buffer's
                    // own release/acquire pair.
                    geometry_version.fetch_add(1, Ordering::SeqCst);
                }

                if let Some((x, y, visible)) = outcome.cursor_position {
                    cursor.update_position(x, y, visible);
                }
                if let Some(shape) = outcome.pointer_shape {
                    cursor.update_shape(shape);
                }

                if !outcome.desktop_updated {
                    continue;
                }

                frame_id += 1;
                stats.record_captured();
                buffer.publish(frame_id);
            }
            Err(CaptureError::Timeout) => continue,
            Err(CaptureError::AccessLost) => {
                log::warn!("capture thread: duplication access lost, recreating");
                if let Err(e) = engine.recreate() {
                    log::error!("capture thread: failed to recreate duplication: {e:#}");
                    running.stop();
                    return;
                }
            }
            Err(CaptureError::DuplicationUnavailable(e)) => {
                log::error!("capture thread: duplication unavailable: {e:#}");
                running.stop();
                return;
            }
            Err(CaptureError::Transient(e)) => {
                log::warn!("capture thread: transient error, skipping frame: {e:#}");
            }
        }
    }
}
