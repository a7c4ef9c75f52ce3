// Capture engine module: DXGI Desktop Duplication on a dedicated thread (C2).

pub mod duplication;
pub mod hdr_detection;
pub mod target;
pub mod thread;
pub mod types;

pub use duplication::{DuplicationEngine, FrameFormat, PointerShape, SharedGeometry};
pub use target::{enable_dpi_awareness, find_monitor};
pub use thread::{spawn_capture_thread, CaptureHandle};
pub use types::{resolve_monitor, MonitorDescriptor};
