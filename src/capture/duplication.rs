// DXGI Desktop Duplication wrapper: the one source of captured frames.
//
// Grounded on the AcquireNextFrame/ReleaseFrame/GetFramePointerShape sequencing shown by
// DiscreteTom's `DuplicationContext` and NiiightmareXD's `DxgiDuplicationApi`, adapted to
// keep the captured image GPU-resident across the capture/render device boundary: this
// engine owns three real slot textures (one per triple-buffer slot, never a single
// texture aliased by all three) created with an NT-handle share so the render device can
// open them once and sample directly, matching the "two logical devices, cross-device
// shared handles" affinity described for this pipeline.

use windows::core::Interface;
use windows::Win32::Foundation::{CloseHandle, HANDLE, HMONITOR};
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;

use crate::error::CaptureError;

/// Pixel format the duplication interface actually handed back for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// `DXGI_FORMAT_R16G16B16A16_FLOAT`, scRGB linear, HDR content.
    Scrgb,
    /// `DXGI_FORMAT_B8G8R8A8_UNORM`, 8-bit sRGB-encoded, SDR content.
    Bgra8,
}

impl FrameFormat {
    fn from_dxgi(format: DXGI_FORMAT) -> Option<Self> {
        match format {
            DXGI_FORMAT_R16G16B16A16_FLOAT => Some(FrameFormat::Scrgb),
            DXGI_FORMAT_B8G8R8A8_UNORM => Some(FrameFormat::Bgra8),
            _ => None,
        }
    }

    pub(crate) fn to_dxgi(self) -> DXGI_FORMAT {
        match self {
            FrameFormat::Scrgb => DXGI_FORMAT_R16G16B16A16_FLOAT,
            FrameFormat::Bgra8 => DXGI_FORMAT_B8G8R8A8_UNORM,
        }
    }

    /// Whether this container carries linear-scRGB HDR values (as opposed to an 8-bit
    /// sRGB-encoded container), i.e. the "actual-hdr" bit of the format descriptor.
    pub fn is_hdr(self) -> bool {
        matches!(self, FrameFormat::Scrgb)
    }
}

/// Raw pointer-shape payload retrieved alongside a frame whose mouse shape changed.
/// The byte layout depends on `shape_type` per the DXGI_OUTDUPL_POINTER_SHAPE_TYPE
/// values (monochrome / color / masked-color); interpretation lives in render::cursor.
#[derive(Clone)]
pub struct PointerShape {
    pub shape_type: i32,
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub hotspot_x: i32,
    pub hotspot_y: i32,
    pub bytes: Vec<u8>,
}

/// Three real NT-shareable textures, one per triple-buffer slot, plus the handle each
/// one was shared under. Rebuilt from scratch whenever the captured format or
/// dimensions change (first frame, or a resize/mode-change recovery).
struct SlotTextures {
    textures: [ID3D11Texture2D; 3],
    handles: [isize; 3],
    format: FrameFormat,
    width: u32,
    height: u32,
}

/// Geometry + shared-handle snapshot handed to the render side once per (re)init, so it
/// can open each handle on its own device and build sampling views. `handles` are raw
/// `HANDLE` values reinterpreted as `isize` so the struct is `Send` across the capture/
/// render thread boundary; each handle is only ever opened, never closed, by the render
/// side (the capture side owns and closes them on rebuild/drop).
#[derive(Clone, Copy)]
pub struct SharedGeometry {
    pub handles: [isize; 3],
    pub format: FrameFormat,
    pub width: u32,
    pub height: u32,
}

/// Outcome of one `DuplicationEngine::acquire` call.
pub struct AcquireOutcome {
    /// True only on the iteration that actually copied new desktop image content into
    /// the write slot; cursor-only updates do not set this.
    pub desktop_updated: bool,
    pub cursor_position: Option<(i32, i32, bool)>,
    pub pointer_shape: Option<PointerShape>,
    /// True when this call (re)built the three slot textures, meaning `shared_geometry`
    /// now describes a new generation the render side must pick up before trusting any
    /// frame ID published against it.
    pub geometry_changed: bool,
}

pub struct DuplicationEngine {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    output: IDXGIOutput1,
    duplication: IDXGIOutputDuplication,
    slots: Option<SlotTextures>,
    pointer_shape_buf: Vec<u8>,
    timeout_ms: u32,
}

impl DuplicationEngine {
    /// Build a duplication session for `monitor`, preferring HDR scRGB and falling back
    /// to 8-bit BGRA, matching the format list `DuplicateOutput1` is handed. `device`
    /// and `context` belong to the capture thread alone; the render thread never touches
    /// them (see `capture::thread`).
    pub fn new(
        device: ID3D11Device,
        context: ID3D11DeviceContext,
        monitor: HMONITOR,
        timeout_ms: u32,
    ) -> anyhow::Result<Self> {
        let dxgi_device: IDXGIDevice = device.cast()?;
        let adapter = unsafe { dxgi_device.GetAdapter()? };

        let mut index = 0u32;
        let output1 = loop {
            let output = unsafe { adapter.EnumOutputs(index) }
                .map_err(|e| anyhow::anyhow!("no DXGI output matches the selected monitor: {e}"))?;
            let desc = unsafe { output.GetDesc()? };
            if desc.Monitor == monitor {
                break output.cast::<IDXGIOutput1>()?;
            }
            index += 1;
        };

        let duplication = Self::duplicate(&device, &output1)?;

        Ok(Self {
            device,
            context,
            output: output1,
            duplication,
            slots: None,
            pointer_shape_buf: Vec::new(),
            timeout_ms,
        })
    }

    fn duplicate(device: &ID3D11Device, output1: &IDXGIOutput1) -> anyhow::Result<IDXGIOutputDuplication> {
        let formats = [DXGI_FORMAT_R16G16B16A16_FLOAT, DXGI_FORMAT_B8G8R8A8_UNORM];
        let output6 = output1.cast::<IDXGIOutput6>();
        if let Ok(output6) = &output6 {
            unsafe { output6.DuplicateOutput1(device, 0, &formats) }
        } else {
            unsafe { output1.DuplicateOutput(device) }
        }
        .map_err(|e| anyhow::anyhow!("DuplicateOutput1 failed (monitor already captured exclusively?): {e}"))
    }

    /// Recreate the duplication interface in place after an access-lost error, keeping
    /// the same D3D11 device/context and DXGI output. The slot textures are dropped;
    /// the next qualifying frame rebuilds them (and reports `geometry_changed`), which
    /// is how resize/mode-change recovery is driven.
    pub fn recreate(&mut self) -> anyhow::Result<()> {
        self.duplication = Self::duplicate(&self.device, &self.output)?;
        self.slots = None;
        Ok(())
    }

    /// Acquire one frame, blocking up to `timeout_ms`, and copy any new desktop image
    /// content directly into slot `write_idx`'s own texture (never a texture shared
    /// with any other slot). Returns `CaptureError::Timeout` if nothing arrived (desktop
    /// idle) and `CaptureError::AccessLost` if the duplication interface needs
    /// recreating via `recreate()`.
    pub fn acquire(&mut self, write_idx: usize) -> Result<AcquireOutcome, CaptureError> {
        let mut frame_info = DXGI_OUTDUPL_FRAME_INFO::default();
        let mut resource = None;

        match unsafe {
            self.duplication
                .AcquireNextFrame(self.timeout_ms, &mut frame_info, &mut resource)
        } {
            Ok(()) => {}
            Err(e) if e.code() == DXGI_ERROR_WAIT_TIMEOUT => return Err(CaptureError::Timeout),
            Err(e) if e.code() == DXGI_ERROR_ACCESS_LOST => return Err(CaptureError::AccessLost),
            Err(e) => return Err(CaptureError::Transient(e.into())),
        }

        let result = self.handle_acquired(write_idx, resource, &frame_info);

        // ReleaseFrame regardless of what handle_acquired did; by this point either the
        // desktop image has already been copied out, or we never needed it.
        if let Err(e) = unsafe { self.duplication.ReleaseFrame() } {
            if e.code() != DXGI_ERROR_ACCESS_LOST {
                log::warn!("ReleaseFrame failed: {e}");
            }
        }

        result
    }

    fn handle_acquired(
        &mut self,
        write_idx: usize,
        resource: Option<IDXGIResource>,
        frame_info: &DXGI_OUTDUPL_FRAME_INFO,
    ) -> Result<AcquireOutcome, CaptureError> {
        let mut geometry_changed = false;

        // AcquireNextFrame hands back a valid desktop resource even for mouse-only
        // updates (LastPresentTime == 0 and AccumulatedFrames == 0 in that case); only
        // a nonzero one of those two, or never having built slots yet, means the
        // desktop image itself actually changed and is worth copying + publishing.
        let has_new_content = frame_info.LastPresentTime != 0 || frame_info.AccumulatedFrames > 0 || self.slots.is_none();

        let desktop_updated = if let (Some(resource), true) = (resource, has_new_content) {
            let texture: ID3D11Texture2D = resource
                .cast()
                .map_err(|e| CaptureError::Transient(e.into()))?;
            let mut desc = D3D11_TEXTURE2D_DESC::default();
            unsafe { texture.GetDesc(&mut desc) };

            let format = FrameFormat::from_dxgi(desc.Format).ok_or_else(|| {
                CaptureError::Transient(anyhow::anyhow!("unsupported duplication format: {:?}", desc.Format))
            })?;

            geometry_changed = self
                .ensure_slots(desc.Width, desc.Height, format)
                .map_err(CaptureError::Transient)?;

            let slots = self.slots.as_ref().expect("ensure_slots just (re)built them");
            unsafe {
                self.context.CopyResource(&slots.textures[write_idx], &texture);
                self.context.Flush();
            }
            true
        } else {
            false
        };

        if self.slots.is_none() {
            // No content frame has ever arrived (e.g. the only update so far was a
            // cursor move). Nothing to present yet.
            return Err(CaptureError::Timeout);
        }

        let pointer_shape = if frame_info.PointerShapeBufferSize > 0 {
            self.fetch_pointer_shape().ok()
        } else {
            None
        };

        let cursor_position = if frame_info.LastMouseUpdateTime != 0 {
            Some((
                frame_info.PointerPosition.Position.x,
                frame_info.PointerPosition.Position.y,
                frame_info.PointerPosition.Visible.as_bool(),
            ))
        } else {
            None
        };

        Ok(AcquireOutcome {
            desktop_updated,
            cursor_position,
            pointer_shape,
            geometry_changed,
        })
    }

    /// Ensure three independent NT-shareable slot textures exist at `width`x`height` in
    /// `format`. Returns `true` if they were (re)built (first call, or a dimension/format
    /// change), `false` if the existing slots already match.
    fn ensure_slots(&mut self, width: u32, height: u32, format: FrameFormat) -> anyhow::Result<bool> {
        if let Some(slots) = &self.slots {
            if slots.width == width && slots.height == height && slots.format == format {
                return Ok(false);
            }
        }

        // Drop the old shared handles before creating new ones; CloseHandle is a no-op
        // safety net if the render side never opened them (e.g. very first build).
        if let Some(old) = self.slots.take() {
            for h in old.handles {
                unsafe {
                    let _ = CloseHandle(HANDLE(h as *mut _));
                }
            }
        }

        let desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: format.to_dxgi(),
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as u32,
            CPUAccessFlags: 0,
            MiscFlags: D3D11_RESOURCE_MISC_SHARED_NTHANDLE.0 as u32 | D3D11_RESOURCE_MISC_SHARED.0 as u32,
        };

        let make_one = || -> anyhow::Result<(ID3D11Texture2D, isize)> {
            let mut texture = None;
            unsafe { self.device.CreateTexture2D(&desc, None, Some(&mut texture))? };
            let texture = texture.unwrap();
            let shared: IDXGIResource1 = texture.cast()?;
            let handle = unsafe {
                shared.CreateSharedHandle(
                    None,
                    (DXGI_SHARED_RESOURCE_READ.0 | DXGI_SHARED_RESOURCE_WRITE.0) as u32,
                    None,
                )?
            };
            Ok((texture, handle.0 as isize))
        };

        let (t0, h0) = make_one()?;
        let (t1, h1) = make_one()?;
        let (t2, h2) = make_one()?;

        self.slots = Some(SlotTextures {
            textures: [t0, t1, t2],
            handles: [h0, h1, h2],
            format,
            width,
            height,
        });

        Ok(true)
    }

    /// Current shared-handle geometry snapshot, or `None` before the first qualifying
    /// frame has ever arrived.
    pub fn shared_geometry(&self) -> Option<SharedGeometry> {
        self.slots.as_ref().map(|s| SharedGeometry {
            handles: s.handles,
            format: s.format,
            width: s.width,
            height: s.height,
        })
    }

    fn fetch_pointer_shape(&mut self) -> anyhow::Result<PointerShape> {
        let mut required = 0u32;
        let mut info = DXGI_OUTDUPL_POINTER_SHAPE_INFO::default();

        // First call to learn the required buffer size, per the DXGI contract: a buffer
        // too small returns DXGI_ERROR_MORE_DATA with `required` updated.
        if self.pointer_shape_buf.is_empty() {
            self.pointer_shape_buf.resize(4096, 0);
        }
        loop {
            let result = unsafe {
                self.duplication.GetFramePointerShape(
                    self.pointer_shape_buf.len() as u32,
                    self.pointer_shape_buf.as_mut_ptr() as *mut _,
                    &mut required,
                    &mut info,
                )
            };
            match result {
                Ok(()) => break,
                Err(e) if e.code() == DXGI_ERROR_MORE_DATA => {
                    self.pointer_shape_buf.resize(required as usize, 0);
                }
                Err(e) => return Err(anyhow::anyhow!("GetFramePointerShape failed: {e}")),
            }
        }

        Ok(PointerShape {
            shape_type: info.Type as i32,
            width: info.Width,
            height: info.Height,
            pitch: info.Pitch,
            hotspot_x: info.HotSpot.x,
            hotspot_y: info.HotSpot.y,
            bytes: self.pointer_shape_buf[..required as usize].to_vec(),
        })
    }
}

impl Drop for DuplicationEngine {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.take() {
            for h in slots.handles {
                unsafe {
                    let _ = CloseHandle(HANDLE(h as *mut _));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_format_dxgi_round_trip() {
        assert_eq!(FrameFormat::from_dxgi(FrameFormat::Scrgb.to_dxgi()), Some(FrameFormat::Scrgb));
        assert_eq!(FrameFormat::from_dxgi(FrameFormat::Bgra8.to_dxgi()), Some(FrameFormat::Bgra8));
    }

    #[test]
    fn frame_format_hdr_classification() {
        assert!(FrameFormat::Scrgb.is_hdr());
        assert!(!FrameFormat::Bgra8.is_hdr());
    }
}
