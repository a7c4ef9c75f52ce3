// Render engine (C3) and tonemapper (C5): owns the render-side D3D11 device, the swap
// chain, the consumer side of the triple buffer's shared textures, and the per-frame
// draw sequence described by the render pipeline construction and concurrency/resource
// model sections. Runs on the engine's main thread, driven once per pacing-controlled
// iteration by `engine::MirrorEngine::run`.

pub mod aspect;
pub mod cursor;
pub mod pipeline;
pub mod shaders;

use std::sync::atomic::Ordering;

use anyhow::Context as _;
use windows::core::Interface;
use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND};
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;
use windows::Win32::System::Threading::WaitForSingleObject;

use crate::capture::duplication::{FrameFormat, SharedGeometry};
use crate::capture::thread::CaptureHandle;
use crate::config::MirrorConfig;
use crate::d3d11::{self, D3D11Context};
use crate::render::aspect::{compute_viewport, Viewport};
use crate::render::cursor::CursorCompositor;
use crate::render::pipeline::{ImagePipeline, ImageShader};

/// The swap chain and its render target view, with an optional waitable frame-latency
/// object when `use_waitable_swapchain` is enabled in configuration.
struct SwapChainTarget {
    swapchain: IDXGISwapChain1,
    waitable: Option<HANDLE>,
    rtv: ID3D11RenderTargetView,
    width: u32,
    height: u32,
}

impl SwapChainTarget {
    fn new(device: &ID3D11Device, hwnd: HWND, width: u32, height: u32, use_waitable: bool) -> anyhow::Result<Self> {
        let dxgi_device: IDXGIDevice = device.cast()?;
        let adapter = unsafe { dxgi_device.GetAdapter()? };
        let factory: IDXGIFactory2 = unsafe { adapter.GetParent()? };

        let flags = if use_waitable { DXGI_SWAP_CHAIN_FLAG_FRAME_LATENCY_WAITABLE_OBJECT.0 as u32 } else { 0 };

        let desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: width,
            Height: height,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: 2,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            Flags: flags,
            ..Default::default()
        };

        let swapchain = unsafe { factory.CreateSwapChainForHwnd(device, hwnd, &desc, None, None) }
            .context("CreateSwapChainForHwnd failed")?;

        let waitable = if use_waitable {
            let swapchain2: IDXGISwapChain2 = swapchain.cast().context("waitable swap chain requested but IDXGISwapChain2 unavailable")?;
            unsafe { swapchain2.SetMaximumFrameLatency(1)? };
            Some(unsafe { swapchain2.GetFrameLatencyWaitableObject() })
        } else {
            None
        };

        let rtv = Self::make_rtv(device, &swapchain)?;

        Ok(Self { swapchain, waitable, rtv, width, height })
    }

    fn make_rtv(device: &ID3D11Device, swapchain: &IDXGISwapChain1) -> anyhow::Result<ID3D11RenderTargetView> {
        let backbuffer: ID3D11Texture2D = unsafe { swapchain.GetBuffer(0)? };
        let mut rtv = None;
        unsafe { device.CreateRenderTargetView(&backbuffer, None, Some(&mut rtv))? };
        rtv.context("CreateRenderTargetView returned no view")
    }

    /// Block until the swap chain signals it is ready to accept the next frame. A
    /// no-op when `use_waitable_swapchain` is disabled.
    fn wait_for_frame(&self, timeout_ms: u32) {
        if let Some(handle) = self.waitable {
            unsafe {
                WaitForSingleObject(handle, timeout_ms);
            }
        }
    }

    fn present(&self) -> anyhow::Result<()> {
        unsafe { self.swapchain.Present(1, DXGI_PRESENT(0)) }.context("Present failed")
    }
}

impl Drop for SwapChainTarget {
    fn drop(&mut self) {
        if let Some(handle) = self.waitable.take() {
            unsafe {
                let _ = CloseHandle(handle);
            }
        }
    }
}

/// The render side's own view of the three triple-buffer slot textures, opened from the
/// capture side's NT-shareable handles via `ID3D11Device1::OpenSharedResource1`. Rebuilt
/// whenever `CaptureHandle::geometry_version` advances.
struct RenderSlots {
    srvs: [Option<ID3D11ShaderResourceView>; 3],
    format: FrameFormat,
    width: u32,
    height: u32,
}

impl RenderSlots {
    fn open(device1: &ID3D11Device1, geometry: &SharedGeometry) -> anyhow::Result<Self> {
        let mut srvs: [Option<ID3D11ShaderResourceView>; 3] = [None, None, None];
        for (i, &raw_handle) in geometry.handles.iter().enumerate() {
            let texture: ID3D11Texture2D = unsafe { device1.OpenSharedResource1(HANDLE(raw_handle as *mut _))? };
            let mut srv = None;
            unsafe { device1.CreateShaderResourceView(&texture, None, Some(&mut srv))? };
            srvs[i] = srv;
        }
        Ok(Self { srvs, format: geometry.format, width: geometry.width, height: geometry.height })
    }
}

/// Ties together the render-side device, swap chain, pipeline and cursor compositor
/// into the single per-iteration draw sequence the component design describes.
pub struct RenderEngine {
    context: ID3D11DeviceContext,
    device1: ID3D11Device1,
    swapchain: SwapChainTarget,
    pipeline: ImagePipeline,
    cursor: CursorCompositor,
    render_slots: Option<RenderSlots>,
    geometry_version_seen: u64,
}

impl RenderEngine {
    pub fn new(device_ctx: D3D11Context, hwnd: HWND, target_width: u32, target_height: u32, use_waitable: bool) -> anyhow::Result<Self> {
        let device1 = d3d11::as_device1(&device_ctx.device)?;
        let swapchain = SwapChainTarget::new(&device_ctx.device, hwnd, target_width, target_height, use_waitable)?;
        let pipeline = ImagePipeline::new(&device_ctx.device)?;
        let cursor = CursorCompositor::new(&device_ctx.device)?;

        Ok(Self {
            context: device_ctx.context,
            device1,
            swapchain,
            pipeline,
            cursor,
            render_slots: None,
            geometry_version_seen: 0,
        })
    }

    /// Pick up a new geometry generation if the capture side has published one since we
    /// last looked. Returns `Ok(true)` once slots are ready to sample from (either
    /// because nothing changed and they already were, or because they were just
    /// rebuilt).
    fn ensure_geometry(&mut self, capture: &CaptureHandle) -> anyhow::Result<bool> {
        let current = capture.geometry_version.load(Ordering::SeqCst);
        if current != self.geometry_version_seen || self.render_slots.is_none() {
            let snapshot = *capture.geometry.lock().expect("geometry mutex poisoned");
            let Some(snapshot) = snapshot else { return Ok(false) };
            self.render_slots = Some(RenderSlots::open(&self.device1, &snapshot)?);
            self.geometry_version_seen = current;
        }
        Ok(self.render_slots.is_some())
    }

    fn choose_shader(format: FrameFormat, tonemap_enabled: bool) -> ImageShader {
        match (format.is_hdr(), tonemap_enabled) {
            (true, true) => ImageShader::HdrReinhard,
            (true, false) => ImageShader::LinearToSrgb,
            (false, _) => ImageShader::Passthrough,
        }
    }

    /// Render one iteration: wait for the swap chain (if waitable), acquire whatever
    /// frame the triple buffer currently has ready, draw the image pass and (if
    /// enabled) the cursor overlay, and present. Returns the frame ID actually rendered,
    /// or `None` if there was nothing new to show (no geometry yet, or the triple
    /// buffer had nothing ready — the caller is expected to keep pacing regardless).
    pub fn render_once(&mut self, capture: &CaptureHandle, cfg: &MirrorConfig, wait_timeout_ms: u32) -> anyhow::Result<Option<u64>> {
        if !self.ensure_geometry(capture)? {
            return Ok(None);
        }

        self.swapchain.wait_for_frame(wait_timeout_ms);

        let Some((slot_idx, frame_id)) = capture.buffer.acquire() else {
            return Ok(None);
        };

        let slots = self.render_slots.as_ref().expect("ensure_geometry guarantees this");
        let srv = slots.srvs[slot_idx].as_ref().expect("every slot has an SRV once opened").clone();
        let (source_w, source_h, format) = (slots.width, slots.height, slots.format);

        let viewport = compute_viewport(cfg.preserve_aspect, self.swapchain.width, self.swapchain.height, source_w, source_h);

        unsafe {
            self.context.OMSetRenderTargets(Some(&[Some(self.swapchain.rtv.clone())]), None);
            self.context.ClearRenderTargetView(&self.swapchain.rtv, &[0.0, 0.0, 0.0, 1.0]);
        }

        let shader = Self::choose_shader(format, cfg.tonemap_enabled);

        unsafe {
            self.context.RSSetViewports(Some(&[D3D11_VIEWPORT {
                TopLeftX: viewport.x,
                TopLeftY: viewport.y,
                Width: viewport.width,
                Height: viewport.height,
                MinDepth: 0.0,
                MaxDepth: 1.0,
            }]));
        }

        self.pipeline.draw(&self.context, &srv, shader, cfg.sdr_white_nits)?;

        if cfg.show_cursor {
            self.draw_cursor(capture, viewport, source_w, source_h)?;
        }

        // Unbind the pixel-shader input so the slot texture isn't left bound as a
        // shader resource across iterations; the capture thread may reuse this slot
        // for its next write as soon as this frame is released.
        unsafe { self.context.PSSetShaderResources(0, Some(&[None])) };

        self.swapchain.present()?;

        Ok(Some(frame_id))
    }

    fn draw_cursor(&mut self, capture: &CaptureHandle, viewport: Viewport, source_w: u32, source_h: u32) -> anyhow::Result<()> {
        if let Some(shape) = capture.cursor.take_if_dirty() {
            self.cursor.rebuild_texture(&self.device1, &shape)?;
        }

        if !self.cursor.has_texture() {
            return Ok(());
        }

        let (x, y, visible) = capture.cursor.position();
        if !visible {
            return Ok(());
        }

        self.cursor
            .draw(&self.context, viewport, self.swapchain.width, self.swapchain.height, source_w, source_h, (x as f32, y as f32))
    }
}
