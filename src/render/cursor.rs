// Cursor compositor (C6): converts a captured pointer shape into a straight-alpha RGBA
// texture and draws it as a small alpha-blended quad over the main image.
//
// The byte-level shape decoding (monochrome/color/masked-color) is pure and unit-tested
// without a GPU; `CursorCompositor` below owns the device-side resources and is grounded
// on the same texture-creation idiom as `d3d11::texture::TextureReader`.

use anyhow::Context as _;
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::capture::duplication::PointerShape;
use crate::render::aspect::Viewport;
use crate::render::pipeline::{compile_pixel_shader, compile_vertex_shader};
use crate::render::shaders;

/// DXGI_OUTDUPL_POINTER_SHAPE_TYPE values (the `windows` crate exposes the struct but
/// not named constants for this particular enum).
const POINTER_SHAPE_TYPE_MONOCHROME: i32 = 1;
const POINTER_SHAPE_TYPE_COLOR: i32 = 2;
const POINTER_SHAPE_TYPE_MASKED_COLOR: i32 = 4;

/// Decode a captured pointer shape into a straight-alpha RGBA8 buffer plus its logical
/// pixel dimensions (for monochrome shapes this is half the raw buffer height, since the
/// AND and XOR masks are stacked in one buffer).
pub fn shape_to_rgba(shape: &PointerShape) -> anyhow::Result<(Vec<u8>, u32, u32)> {
    match shape.shape_type {
        POINTER_SHAPE_TYPE_MONOCHROME => Ok(monochrome_to_rgba(&shape.bytes, shape.width, shape.height, shape.pitch)),
        POINTER_SHAPE_TYPE_COLOR => {
            let rgba = color_to_rgba(&shape.bytes, shape.width, shape.height, shape.pitch);
            Ok((rgba, shape.width, shape.height))
        }
        POINTER_SHAPE_TYPE_MASKED_COLOR => {
            let rgba = masked_color_to_rgba(&shape.bytes, shape.width, shape.height, shape.pitch);
            Ok((rgba, shape.width, shape.height))
        }
        other => anyhow::bail!("unrecognized pointer shape type: {other}"),
    }
}

/// Monochrome cursors pack an AND mask followed by an XOR mask, one bit per pixel, each
/// stacked vertically in the same buffer; `height` covers both halves.
fn monochrome_to_rgba(bytes: &[u8], width: u32, height: u32, pitch: u32) -> (Vec<u8>, u32, u32) {
    let logical_height = height / 2;
    let mut out = vec![0u8; (width * logical_height * 4) as usize];

    for row in 0..logical_height {
        for col in 0..width {
            let byte_idx = (col / 8) as usize;
            let bit = 7 - (col % 8);
            let and_byte = bytes[(row * pitch) as usize + byte_idx];
            let xor_byte = bytes[((row + logical_height) * pitch) as usize + byte_idx];
            let and_bit = (and_byte >> bit) & 1;
            let xor_bit = (xor_byte >> bit) & 1;

            // AND=0/XOR=0 -> opaque black, AND=0/XOR=1 -> opaque white,
            // AND=1/XOR=0 -> fully transparent, AND=1/XOR=1 -> inverted (approximated
            // here as translucent white, since true XOR-with-destination has no
            // straight-alpha equivalent).
            let (r, g, b, a) = match (and_bit, xor_bit) {
                (0, 0) => (0u8, 0u8, 0u8, 255u8),
                (0, 1) => (255, 255, 255, 255),
                (1, 0) => (0, 0, 0, 0),
                _ => (255, 255, 255, 128),
            };

            let idx = ((row * width + col) * 4) as usize;
            out[idx] = r;
            out[idx + 1] = g;
            out[idx + 2] = b;
            out[idx + 3] = a;
        }
    }

    (out, width, logical_height)
}

/// Color cursors are plain BGRA straight alpha; only the channel order needs fixing up.
fn color_to_rgba(bytes: &[u8], width: u32, height: u32, pitch: u32) -> Vec<u8> {
    let mut out = vec![0u8; (width * height * 4) as usize];
    for row in 0..height {
        for col in 0..width {
            let src = (row * pitch + col * 4) as usize;
            let dst = ((row * width + col) * 4) as usize;
            out[dst] = bytes[src + 2];
            out[dst + 1] = bytes[src + 1];
            out[dst + 2] = bytes[src];
            out[dst + 3] = bytes[src + 3];
        }
    }
    out
}

/// Masked-color cursors use alpha as a mode selector rather than real alpha: 0xFF means
/// opaque, 0x00 with a non-zero color means XOR-over (approximated here as translucent),
/// 0x00 with a zero color means fully transparent.
fn masked_color_to_rgba(bytes: &[u8], width: u32, height: u32, pitch: u32) -> Vec<u8> {
    let mut out = vec![0u8; (width * height * 4) as usize];
    for row in 0..height {
        for col in 0..width {
            let src = (row * pitch + col * 4) as usize;
            let (b, g, r, a) = (bytes[src], bytes[src + 1], bytes[src + 2], bytes[src + 3]);
            let dst = ((row * width + col) * 4) as usize;
            if a == 0xFF {
                out[dst] = r;
                out[dst + 1] = g;
                out[dst + 2] = b;
                out[dst + 3] = 255;
            } else if r != 0 || g != 0 || b != 0 {
                out[dst] = r;
                out[dst + 1] = g;
                out[dst + 2] = b;
                out[dst + 3] = 128;
            } else {
                out[dst] = 0;
                out[dst + 1] = 0;
                out[dst + 2] = 0;
                out[dst + 3] = 0;
            }
        }
    }
    out
}

#[repr(C)]
#[derive(Clone, Copy)]
struct CursorVertex {
    position: [f32; 2],
    uv: [f32; 2],
}

/// Owns the small, self-contained draw pipeline for the cursor quad: its own
/// vertex/pixel shader pair, input layout, dynamic vertex buffer, sampler and alpha
/// blend state, plus the on-demand texture rebuilt whenever the shape changes.
pub struct CursorCompositor {
    vs: ID3D11VertexShader,
    ps: ID3D11PixelShader,
    input_layout: ID3D11InputLayout,
    vertex_buffer: ID3D11Buffer,
    sampler: ID3D11SamplerState,
    blend_state: ID3D11BlendState,
    texture: Option<ID3D11Texture2D>,
    srv: Option<ID3D11ShaderResourceView>,
    logical_size: (u32, u32),
}

impl CursorCompositor {
    pub fn new(device: &ID3D11Device) -> anyhow::Result<Self> {
        let (vs, vs_layout_blob) = compile_vertex_shader(device, shaders::VS_CURSOR_QUAD, "cursor vertex shader")?;
        let (ps, _) = compile_pixel_shader(device, shaders::PS_CURSOR, "cursor pixel shader")?;

        let layout_elements = [
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: windows::core::s!("POSITION"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 0,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: windows::core::s!("TEXCOORD"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 8,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
        ];

        let mut input_layout = None;
        unsafe {
            device.CreateInputLayout(
                &layout_elements,
                std::slice::from_raw_parts(vs_layout_blob.GetBufferPointer() as *const u8, vs_layout_blob.GetBufferSize()),
                Some(&mut input_layout),
            )?
        };
        let input_layout = input_layout.context("CreateInputLayout returned no layout")?;

        let vb_desc = D3D11_BUFFER_DESC {
            ByteWidth: (std::mem::size_of::<CursorVertex>() * 4) as u32,
            Usage: D3D11_USAGE_DYNAMIC,
            BindFlags: D3D11_BIND_VERTEX_BUFFER.0 as u32,
            CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
            ..Default::default()
        };
        let mut vertex_buffer = None;
        unsafe { device.CreateBuffer(&vb_desc, None, Some(&mut vertex_buffer))? };
        let vertex_buffer = vertex_buffer.context("CreateBuffer returned no vertex buffer")?;

        let sampler_desc = D3D11_SAMPLER_DESC {
            Filter: D3D11_FILTER_MIN_MAG_MIP_LINEAR,
            AddressU: D3D11_TEXTURE_ADDRESS_CLAMP,
            AddressV: D3D11_TEXTURE_ADDRESS_CLAMP,
            AddressW: D3D11_TEXTURE_ADDRESS_CLAMP,
            ComparisonFunc: D3D11_COMPARISON_NEVER,
            MaxLOD: f32::MAX,
            ..Default::default()
        };
        let mut sampler = None;
        unsafe { device.CreateSamplerState(&sampler_desc, Some(&mut sampler))? };
        let sampler = sampler.context("CreateSamplerState returned no sampler")?;

        let mut blend_desc = D3D11_BLEND_DESC::default();
        blend_desc.RenderTarget[0] = D3D11_RENDER_TARGET_BLEND_DESC {
            BlendEnable: true.into(),
            SrcBlend: D3D11_BLEND_SRC_ALPHA,
            DestBlend: D3D11_BLEND_INV_SRC_ALPHA,
            BlendOp: D3D11_BLEND_OP_ADD,
            SrcBlendAlpha: D3D11_BLEND_ONE,
            DestBlendAlpha: D3D11_BLEND_ZERO,
            BlendOpAlpha: D3D11_BLEND_OP_ADD,
            RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8,
        };
        let mut blend_state = None;
        unsafe { device.CreateBlendState(&blend_desc, Some(&mut blend_state))? };
        let blend_state = blend_state.context("CreateBlendState returned no state")?;

        Ok(Self {
            vs,
            ps,
            input_layout,
            vertex_buffer,
            sampler,
            blend_state,
            texture: None,
            srv: None,
            logical_size: (0, 0),
        })
    }

    /// Rebuild the cursor texture from a freshly-dirtied shape. Recreation (rather than
    /// an update-in-place) is cheap enough here: shape changes happen on the order of
    /// once per cursor icon change, not every frame.
    pub fn rebuild_texture(&mut self, device: &ID3D11Device, shape: &PointerShape) -> anyhow::Result<()> {
        let (rgba, width, height) = shape_to_rgba(shape)?;
        if width == 0 || height == 0 {
            self.texture = None;
            self.srv = None;
            return Ok(());
        }

        let desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as u32,
            ..Default::default()
        };
        let initial = D3D11_SUBRESOURCE_DATA {
            pSysMem: rgba.as_ptr() as *const _,
            SysMemPitch: width * 4,
            SysMemSlicePitch: 0,
        };

        let mut texture = None;
        unsafe { device.CreateTexture2D(&desc, Some(&initial), Some(&mut texture))? };
        let texture = texture.context("CreateTexture2D returned no cursor texture")?;

        let mut srv = None;
        unsafe { device.CreateShaderResourceView(&texture, None, Some(&mut srv))? };
        let srv = srv.context("CreateShaderResourceView returned no view")?;

        self.texture = Some(texture);
        self.srv = Some(srv);
        self.logical_size = (width, height);
        Ok(())
    }

    pub fn has_texture(&self) -> bool {
        self.srv.is_some()
    }

    /// Draw the cursor quad at `(x, y)` (source-space top-left corner, already hot-spot
    /// adjusted by the caller) with its logical extent mapped through `viewport`.
    pub fn draw(
        &self,
        context: &ID3D11DeviceContext,
        viewport: Viewport,
        target_w: u32,
        target_h: u32,
        source_w: u32,
        source_h: u32,
        position: (f32, f32),
    ) -> anyhow::Result<()> {
        let Some(srv) = &self.srv else { return Ok(()) };

        let (x0, y0) = crate::render::aspect::source_point_to_ndc(viewport, target_w, target_h, source_w, source_h, position.0, position.1);
        let (x1, y1) = crate::render::aspect::source_point_to_ndc(
            viewport,
            target_w,
            target_h,
            source_w,
            source_h,
            position.0 + self.logical_size.0 as f32,
            position.1 + self.logical_size.1 as f32,
        );

        let verts = [
            CursorVertex { position: [x0, y0], uv: [0.0, 0.0] },
            CursorVertex { position: [x1, y0], uv: [1.0, 0.0] },
            CursorVertex { position: [x0, y1], uv: [0.0, 1.0] },
            CursorVertex { position: [x1, y1], uv: [1.0, 1.0] },
        ];

        unsafe {
            let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
            context.Map(&self.vertex_buffer, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut mapped))?;
            std::ptr::copy_nonoverlapping(verts.as_ptr(), mapped.pData as *mut CursorVertex, verts.len());
            context.Unmap(&self.vertex_buffer, 0);

            context.IASetInputLayout(&self.input_layout);
            context.IASetPrimitiveTopology(windows::Win32::Graphics::Direct3D::D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP);
            let stride = std::mem::size_of::<CursorVertex>() as u32;
            context.IASetVertexBuffers(0, 1, Some(&Some(self.vertex_buffer.clone())), Some(&stride), Some(&0));
            context.VSSetShader(&self.vs, None);
            context.PSSetShader(&self.ps, None);
            context.PSSetShaderResources(0, Some(&[Some(srv.clone())]));
            context.PSSetSamplers(0, Some(&[Some(self.sampler.clone())]));
            context.OMSetBlendState(&self.blend_state, None, 0xffffffff);
            context.Draw(4, 0);
            context.OMSetBlendState(None, None, 0xffffffff);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_shape(w: u32, h: u32, fill: [u8; 4]) -> PointerShape {
        let pitch = w * 4;
        let mut bytes = vec![0u8; (pitch * h) as usize];
        for px in bytes.chunks_mut(4) {
            px.copy_from_slice(&fill);
        }
        PointerShape { shape_type: POINTER_SHAPE_TYPE_COLOR, width: w, height: h, pitch, hotspot_x: 0, hotspot_y: 0, bytes }
    }

    #[test]
    fn color_shape_swaps_bgra_to_rgba() {
        let shape = color_shape(2, 2, [10, 20, 30, 255]); // B,G,R,A
        let (rgba, w, h) = shape_to_rgba(&shape).unwrap();
        assert_eq!((w, h), (2, 2));
        assert_eq!(&rgba[0..4], &[30, 20, 10, 255]);
    }

    #[test]
    fn monochrome_and_xor_zero_zero_is_opaque_black() {
        // 8x2 logical pixels: AND mask all zero, XOR mask all zero -> opaque black.
        let width = 8;
        let logical_height = 2;
        let pitch = 1;
        let mut bytes = vec![0u8; (pitch * logical_height * 2) as usize];
        // Leave AND and XOR both zero.
        let shape = PointerShape { shape_type: POINTER_SHAPE_TYPE_MONOCHROME, width, height: logical_height * 2, pitch, hotspot_x: 0, hotspot_y: 0, bytes: { bytes.resize((pitch * logical_height * 2) as usize, 0); bytes } };
        let (rgba, w, h) = shape_to_rgba(&shape).unwrap();
        assert_eq!((w, h), (8, 2));
        assert_eq!(&rgba[0..4], &[0, 0, 0, 255]);
    }

    #[test]
    fn monochrome_and_one_is_transparent() {
        let width = 8;
        let logical_height = 1;
        let pitch = 1;
        // AND mask byte = 0xFF (all bits set), XOR mask byte = 0x00.
        let bytes = vec![0xFFu8, 0x00u8];
        let shape = PointerShape { shape_type: POINTER_SHAPE_TYPE_MONOCHROME, width, height: logical_height * 2, pitch, hotspot_x: 0, hotspot_y: 0, bytes };
        let (rgba, _, _) = shape_to_rgba(&shape).unwrap();
        assert_eq!(rgba[3], 0);
    }

    #[test]
    fn masked_color_opaque_when_alpha_is_full() {
        let shape = color_shape(1, 1, [40, 50, 60, 0xFF]);
        let mut shape = shape;
        shape.shape_type = POINTER_SHAPE_TYPE_MASKED_COLOR;
        let (rgba, _, _) = shape_to_rgba(&shape).unwrap();
        assert_eq!(rgba[3], 255);
    }

    #[test]
    fn masked_color_transparent_when_alpha_and_color_both_zero() {
        let shape = color_shape(1, 1, [0, 0, 0, 0]);
        let mut shape = shape;
        shape.shape_type = POINTER_SHAPE_TYPE_MASKED_COLOR;
        let (rgba, _, _) = shape_to_rgba(&shape).unwrap();
        assert_eq!(rgba, vec![0, 0, 0, 0]);
    }
}
