// Shader compilation and the fixed-function pipeline state for the main image pass.
// Built on the same `D3DCompile` invocation pattern `d3d11::compute::ComputeShader`
// uses elsewhere in this crate, retargeted from a `cs_5_0` compute kernel to the
// `vs_5_0`/`ps_5_0` draw pipeline this pass needs instead.

use anyhow::Context as _;
use windows::core::{s, PCSTR};
use windows::Win32::Graphics::Direct3D::Fxc::D3DCompile;
use windows::Win32::Graphics::Direct3D::ID3DBlob;
use windows::Win32::Graphics::Direct3D11::*;

use crate::render::shaders;

/// Compile HLSL source with the given entry point and target profile, returning the
/// compiled bytecode blob. Shared by vertex/pixel compile helpers below.
fn compile_blob(source: &str, target: PCSTR, label: &str) -> anyhow::Result<ID3DBlob> {
    let mut code: Option<ID3DBlob> = None;
    let mut errors: Option<ID3DBlob> = None;

    let result = unsafe {
        D3DCompile(
            source.as_ptr() as *const _,
            source.len(),
            PCSTR::null(),
            None,
            None,
            s!("main"),
            target,
            0,
            0,
            &mut code,
            Some(&mut errors),
        )
    };

    if let Err(e) = result {
        let message = errors
            .map(|blob| unsafe {
                let ptr = blob.GetBufferPointer() as *const u8;
                let len = blob.GetBufferSize();
                String::from_utf8_lossy(std::slice::from_raw_parts(ptr, len)).into_owned()
            })
            .unwrap_or_default();
        anyhow::bail!("failed to compile {label}: {e}\n{message}");
    }

    code.context("D3DCompile reported success but returned no bytecode")
}

/// Compile a vertex shader, returning both the live shader object and its bytecode blob
/// (needed separately to build a matching `ID3D11InputLayout`).
pub fn compile_vertex_shader(device: &ID3D11Device, source: &str, label: &str) -> anyhow::Result<(ID3D11VertexShader, ID3DBlob)> {
    let blob = compile_blob(source, s!("vs_5_0"), label)?;
    let bytes = unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) };
    let mut shader = None;
    unsafe { device.CreateVertexShader(bytes, None, Some(&mut shader))? };
    Ok((shader.context("CreateVertexShader returned no shader")?, blob))
}

/// Compile a pixel shader, returning the live shader object and its bytecode blob (the
/// blob is unused by most callers but kept for symmetry with `compile_vertex_shader`).
pub fn compile_pixel_shader(device: &ID3D11Device, source: &str, label: &str) -> anyhow::Result<(ID3D11PixelShader, ID3DBlob)> {
    let blob = compile_blob(source, s!("ps_5_0"), label)?;
    let bytes = unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) };
    let mut shader = None;
    unsafe { device.CreatePixelShader(bytes, None, Some(&mut shader))? };
    Ok((shader.context("CreatePixelShader returned no shader")?, blob))
}

/// Which pixel shader the main image pass should draw with, chosen once per geometry
/// generation from the captured format and the tonemap-enabled config flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageShader {
    Passthrough,
    HdrReinhard,
    LinearToSrgb,
}

/// The 16-byte-aligned constant buffer payload for the HDR-Reinhard pixel shader.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TonemapConstants {
    pub sdr_white_nits: f32,
    _padding: [f32; 3],
}

impl TonemapConstants {
    pub fn new(sdr_white_nits: f32) -> Self {
        Self { sdr_white_nits, _padding: [0.0; 3] }
    }
}

/// The compiled shader set plus the fixed-function state shared by every draw of the
/// main full-screen quad: one vertex shader, three interchangeable pixel shaders, a
/// linear-clamp sampler, an opaque blend state and a depth-disabled state (no depth
/// buffer is ever bound, so depth testing is switched off rather than left implicit).
pub struct ImagePipeline {
    vs_fullscreen: ID3D11VertexShader,
    ps_passthrough: ID3D11PixelShader,
    ps_hdr_reinhard: ID3D11PixelShader,
    ps_linear_to_srgb: ID3D11PixelShader,
    sampler: ID3D11SamplerState,
    raster_state: ID3D11RasterizerState,
    depth_state: ID3D11DepthStencilState,
    opaque_blend: ID3D11BlendState,
    tonemap_cb: ID3D11Buffer,
}

impl ImagePipeline {
    pub fn new(device: &ID3D11Device) -> anyhow::Result<Self> {
        let (vs_fullscreen, _) = compile_vertex_shader(device, shaders::VS_FULLSCREEN_QUAD, "full-screen quad vertex shader")?;
        let (ps_passthrough, _) = compile_pixel_shader(device, shaders::PS_PASSTHROUGH, "passthrough pixel shader")?;
        let (ps_hdr_reinhard, _) = compile_pixel_shader(device, shaders::PS_HDR_REINHARD, "HDR Reinhard pixel shader")?;
        let (ps_linear_to_srgb, _) = compile_pixel_shader(device, shaders::PS_LINEAR_TO_SRGB, "linear-to-sRGB pixel shader")?;

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

        let raster_desc = D3D11_RASTERIZER_DESC {
            FillMode: D3D11_FILL_SOLID,
            CullMode: D3D11_CULL_NONE,
            ..Default::default()
        };
        let mut raster_state = None;
        unsafe { device.CreateRasterizerState(&raster_desc, Some(&mut raster_state))? };
        let raster_state = raster_state.context("CreateRasterizerState returned no state")?;

        let depth_desc = D3D11_DEPTH_STENCIL_DESC {
            DepthEnable: false.into(),
            DepthWriteMask: D3D11_DEPTH_WRITE_MASK_ZERO,
            ..Default::default()
        };
        let mut depth_state = None;
        unsafe { device.CreateDepthStencilState(&depth_desc, Some(&mut depth_state))? };
        let depth_state = depth_state.context("CreateDepthStencilState returned no state")?;

        let mut opaque_desc = D3D11_BLEND_DESC::default();
        opaque_desc.RenderTarget[0] = D3D11_RENDER_TARGET_BLEND_DESC {
            BlendEnable: false.into(),
            RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8,
            ..Default::default()
        };
        let mut opaque_blend = None;
        unsafe { device.CreateBlendState(&opaque_desc, Some(&mut opaque_blend))? };
        let opaque_blend = opaque_blend.context("CreateBlendState returned no state")?;

        let cb_desc = D3D11_BUFFER_DESC {
            ByteWidth: std::mem::size_of::<TonemapConstants>() as u32,
            Usage: D3D11_USAGE_DYNAMIC,
            BindFlags: D3D11_BIND_CONSTANT_BUFFER.0 as u32,
            CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as u32,
            ..Default::default()
        };
        let mut tonemap_cb = None;
        unsafe { device.CreateBuffer(&cb_desc, None, Some(&mut tonemap_cb))? };
        let tonemap_cb = tonemap_cb.context("CreateBuffer returned no constant buffer")?;

        Ok(Self {
            vs_fullscreen,
            ps_passthrough,
            ps_hdr_reinhard,
            ps_linear_to_srgb,
            sampler,
            raster_state,
            depth_state,
            opaque_blend,
            tonemap_cb,
        })
    }

    fn pixel_shader(&self, which: ImageShader) -> &ID3D11PixelShader {
        match which {
            ImageShader::Passthrough => &self.ps_passthrough,
            ImageShader::HdrReinhard => &self.ps_hdr_reinhard,
            ImageShader::LinearToSrgb => &self.ps_linear_to_srgb,
        }
    }

    /// Draw the full-screen quad sampling `srv` into whatever render target and
    /// viewport the caller already bound, using `which` pixel shader. For
    /// `ImageShader::HdrReinhard`, `sdr_white_nits` is uploaded to the constant buffer
    /// first; other shaders ignore it.
    pub fn draw(&self, context: &ID3D11DeviceContext, srv: &ID3D11ShaderResourceView, which: ImageShader, sdr_white_nits: f32) -> anyhow::Result<()> {
        if which == ImageShader::HdrReinhard {
            unsafe {
                let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
                context.Map(&self.tonemap_cb, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut mapped))?;
                let constants = TonemapConstants::new(sdr_white_nits);
                std::ptr::copy_nonoverlapping(&constants, mapped.pData as *mut TonemapConstants, 1);
                context.Unmap(&self.tonemap_cb, 0);
            }
        }

        unsafe {
            context.IASetPrimitiveTopology(windows::Win32::Graphics::Direct3D::D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP);
            context.IASetInputLayout(None);
            context.VSSetShader(&self.vs_fullscreen, None);
            context.PSSetShader(self.pixel_shader(which), None);
            context.PSSetShaderResources(0, Some(&[Some(srv.clone())]));
            context.PSSetSamplers(0, Some(&[Some(self.sampler.clone())]));
            if which == ImageShader::HdrReinhard {
                context.PSSetConstantBuffers(0, Some(&[Some(self.tonemap_cb.clone())]));
            }
            context.RSSetState(&self.raster_state);
            context.OMSetDepthStencilState(&self.depth_state, 0);
            context.OMSetBlendState(&self.opaque_blend, None, 0xffffffff);
            context.Draw(4, 0);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::d3d11::create_d3d11_device;

    #[test]
    fn image_pipeline_compiles_all_shaders() {
        let ctx = create_d3d11_device().unwrap();
        let _pipeline = ImagePipeline::new(&ctx.device).expect("pipeline construction failed");
    }

    #[test]
    fn tonemap_constants_layout_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<TonemapConstants>(), 16);
    }
}
