// Embedded HLSL source for the render pipeline and tonemapper.
//
// Treated as immutable build-time data, compiled once at startup via `D3DCompile`
// (see `render::pipeline`), the same idiom the compute-shader path elsewhere in this
// crate used for its compute kernels — retargeted here from `cs_5_0` to `vs_5_0`/
// `ps_5_0` since this pipeline draws through a swap chain rather than dispatching a
// compute pass. These are newly authored against the tonemapping and compositing
// formulas the rest of the crate implements.

/// Full-screen quad vertex shader: four vertices forming a triangle strip that covers
/// the entire clip-space rectangle, looked up by `SV_VertexID` from a static array so no
/// vertex buffer is needed for the main image pass (see render pipeline construction).
pub const VS_FULLSCREEN_QUAD: &str = r#"
struct VSOutput
{
    float4 position : SV_Position;
    float2 uv : TEXCOORD0;
};

static const float2 kPositions[4] =
{
    float2(-1.0,  1.0),
    float2( 1.0,  1.0),
    float2(-1.0, -1.0),
    float2( 1.0, -1.0),
};

static const float2 kUvs[4] =
{
    float2(0.0, 0.0),
    float2(1.0, 0.0),
    float2(0.0, 1.0),
    float2(1.0, 1.0),
};

VSOutput main(uint id : SV_VertexID)
{
    VSOutput output;
    output.position = float4(kPositions[id], 0.0, 1.0);
    output.uv = kUvs[id];
    return output;
}
"#;

/// Passthrough pixel shader: the source texture is already an 8-bit sRGB-encoded
/// container, so no tonemapping or gamma conversion is needed.
pub const PS_PASSTHROUGH: &str = r#"
struct VSOutput
{
    float4 position : SV_Position;
    float2 uv : TEXCOORD0;
};

Texture2D<float4> InputTexture : register(t0);
SamplerState LinearClamp : register(s0);

float4 main(VSOutput input) : SV_Target
{
    return InputTexture.Sample(LinearClamp, input.uv);
}
"#;

/// maxRGB Reinhard HDR->SDR tonemap, parameterised by the SDR-white reference in the
/// constant buffer.
pub const PS_HDR_REINHARD: &str = r#"
struct VSOutput
{
    float4 position : SV_Position;
    float2 uv : TEXCOORD0;
};

cbuffer TonemapParams : register(b0)
{
    float SdrWhiteNits;
    float3 _Padding;
};

Texture2D<float4> InputTexture : register(t0);
SamplerState LinearClamp : register(s0);

float3 srgb_oetf(float3 c)
{
    float3 lo = c * 12.92;
    float3 hi = 1.055 * pow(max(c, 0.0), 1.0 / 2.4) - 0.055;
    float3 mask = step(0.0031308, c);
    return lerp(lo, hi, mask);
}

float4 main(VSOutput input) : SV_Target
{
    float4 scrgb = InputTexture.Sample(LinearClamp, input.uv);
    float3 linearColor = max(scrgb.rgb, 0.0) * (80.0 / SdrWhiteNits);

    float m = max(linearColor.r, max(linearColor.g, linearColor.b));
    float3 mapped = linearColor;
    if (m > 1.0)
    {
        float scale = (m / (1.0 + m)) / m;
        mapped = linearColor * scale;
    }
    mapped = saturate(mapped);

    return float4(srgb_oetf(mapped), scrgb.a);
}
"#;

/// Auxiliary pixel shader for a linear-container SDR source (no HDR highlights to
/// compress, but still needs the sRGB OETF applied before it reaches the 8-bit back
/// buffer).
pub const PS_LINEAR_TO_SRGB: &str = r#"
struct VSOutput
{
    float4 position : SV_Position;
    float2 uv : TEXCOORD0;
};

Texture2D<float4> InputTexture : register(t0);
SamplerState LinearClamp : register(s0);

float3 srgb_oetf(float3 c)
{
    float3 lo = c * 12.92;
    float3 hi = 1.055 * pow(max(c, 0.0), 1.0 / 2.4) - 0.055;
    float3 mask = step(0.0031308, c);
    return lerp(lo, hi, mask);
}

float4 main(VSOutput input) : SV_Target
{
    float4 c = InputTexture.Sample(LinearClamp, input.uv);
    return float4(srgb_oetf(saturate(c.rgb)), c.a);
}
"#;

/// Cursor quad vertex shader: unlike the main image pass, the cursor's screen-space
/// rectangle moves every frame (it tracks the mouse), so its four corners come from a
/// small dynamic vertex buffer rather than a static in-shader table.
pub const VS_CURSOR_QUAD: &str = r#"
struct VSInput
{
    float2 position : POSITION;
    float2 uv : TEXCOORD0;
};

struct VSOutput
{
    float4 position : SV_Position;
    float2 uv : TEXCOORD0;
};

VSOutput main(VSInput input)
{
    VSOutput output;
    output.position = float4(input.position, 0.0, 1.0);
    output.uv = input.uv;
    return output;
}
"#;

/// Cursor pixel shader: straight-alpha sample, blended over the output via the alpha
/// blend state the cursor compositor binds (SrcAlpha, InvSrcAlpha).
pub const PS_CURSOR: &str = r#"
struct VSOutput
{
    float4 position : SV_Position;
    float2 uv : TEXCOORD0;
};

Texture2D<float4> CursorTexture : register(t0);
SamplerState LinearClamp : register(s0);

float4 main(VSOutput input) : SV_Target
{
    return CursorTexture.Sample(LinearClamp, input.uv);
}
"#;
