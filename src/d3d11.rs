// D3D11 device creation, shared by both engine-owned devices (render + capture).
//
// Each of the two long-lived threads gets its own independently created device/context
// pair (see `capture::thread` and `render`); nothing here is a singleton. `D3D11Context`
// is a plain value the engine holds onto and drops during its own teardown.

pub mod texture;

use anyhow::Context;
use windows::core::Interface;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::*;

/// A D3D11 device plus its immediate context and `IDXGIDevice` view, bundled because
/// almost every caller needs all three (the device to create resources, the context to
/// issue commands, the DXGI device to reach the adapter for enumeration/sharing).
pub struct D3D11Context {
    pub device: ID3D11Device,
    pub context: ID3D11DeviceContext,
    pub dxgi_device: IDXGIDevice,
}

/// Create a hardware D3D11 device at feature level 11.0 with BGRA support (required by
/// both the desktop duplication API and the swap chain's 8-bit back buffer format).
pub fn create_d3d11_device() -> anyhow::Result<D3D11Context> {
    let (device, context) = unsafe {
        let mut device = None;
        let mut context = None;

        D3D11CreateDevice(
            None,
            D3D_DRIVER_TYPE_HARDWARE,
            HMODULE::default(),
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            Some(&[D3D_FEATURE_LEVEL_11_0]),
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )
        .context("D3D11CreateDevice failed")?;

        (device.unwrap(), context.unwrap())
    };

    let dxgi_device: IDXGIDevice = device.cast().unwrap();

    let _ = log_device_info(&dxgi_device);

    Ok(D3D11Context {
        device,
        context,
        dxgi_device,
    })
}

/// Cast an existing device to its D3D11.1 interface, needed for NT-handle resource
/// sharing (`IDXGIResource1::CreateSharedHandle` / `ID3D11Device1::OpenSharedResource1`)
/// between the capture device and the render device.
pub fn as_device1(device: &ID3D11Device) -> anyhow::Result<ID3D11Device1> {
    device
        .cast()
        .context("ID3D11Device1 not available (requires the D3D11.1 runtime)")
}

fn log_device_info(dxgi_device: &IDXGIDevice) -> anyhow::Result<()> {
    unsafe {
        let adapter = dxgi_device.GetAdapter()?;
        let desc = adapter.GetDesc()?;
        let name = String::from_utf16_lossy(&desc.Description);

        log::info!("D3D11 device created");
        log::info!("  adapter: {}", name.trim_end_matches('\0'));
        log::info!("  dedicated VRAM: {} MB", desc.DedicatedVideoMemory / 1024 / 1024);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_creation() {
        let _ctx = create_d3d11_device().expect("device creation failed");
    }

    #[test]
    fn test_device_info() {
        let ctx = create_d3d11_device().unwrap();
        let result = log_device_info(&ctx.dxgi_device);
        assert!(result.is_ok());
    }

    #[test]
    fn test_dxgi_adapter() {
        let ctx = create_d3d11_device().unwrap();

        unsafe {
            let adapter = ctx.dxgi_device.GetAdapter();
            assert!(adapter.is_ok());
            let desc = adapter.unwrap().GetDesc();
            assert!(desc.is_ok());
        }
    }

    #[test]
    fn test_device1_cast_available() {
        let ctx = create_d3d11_device().unwrap();
        // D3D11.1 is available on any Windows 8+ box; this is the runtime this crate
        // targets for NT-handle cross-device texture sharing.
        assert!(as_device1(&ctx.device).is_ok());
    }
}
