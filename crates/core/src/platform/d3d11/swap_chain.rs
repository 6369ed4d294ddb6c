use crate::format::PixelFormat;
use crate::platform::d3d11::{D3D11Texture, D3D11};
use crate::platform::dxgi::{hwnd, D3DError};
use crate::platform::{PlatformPresent, SwapChainImages};
use crate::resource::{PresentMode, SwapChainDesc};
use smallvec::smallvec;
use windows::Win32::Foundation::{DXGI_ERROR_DEVICE_REMOVED, DXGI_ERROR_DEVICE_RESET};
use windows::Win32::Graphics::Direct3D11::ID3D11Texture2D;
use windows::Win32::Graphics::Dxgi::Common::{DXGI_ALPHA_MODE_UNSPECIFIED, DXGI_FORMAT_UNKNOWN, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::{
	IDXGISwapChain1, DXGI_MWA_NO_ALT_ENTER, DXGI_PRESENT, DXGI_SCALING_STRETCH, DXGI_SWAP_CHAIN_DESC1,
	DXGI_SWAP_CHAIN_FLAG, DXGI_SWAP_EFFECT_FLIP_DISCARD, DXGI_USAGE_RENDER_TARGET_OUTPUT,
};

/// Direct3D 11 only ever exposes buffer 0 of a swap chain, so there is a single backbuffer texture that is rendered
/// into every frame.
pub struct D3D11SwapChain {
	pub swap_chain: IDXGISwapChain1,
	format: PixelFormat,
	buffer_count: u32,
	sync_interval: u32,
}

unsafe impl Send for D3D11SwapChain {}
unsafe impl Sync for D3D11SwapChain {}

impl D3D11SwapChain {
	pub unsafe fn new(d3d11: &D3D11, desc: &SwapChainDesc) -> Result<(Self, SwapChainImages<D3D11>), D3DError> {
		profiling::function_scope!();
		unsafe {
			let hwnd = hwnd(desc.surface)?;
			let swap_chain = d3d11.factory.CreateSwapChainForHwnd(
				&d3d11.device,
				hwnd,
				&DXGI_SWAP_CHAIN_DESC1 {
					Width: desc.width,
					Height: desc.height,
					Format: desc.color_format.to_dxgi_swap_chain_format(),
					Stereo: false.into(),
					SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
					BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
					BufferCount: desc.backbuffer_count,
					Scaling: DXGI_SCALING_STRETCH,
					SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
					AlphaMode: DXGI_ALPHA_MODE_UNSPECIFIED,
					Flags: 0,
				},
				None,
				None,
			)?;
			d3d11.factory.MakeWindowAssociation(hwnd, DXGI_MWA_NO_ALT_ENTER)?;
			let swap_chain = Self {
				swap_chain,
				format: desc.color_format,
				buffer_count: desc.backbuffer_count,
				sync_interval: (desc.present_mode == PresentMode::Fifo) as u32,
			};
			let images = swap_chain.images(d3d11)?;
			Ok((swap_chain, images))
		}
	}

	unsafe fn images(&self, d3d11: &D3D11) -> Result<SwapChainImages<D3D11>, D3DError> {
		unsafe {
			let buffer: ID3D11Texture2D = self.swap_chain.GetBuffer(0)?;
			Ok(SwapChainImages {
				textures: smallvec![D3D11Texture::from_backbuffer(d3d11, buffer, self.format)?],
				current: 0,
			})
		}
	}

	pub unsafe fn resize(&mut self, d3d11: &D3D11, width: u32, height: u32) -> Result<SwapChainImages<D3D11>, D3DError> {
		profiling::function_scope!();
		unsafe {
			{
				// the immediate context may still reference the old buffer
				let immediate = d3d11.immediate_context();
				immediate.ClearState();
				immediate.Flush();
			}
			self.swap_chain.ResizeBuffers(
				self.buffer_count,
				width,
				height,
				DXGI_FORMAT_UNKNOWN,
				DXGI_SWAP_CHAIN_FLAG(0),
			)?;
			self.images(d3d11)
		}
	}

	pub unsafe fn present(&mut self) -> Result<PlatformPresent, D3DError> {
		profiling::function_scope!();
		unsafe {
			let hr = self.swap_chain.Present(self.sync_interval, DXGI_PRESENT(0));
			if hr == DXGI_ERROR_DEVICE_REMOVED || hr == DXGI_ERROR_DEVICE_RESET {
				return Err(windows::core::Error::from(hr).into());
			}
			hr.ok()?;
			Ok(PlatformPresent::Presented {
				next_backbuffer: Some(0),
			})
		}
	}
}
