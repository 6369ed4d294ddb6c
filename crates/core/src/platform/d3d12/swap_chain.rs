use crate::format::PixelFormat;
use crate::platform::d3d12::{D3D12Queue, D3D12Texture, D3D12};
use crate::platform::dxgi::{hwnd, D3DError};
use crate::platform::{PlatformPresent, SwapChainImages};
use crate::resource::{PresentMode, SwapChainDesc};
use smallvec::SmallVec;
use windows::core::Interface;
use windows::Win32::Foundation::{DXGI_ERROR_DEVICE_REMOVED, DXGI_ERROR_DEVICE_RESET};
use windows::Win32::Graphics::Direct3D12::ID3D12Resource;
use windows::Win32::Graphics::Dxgi::Common::{
	DXGI_ALPHA_MODE_UNSPECIFIED, DXGI_FORMAT_UNKNOWN, DXGI_SAMPLE_DESC,
};
use windows::Win32::Graphics::Dxgi::{
	IDXGISwapChain1, IDXGISwapChain3, DXGI_MWA_NO_ALT_ENTER, DXGI_PRESENT, DXGI_PRESENT_ALLOW_TEARING,
	DXGI_SCALING_STRETCH, DXGI_SWAP_CHAIN_DESC1, DXGI_SWAP_CHAIN_FLAG, DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING,
	DXGI_SWAP_EFFECT_FLIP_DISCARD, DXGI_USAGE_RENDER_TARGET_OUTPUT,
};

pub struct D3D12SwapChain {
	pub swap_chain: IDXGISwapChain3,
	format: PixelFormat,
	buffer_count: u32,
	sync_interval: u32,
	present_flags: DXGI_PRESENT,
	flags: DXGI_SWAP_CHAIN_FLAG,
}

unsafe impl Send for D3D12SwapChain {}
unsafe impl Sync for D3D12SwapChain {}

impl D3D12SwapChain {
	pub unsafe fn new(
		d3d12: &D3D12,
		queue: &D3D12Queue,
		desc: &SwapChainDesc,
	) -> Result<(Self, SwapChainImages<D3D12>), D3DError> {
		profiling::function_scope!();
		unsafe {
			let hwnd = hwnd(desc.surface)?;
			let tearing = desc.present_mode == PresentMode::Immediate && d3d12.tearing_supported;
			let flags = if tearing {
				DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING
			} else {
				DXGI_SWAP_CHAIN_FLAG(0)
			};
			let swap_chain1: IDXGISwapChain1 = d3d12.factory.CreateSwapChainForHwnd(
				&queue.queue,
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
					Flags: flags.0 as u32,
				},
				None,
				None,
			)?;
			d3d12.factory.MakeWindowAssociation(hwnd, DXGI_MWA_NO_ALT_ENTER)?;

			let swap_chain = Self {
				swap_chain: swap_chain1.cast::<IDXGISwapChain3>()?,
				format: desc.color_format,
				buffer_count: desc.backbuffer_count,
				sync_interval: (desc.present_mode == PresentMode::Fifo) as u32,
				present_flags: if tearing {
					DXGI_PRESENT_ALLOW_TEARING
				} else {
					DXGI_PRESENT(0)
				},
				flags,
			};
			let images = swap_chain.images(d3d12)?;
			Ok((swap_chain, images))
		}
	}

	unsafe fn images(&self, d3d12: &D3D12) -> Result<SwapChainImages<D3D12>, D3DError> {
		unsafe {
			let mut textures = SmallVec::new();
			for i in 0..self.buffer_count {
				let resource: ID3D12Resource = self.swap_chain.GetBuffer(i)?;
				textures.push(D3D12Texture::from_backbuffer(d3d12, resource, self.format)?);
			}
			Ok(SwapChainImages {
				textures,
				current: self.swap_chain.GetCurrentBackBufferIndex(),
			})
		}
	}

	pub unsafe fn resize(&mut self, d3d12: &D3D12, width: u32, height: u32) -> Result<SwapChainImages<D3D12>, D3DError> {
		profiling::function_scope!();
		unsafe {
			self.swap_chain
				.ResizeBuffers(self.buffer_count, width, height, DXGI_FORMAT_UNKNOWN, self.flags)?;
			self.images(d3d12)
		}
	}

	pub unsafe fn present(&mut self) -> Result<PlatformPresent, D3DError> {
		profiling::function_scope!();
		unsafe {
			let hr = self.swap_chain.Present(self.sync_interval, self.present_flags);
			if hr == DXGI_ERROR_DEVICE_REMOVED || hr == DXGI_ERROR_DEVICE_RESET {
				return Err(windows::core::Error::from(hr).into());
			}
			hr.ok()?;
			Ok(PlatformPresent::Presented {
				next_backbuffer: Some(self.swap_chain.GetCurrentBackBufferIndex()),
			})
		}
	}
}
