//! DXGI plumbing shared by the Direct3D backends: factories, adapter enumeration, format conversion and window
//! handles.

use crate::device::{AdapterInfo, Debuggers, GraphicsDeviceFeatures, MemoryArchitecture, PowerPreference};
use crate::format::PixelFormat;
use crate::resource::SurfaceTarget;
use log::{debug, warn};
use raw_window_handle::RawWindowHandle;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;
use windows::core::Interface;
use windows::Win32::Foundation::{DXGI_ERROR_NOT_FOUND, HWND};
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::{
	CreateDXGIFactory2, IDXGIAdapter1, IDXGIFactory4, IDXGIFactory6, DXGI_ADAPTER_DESC1, DXGI_ADAPTER_FLAG_SOFTWARE,
	DXGI_CREATE_FACTORY_DEBUG, DXGI_CREATE_FACTORY_FLAGS, DXGI_GPU_PREFERENCE, DXGI_GPU_PREFERENCE_HIGH_PERFORMANCE,
	DXGI_GPU_PREFERENCE_MINIMUM_POWER, DXGI_GPU_PREFERENCE_UNSPECIFIED,
};

#[derive(Error)]
pub enum D3DError {
	#[error("{0}")]
	Windows(#[from] windows::core::Error),
	#[error("No adapter supporting the required feature level found")]
	NoSuitableAdapter,
	#[error("{0:?} is not supported by this device for the requested usage")]
	UnsupportedFormat(PixelFormat),
	#[error("Swap chains require a SurfaceTarget")]
	MissingSurface,
	#[error("Swap chains can only present to Win32 windows, got {0:?}")]
	UnsupportedWindow(RawWindowHandle),
	#[error("Mapping a buffer failed")]
	MapFailed,
	#[error("{0} succeeded without returning an object")]
	NoObject(&'static str),
}

impl Debug for D3DError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}

pub fn create_factory(debug: Debuggers) -> Result<IDXGIFactory4, D3DError> {
	let flags = if debug.validation_enabled() {
		DXGI_CREATE_FACTORY_DEBUG
	} else {
		DXGI_CREATE_FACTORY_FLAGS(0)
	};
	unsafe {
		match CreateDXGIFactory2(flags) {
			Ok(factory) => Ok(factory),
			Err(e) if flags == DXGI_CREATE_FACTORY_DEBUG => {
				warn!("DXGI debug factory unavailable, falling back to a release factory: {}", e);
				Ok(CreateDXGIFactory2(DXGI_CREATE_FACTORY_FLAGS(0))?)
			}
			Err(e) => Err(e.into()),
		}
	}
}

fn gpu_preference(power_preference: PowerPreference) -> DXGI_GPU_PREFERENCE {
	match power_preference {
		PowerPreference::Default => DXGI_GPU_PREFERENCE_UNSPECIFIED,
		PowerPreference::LowPower => DXGI_GPU_PREFERENCE_MINIMUM_POWER,
		PowerPreference::HighPerformance => DXGI_GPU_PREFERENCE_HIGH_PERFORMANCE,
	}
}

/// All adapters ordered by `power_preference` if the factory supports it, hardware adapters before software ones.
pub fn enumerate_adapters(factory: &IDXGIFactory4, power_preference: PowerPreference) -> Vec<IDXGIAdapter1> {
	profiling::function_scope!();
	let mut adapters = Vec::with_capacity(4);
	let factory6 = factory.cast::<IDXGIFactory6>().ok();
	for index in 0.. {
		let adapter = unsafe {
			match factory6.as_ref() {
				Some(factory6) => {
					factory6.EnumAdapterByGpuPreference::<IDXGIAdapter1>(index, gpu_preference(power_preference))
				}
				None => factory.EnumAdapters1(index),
			}
		};
		match adapter {
			Ok(adapter) => adapters.push(adapter),
			Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => break,
			Err(e) => {
				warn!("Failed enumerating adapters: {}", e);
				break;
			}
		}
	}
	adapters.sort_by_key(|adapter| adapter_desc(adapter).map_or(true, |desc| is_software(&desc)));
	adapters
}

pub fn adapter_desc(adapter: &IDXGIAdapter1) -> Option<DXGI_ADAPTER_DESC1> {
	match unsafe { adapter.GetDesc1() } {
		Ok(desc) => Some(desc),
		Err(e) => {
			debug!("GetDesc1 failed: {}", e);
			None
		}
	}
}

pub fn is_software(desc: &DXGI_ADAPTER_DESC1) -> bool {
	desc.Flags & DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32 != 0
}

pub fn adapter_info(desc: &DXGI_ADAPTER_DESC1, memory_architecture: MemoryArchitecture) -> AdapterInfo {
	let len = desc.Description.iter().position(|c| *c == 0).unwrap_or(desc.Description.len());
	AdapterInfo {
		vendor_id: desc.VendorId,
		device_id: desc.DeviceId,
		name: String::from_utf16_lossy(&desc.Description[..len]),
		software: is_software(desc),
		memory_architecture,
	}
}

pub fn hwnd(surface: Option<SurfaceTarget>) -> Result<HWND, D3DError> {
	let surface = surface.ok_or(D3DError::MissingSurface)?;
	match surface.window {
		RawWindowHandle::Win32(handle) => Ok(HWND(handle.hwnd.get() as *mut _)),
		other => Err(D3DError::UnsupportedWindow(other)),
	}
}

impl PixelFormat {
	pub fn to_dxgi_format(&self) -> DXGI_FORMAT {
		use PixelFormat::*;
		match self {
			Undefined => DXGI_FORMAT_UNKNOWN,
			R8Unorm => DXGI_FORMAT_R8_UNORM,
			R8Snorm => DXGI_FORMAT_R8_SNORM,
			R8Uint => DXGI_FORMAT_R8_UINT,
			R8Sint => DXGI_FORMAT_R8_SINT,
			R16Unorm => DXGI_FORMAT_R16_UNORM,
			R16Snorm => DXGI_FORMAT_R16_SNORM,
			R16Uint => DXGI_FORMAT_R16_UINT,
			R16Sint => DXGI_FORMAT_R16_SINT,
			R16Float => DXGI_FORMAT_R16_FLOAT,
			RG8Unorm => DXGI_FORMAT_R8G8_UNORM,
			RG8Snorm => DXGI_FORMAT_R8G8_SNORM,
			RG8Uint => DXGI_FORMAT_R8G8_UINT,
			RG8Sint => DXGI_FORMAT_R8G8_SINT,
			R32Uint => DXGI_FORMAT_R32_UINT,
			R32Sint => DXGI_FORMAT_R32_SINT,
			R32Float => DXGI_FORMAT_R32_FLOAT,
			RG16Unorm => DXGI_FORMAT_R16G16_UNORM,
			RG16Snorm => DXGI_FORMAT_R16G16_SNORM,
			RG16Uint => DXGI_FORMAT_R16G16_UINT,
			RG16Sint => DXGI_FORMAT_R16G16_SINT,
			RG16Float => DXGI_FORMAT_R16G16_FLOAT,
			RGBA8Unorm => DXGI_FORMAT_R8G8B8A8_UNORM,
			RGBA8UnormSrgb => DXGI_FORMAT_R8G8B8A8_UNORM_SRGB,
			RGBA8Snorm => DXGI_FORMAT_R8G8B8A8_SNORM,
			RGBA8Uint => DXGI_FORMAT_R8G8B8A8_UINT,
			RGBA8Sint => DXGI_FORMAT_R8G8B8A8_SINT,
			BGRA8Unorm => DXGI_FORMAT_B8G8R8A8_UNORM,
			BGRA8UnormSrgb => DXGI_FORMAT_B8G8R8A8_UNORM_SRGB,
			RGB10A2Unorm => DXGI_FORMAT_R10G10B10A2_UNORM,
			RG11B10Float => DXGI_FORMAT_R11G11B10_FLOAT,
			RGB9E5Float => DXGI_FORMAT_R9G9B9E5_SHAREDEXP,
			RG32Uint => DXGI_FORMAT_R32G32_UINT,
			RG32Sint => DXGI_FORMAT_R32G32_SINT,
			RG32Float => DXGI_FORMAT_R32G32_FLOAT,
			RGBA16Unorm => DXGI_FORMAT_R16G16B16A16_UNORM,
			RGBA16Snorm => DXGI_FORMAT_R16G16B16A16_SNORM,
			RGBA16Uint => DXGI_FORMAT_R16G16B16A16_UINT,
			RGBA16Sint => DXGI_FORMAT_R16G16B16A16_SINT,
			RGBA16Float => DXGI_FORMAT_R16G16B16A16_FLOAT,
			RGBA32Uint => DXGI_FORMAT_R32G32B32A32_UINT,
			RGBA32Sint => DXGI_FORMAT_R32G32B32A32_SINT,
			RGBA32Float => DXGI_FORMAT_R32G32B32A32_FLOAT,
			Depth16Unorm => DXGI_FORMAT_D16_UNORM,
			Depth32Float => DXGI_FORMAT_D32_FLOAT,
			Depth24UnormStencil8 => DXGI_FORMAT_D24_UNORM_S8_UINT,
			BC1RGBAUnorm => DXGI_FORMAT_BC1_UNORM,
			BC1RGBAUnormSrgb => DXGI_FORMAT_BC1_UNORM_SRGB,
			BC2RGBAUnorm => DXGI_FORMAT_BC2_UNORM,
			BC2RGBAUnormSrgb => DXGI_FORMAT_BC2_UNORM_SRGB,
			BC3RGBAUnorm => DXGI_FORMAT_BC3_UNORM,
			BC3RGBAUnormSrgb => DXGI_FORMAT_BC3_UNORM_SRGB,
			BC4RUnorm => DXGI_FORMAT_BC4_UNORM,
			BC4RSnorm => DXGI_FORMAT_BC4_SNORM,
			BC5RGUnorm => DXGI_FORMAT_BC5_UNORM,
			BC5RGSnorm => DXGI_FORMAT_BC5_SNORM,
			BC6HRGBUfloat => DXGI_FORMAT_BC6H_UF16,
			BC6HRGBFloat => DXGI_FORMAT_BC6H_SF16,
			BC7RGBAUnorm => DXGI_FORMAT_BC7_UNORM,
			BC7RGBAUnormSrgb => DXGI_FORMAT_BC7_UNORM_SRGB,
		}
	}

	/// Flip model swap chains can not be created with srgb formats, only their views can.
	pub fn to_dxgi_swap_chain_format(&self) -> DXGI_FORMAT {
		self.srgb_to_linear().to_dxgi_format()
	}
}

/// Every optional feature is part of feature level 11_0.
pub const FEATURE_LEVEL_11_FEATURES: GraphicsDeviceFeatures = GraphicsDeviceFeatures {
	independent_blend: true,
	compute_shader: true,
	geometry_shader: true,
	tessellation_shader: true,
	multi_viewport: true,
	sampler_anisotropy: true,
	texture_compression_bc: true,
	texture_cube_array: true,
};
