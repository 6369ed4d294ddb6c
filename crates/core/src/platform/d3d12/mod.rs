//! The Direct3D 12 backend. Requires feature level 11_0, every [`QueueType`] maps onto its own native command queue.

mod command;
mod resource;
mod swap_chain;

pub use command::*;
pub use resource::*;
pub use swap_chain::*;

use crate::command::{Color, QueueType, RenderArea, RenderPassDesc};
use crate::device::{
	AdapterInfo, BackendType, Debuggers, DeviceConfig, GraphicsDeviceCaps, GraphicsDeviceLimits, MemoryArchitecture,
};
use crate::platform::dxgi::{
	adapter_desc, adapter_info, create_factory, enumerate_adapters, D3DError, FEATURE_LEVEL_11_FEATURES,
};
use crate::platform::{DebugObject, Platform, PlatformPresent, SwapChainImages};
use crate::resource::{BufferDesc, SwapChainDesc, TextureDesc};
use log::{debug, info, warn};
use std::ffi::c_void;
use windows::core::{Interface, HSTRING};
use windows::Win32::Foundation::BOOL;
use windows::Win32::Graphics::Direct3D::{D3D_FEATURE_LEVEL, D3D_FEATURE_LEVEL_11_0};
use windows::Win32::Graphics::Direct3D12::{
	D3D12CreateDevice, D3D12GetDebugInterface, ID3D12Debug, ID3D12Debug1, ID3D12Device, ID3D12Object,
	ID3D12Resource, D3D12_FEATURE_ARCHITECTURE, D3D12_FEATURE_DATA_ARCHITECTURE,
};
use windows::Win32::Graphics::Dxgi::{IDXGIAdapter1, IDXGIFactory4, IDXGIFactory5, DXGI_FEATURE_PRESENT_ALLOW_TEARING};

#[derive(Copy, Clone, Debug)]
pub struct D3D12CreateInfo {
	pub minimum_feature_level: D3D_FEATURE_LEVEL,
}

impl Default for D3D12CreateInfo {
	fn default() -> Self {
		Self {
			minimum_feature_level: D3D_FEATURE_LEVEL_11_0,
		}
	}
}

pub struct D3D12 {
	pub factory: IDXGIFactory4,
	pub adapter: IDXGIAdapter1,
	pub device: ID3D12Device,
	pub tearing_supported: bool,
	adapter_info: AdapterInfo,
	caps: GraphicsDeviceCaps,
}

// Safety: D3D12 devices, queues and resources are free-threaded. Command lists and swap chains are only accessed
// through `&mut` or while holding the queue's submission lock.
unsafe impl Send for D3D12 {}
unsafe impl Sync for D3D12 {}

impl D3D12 {
	pub unsafe fn new(create_info: D3D12CreateInfo, config: &DeviceConfig) -> Result<Self, D3DError> {
		profiling::function_scope!();
		unsafe {
			if config.debug.validation_enabled() {
				Self::enable_debug_layer(config.debug);
			}
			let factory = create_factory(config.debug)?;
			let (adapter, device) = enumerate_adapters(&factory, config.power_preference)
				.into_iter()
				.find_map(|adapter| {
					let mut device: Option<ID3D12Device> = None;
					match D3D12CreateDevice(&adapter, create_info.minimum_feature_level, &mut device) {
						Ok(()) => device.map(|device| (adapter, device)),
						Err(e) => {
							debug!("Skipping adapter: {}", e);
							None
						}
					}
				})
				.ok_or(D3DError::NoSuitableAdapter)?;

			let mut architecture = D3D12_FEATURE_DATA_ARCHITECTURE::default();
			let memory_architecture = match device.CheckFeatureSupport(
				D3D12_FEATURE_ARCHITECTURE,
				&mut architecture as *mut _ as *mut c_void,
				std::mem::size_of::<D3D12_FEATURE_DATA_ARCHITECTURE>() as u32,
			) {
				Ok(()) if architecture.UMA.as_bool() => MemoryArchitecture::Unified,
				Ok(()) => MemoryArchitecture::Dedicated,
				Err(_) => MemoryArchitecture::Unknown,
			};
			let adapter_info = adapter_info(&adapter_desc(&adapter).unwrap_or_default(), memory_architecture);
			info!("D3D12 device {:?} created", adapter_info.name);

			Ok(Self {
				tearing_supported: Self::tearing_supported(&factory),
				factory,
				adapter,
				device,
				adapter_info,
				caps: GraphicsDeviceCaps {
					backend: BackendType::Direct3D12,
					features: FEATURE_LEVEL_11_FEATURES,
					limits: GraphicsDeviceLimits::MINIMUM,
				},
			})
		}
	}

	unsafe fn enable_debug_layer(debuggers: Debuggers) {
		unsafe {
			let mut debug: Option<ID3D12Debug> = None;
			match D3D12GetDebugInterface(&mut debug) {
				Ok(()) => {
					if let Some(debug) = debug {
						debug.EnableDebugLayer();
						if debuggers == Debuggers::GpuAssistedValidation {
							if let Ok(debug1) = debug.cast::<ID3D12Debug1>() {
								debug1.SetEnableGPUBasedValidation(true);
							}
						}
					}
				}
				Err(e) => warn!("{:?} requested, but the D3D12 debug layer is unavailable: {}", debuggers, e),
			}
		}
	}

	fn tearing_supported(factory: &IDXGIFactory4) -> bool {
		let Ok(factory5) = factory.cast::<IDXGIFactory5>() else {
			return false;
		};
		let mut allow = BOOL::default();
		unsafe {
			factory5
				.CheckFeatureSupport(
					DXGI_FEATURE_PRESENT_ALLOW_TEARING,
					&mut allow as *mut _ as *mut c_void,
					std::mem::size_of::<BOOL>() as u32,
				)
				.is_ok() && allow.as_bool()
		}
	}

	pub unsafe fn set_debug_object_name(&self, object: &ID3D12Object, name: &str) {
		unsafe {
			if let Err(e) = object.SetName(&HSTRING::from(name)) {
				warn!("Failed to set debug name {:?}: {}", name, e);
			}
		}
	}

	fn set_resource_name(&self, resource: &ID3D12Resource, name: &str) {
		if let Ok(object) = resource.cast::<ID3D12Object>() {
			unsafe { self.set_debug_object_name(&object, name) }
		}
	}
}

unsafe impl Platform for D3D12 {
	const BACKEND: BackendType = BackendType::Direct3D12;
	type PlatformCreateInfo = D3D12CreateInfo;
	type PlatformError = D3DError;
	type Queue = D3D12Queue;
	type CommandBuffer = D3D12CommandBuffer;
	type Buffer = D3D12Buffer;
	type Texture = D3D12Texture;
	type SwapChain = D3D12SwapChain;
	type BufferHandle = ID3D12Resource;
	type TextureHandle = ID3D12Resource;

	unsafe fn create_platform(create_info: D3D12CreateInfo, config: &DeviceConfig) -> Result<Self, D3DError> {
		unsafe { D3D12::new(create_info, config) }
	}

	fn adapter_info(&self) -> AdapterInfo {
		self.adapter_info.clone()
	}

	fn caps(&self) -> GraphicsDeviceCaps {
		self.caps
	}

	unsafe fn create_queue(&self, queue_type: QueueType, initial_fence_value: u64) -> Result<D3D12Queue, D3DError> {
		unsafe { D3D12Queue::new(self, queue_type, initial_fence_value) }
	}

	unsafe fn destroy_queue(&self, _queue: &D3D12Queue) {}

	unsafe fn create_command_buffer(&self, queue: &D3D12Queue) -> Result<D3D12CommandBuffer, D3DError> {
		unsafe { D3D12CommandBuffer::new(self, queue) }
	}

	unsafe fn begin_command_buffer(&self, cmd: &mut D3D12CommandBuffer) -> Result<(), D3DError> {
		unsafe { cmd.begin() }
	}

	unsafe fn reset_command_buffer(&self, cmd: &mut D3D12CommandBuffer) -> Result<(), D3DError> {
		unsafe { cmd.reset() }
	}

	unsafe fn destroy_command_buffer(&self, _cmd: D3D12CommandBuffer) {}

	unsafe fn cmd_begin_render_pass(&self, cmd: &mut D3D12CommandBuffer, desc: &RenderPassDesc<Self>, area: RenderArea) {
		unsafe { cmd.begin_render_pass(desc, area) }
	}

	unsafe fn cmd_end_render_pass(&self, cmd: &mut D3D12CommandBuffer) {
		unsafe { cmd.end_render_pass() }
	}

	unsafe fn cmd_set_blend_color(&self, cmd: &mut D3D12CommandBuffer, color: Color) {
		unsafe { cmd.list.OMSetBlendFactor(Some(&color.to_array())) }
	}

	unsafe fn submit(&self, queue: &D3D12Queue, cmd: &mut D3D12CommandBuffer, fence_value: u64) -> Result<(), D3DError> {
		unsafe { queue.submit(cmd, fence_value) }
	}

	unsafe fn completed_fence_value(&self, queue: &D3D12Queue) -> u64 {
		unsafe { queue.completed_fence_value() }
	}

	unsafe fn wait_for_fence_value(&self, queue: &D3D12Queue, fence_value: u64) -> Result<(), D3DError> {
		unsafe { queue.wait_for_fence_value(fence_value) }
	}

	unsafe fn create_buffer(&self, desc: &BufferDesc) -> Result<D3D12Buffer, D3DError> {
		unsafe { D3D12Buffer::new(self, desc) }
	}

	unsafe fn write_buffer(&self, buffer: &D3D12Buffer, offset: u64, data: &[u8]) -> Result<(), D3DError> {
		unsafe { buffer.write(offset, data) }
	}

	unsafe fn read_buffer(&self, buffer: &D3D12Buffer, offset: u64, out: &mut [u8]) -> Result<(), D3DError> {
		unsafe { buffer.read(offset, out) }
	}

	unsafe fn destroy_buffer(&self, _buffer: D3D12Buffer) {}

	fn buffer_handle(buffer: &D3D12Buffer) -> ID3D12Resource {
		buffer.resource.clone()
	}

	unsafe fn create_texture(&self, desc: &TextureDesc) -> Result<D3D12Texture, D3DError> {
		unsafe { D3D12Texture::new(self, desc) }
	}

	unsafe fn destroy_texture(&self, _texture: D3D12Texture) {}

	fn texture_handle(texture: &D3D12Texture) -> ID3D12Resource {
		texture.resource.clone()
	}

	unsafe fn set_debug_name(&self, object: DebugObject<Self>, name: &str) {
		match object {
			DebugObject::Buffer(buffer) => self.set_resource_name(&buffer.resource, name),
			DebugObject::Texture(texture) => self.set_resource_name(&texture.resource, name),
		}
	}

	unsafe fn create_swap_chain(
		&self,
		queue: &D3D12Queue,
		desc: &SwapChainDesc,
	) -> Result<(D3D12SwapChain, SwapChainImages<Self>), D3DError> {
		unsafe { D3D12SwapChain::new(self, queue, desc) }
	}

	unsafe fn resize_swap_chain(
		&self,
		_queue: &D3D12Queue,
		swap_chain: &mut D3D12SwapChain,
		width: u32,
		height: u32,
	) -> Result<SwapChainImages<Self>, D3DError> {
		unsafe { swap_chain.resize(self, width, height) }
	}

	unsafe fn present(&self, _queue: &D3D12Queue, swap_chain: &mut D3D12SwapChain) -> Result<PlatformPresent, D3DError> {
		unsafe { swap_chain.present() }
	}

	unsafe fn destroy_swap_chain(&self, _swap_chain: D3D12SwapChain) {}
}
