//! The Direct3D 11 backend. Command buffers record into deferred contexts, which all [`QueueType`]s execute on the
//! single immediate context. Fences are emulated with event queries.

mod command;
mod resource;
mod swap_chain;

pub use command::*;
pub use resource::*;
pub use swap_chain::*;

use crate::command::{Color, QueueType, RenderArea, RenderPassDesc};
use crate::device::{
	AdapterInfo, BackendType, DeviceConfig, GraphicsDeviceCaps, GraphicsDeviceLimits, MemoryArchitecture,
};
use crate::platform::dxgi::{
	adapter_desc, adapter_info, create_factory, enumerate_adapters, D3DError,
	FEATURE_LEVEL_11_FEATURES,
};
use crate::platform::{DebugObject, Platform, PlatformPresent, SwapChainImages};
use crate::resource::{BufferDesc, SwapChainDesc, TextureDesc};
use log::{debug, info, warn};
use parking_lot::{Mutex, MutexGuard};
use windows::core::Interface;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::Graphics::Direct3D::{
	D3D_DRIVER_TYPE_UNKNOWN, D3D_FEATURE_LEVEL, D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_11_1,
};
use windows::Win32::Graphics::Direct3D11::{
	D3D11CreateDevice, ID3D11Device, ID3D11DeviceChild, ID3D11DeviceContext, ID3D11Resource,
	D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_CREATE_DEVICE_DEBUG, D3D11_SDK_VERSION, WKPDID_D3DDebugObjectName,
};
use windows::Win32::Graphics::Dxgi::{IDXGIAdapter1, IDXGIFactory4, DXGI_ADAPTER_DESC1};

#[derive(Copy, Clone, Debug)]
pub struct D3D11CreateInfo {
	pub minimum_feature_level: D3D_FEATURE_LEVEL,
}

impl Default for D3D11CreateInfo {
	fn default() -> Self {
		Self {
			minimum_feature_level: D3D_FEATURE_LEVEL_11_0,
		}
	}
}

pub struct D3D11 {
	pub factory: IDXGIFactory4,
	pub adapter: IDXGIAdapter1,
	pub device: ID3D11Device,
	immediate: Mutex<ID3D11DeviceContext>,
	adapter_info: AdapterInfo,
	caps: GraphicsDeviceCaps,
}

// Safety: ID3D11Device is free-threaded, the immediate context is only accessed while locked.
unsafe impl Send for D3D11 {}
unsafe impl Sync for D3D11 {}

impl D3D11 {
	pub unsafe fn new(create_info: D3D11CreateInfo, config: &DeviceConfig) -> Result<Self, D3DError> {
		profiling::function_scope!();
		unsafe {
			let factory = create_factory(config.debug)?;
			let mut flags = D3D11_CREATE_DEVICE_BGRA_SUPPORT;
			if config.debug.validation_enabled() {
				flags |= D3D11_CREATE_DEVICE_DEBUG;
			}
			let feature_levels = [D3D_FEATURE_LEVEL_11_1, D3D_FEATURE_LEVEL_11_0];
			let feature_levels = feature_levels
				.iter()
				.copied()
				.filter(|level| level.0 >= create_info.minimum_feature_level.0)
				.collect::<Vec<_>>();

			let mut selected = None;
			for adapter in enumerate_adapters(&factory, config.power_preference) {
				let create = |flags| {
					let mut device = None;
					let mut context = None;
					D3D11CreateDevice(
						&adapter,
						D3D_DRIVER_TYPE_UNKNOWN,
						HMODULE::default(),
						flags,
						Some(&feature_levels),
						D3D11_SDK_VERSION,
						Some(&mut device),
						None,
						Some(&mut context),
					)
					.map(|()| device.zip(context))
				};
				let created = match create(flags) {
					Err(e) if flags.contains(D3D11_CREATE_DEVICE_DEBUG) => {
						warn!("D3D11 debug layer unavailable: {}", e);
						create(flags & !D3D11_CREATE_DEVICE_DEBUG)
					}
					other => other,
				};
				match created {
					Ok(Some((device, context))) => {
						selected = Some((adapter, device, context));
						break;
					}
					Ok(None) => (),
					Err(e) => debug!("Skipping adapter: {}", e),
				}
			}
			let (adapter, device, immediate) = selected.ok_or(D3DError::NoSuitableAdapter)?;
			let desc = adapter_desc(&adapter).unwrap_or_default();
			let adapter_info = d3d11_adapter_info(&desc);
			info!("D3D11 device {:?} created", adapter_info.name);

			Ok(Self {
				factory,
				adapter,
				device,
				immediate: Mutex::new(immediate),
				adapter_info,
				caps: GraphicsDeviceCaps {
					backend: BackendType::Direct3D11,
					features: FEATURE_LEVEL_11_FEATURES,
					limits: GraphicsDeviceLimits::MINIMUM,
				},
			})
		}
	}

	pub fn immediate_context(&self) -> MutexGuard<'_, ID3D11DeviceContext> {
		self.immediate.lock()
	}

	fn set_resource_name(&self, resource: &ID3D11Resource, name: &str) {
		let Ok(child) = resource.cast::<ID3D11DeviceChild>() else {
			return;
		};
		unsafe {
			if let Err(e) = child.SetPrivateData(&WKPDID_D3DDebugObjectName, name.len() as u32, Some(name.as_ptr().cast())) {
				warn!("Failed to set debug name {:?}: {}", name, e);
			}
		}
	}
}

unsafe impl Platform for D3D11 {
	const BACKEND: BackendType = BackendType::Direct3D11;
	type PlatformCreateInfo = D3D11CreateInfo;
	type PlatformError = D3DError;
	type Queue = D3D11Queue;
	type CommandBuffer = D3D11CommandBuffer;
	type Buffer = D3D11Buffer;
	type Texture = D3D11Texture;
	type SwapChain = D3D11SwapChain;
	type BufferHandle = ID3D11Resource;
	type TextureHandle = ID3D11Resource;

	unsafe fn create_platform(create_info: D3D11CreateInfo, config: &DeviceConfig) -> Result<Self, D3DError> {
		unsafe { D3D11::new(create_info, config) }
	}

	fn adapter_info(&self) -> AdapterInfo {
		self.adapter_info.clone()
	}

	fn caps(&self) -> GraphicsDeviceCaps {
		self.caps
	}

	unsafe fn create_queue(&self, queue_type: QueueType, initial_fence_value: u64) -> Result<D3D11Queue, D3DError> {
		Ok(D3D11Queue::new(queue_type, initial_fence_value))
	}

	unsafe fn destroy_queue(&self, _queue: &D3D11Queue) {}

	unsafe fn create_command_buffer(&self, _queue: &D3D11Queue) -> Result<D3D11CommandBuffer, D3DError> {
		unsafe { D3D11CommandBuffer::new(self) }
	}

	unsafe fn begin_command_buffer(&self, _cmd: &mut D3D11CommandBuffer) -> Result<(), D3DError> {
		Ok(())
	}

	unsafe fn reset_command_buffer(&self, cmd: &mut D3D11CommandBuffer) -> Result<(), D3DError> {
		unsafe { cmd.reset() }
	}

	unsafe fn destroy_command_buffer(&self, _cmd: D3D11CommandBuffer) {}

	unsafe fn cmd_begin_render_pass(&self, cmd: &mut D3D11CommandBuffer, desc: &RenderPassDesc<Self>, area: RenderArea) {
		unsafe { cmd.begin_render_pass(desc, area) }
	}

	unsafe fn cmd_end_render_pass(&self, cmd: &mut D3D11CommandBuffer) {
		unsafe { cmd.end_render_pass() }
	}

	unsafe fn cmd_set_blend_color(&self, cmd: &mut D3D11CommandBuffer, color: Color) {
		unsafe { cmd.set_blend_color(color) }
	}

	unsafe fn submit(&self, queue: &D3D11Queue, cmd: &mut D3D11CommandBuffer, fence_value: u64) -> Result<(), D3DError> {
		unsafe { queue.submit(self, cmd, fence_value) }
	}

	unsafe fn completed_fence_value(&self, queue: &D3D11Queue) -> u64 {
		unsafe { queue.completed_fence_value(self) }
	}

	unsafe fn wait_for_fence_value(&self, queue: &D3D11Queue, fence_value: u64) -> Result<(), D3DError> {
		unsafe { queue.wait_for_fence_value(self, fence_value) }
	}

	unsafe fn create_buffer(&self, desc: &BufferDesc) -> Result<D3D11Buffer, D3DError> {
		unsafe { D3D11Buffer::new(self, desc) }
	}

	unsafe fn write_buffer(&self, buffer: &D3D11Buffer, offset: u64, data: &[u8]) -> Result<(), D3DError> {
		unsafe { buffer.write(self, offset, data) }
	}

	unsafe fn read_buffer(&self, buffer: &D3D11Buffer, offset: u64, out: &mut [u8]) -> Result<(), D3DError> {
		unsafe { buffer.read(self, offset, out) }
	}

	unsafe fn destroy_buffer(&self, _buffer: D3D11Buffer) {}

	fn buffer_handle(buffer: &D3D11Buffer) -> ID3D11Resource {
		buffer.resource.clone()
	}

	unsafe fn create_texture(&self, desc: &TextureDesc) -> Result<D3D11Texture, D3DError> {
		unsafe { D3D11Texture::new(self, desc) }
	}

	unsafe fn destroy_texture(&self, _texture: D3D11Texture) {}

	fn texture_handle(texture: &D3D11Texture) -> ID3D11Resource {
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
		_queue: &D3D11Queue,
		desc: &SwapChainDesc,
	) -> Result<(D3D11SwapChain, SwapChainImages<Self>), D3DError> {
		unsafe { D3D11SwapChain::new(self, desc) }
	}

	unsafe fn resize_swap_chain(
		&self,
		_queue: &D3D11Queue,
		swap_chain: &mut D3D11SwapChain,
		width: u32,
		height: u32,
	) -> Result<SwapChainImages<Self>, D3DError> {
		unsafe { swap_chain.resize(self, width, height) }
	}

	unsafe fn present(&self, _queue: &D3D11Queue, swap_chain: &mut D3D11SwapChain) -> Result<PlatformPresent, D3DError> {
		unsafe { swap_chain.present() }
	}

	unsafe fn destroy_swap_chain(&self, _swap_chain: D3D11SwapChain) {}
}

/// D3D11 can not tell whether an adapter's memory is shared, so every hardware adapter classifies as integrated.
fn d3d11_adapter_info(desc: &DXGI_ADAPTER_DESC1) -> AdapterInfo {
	adapter_info(desc, MemoryArchitecture::Unknown)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::device::{AdapterType, GraphicsAdapter};
	use windows::Win32::Graphics::Dxgi::DXGI_ADAPTER_FLAG_SOFTWARE;

	#[test]
	fn test_adapter_classification() -> anyhow::Result<()> {
		let mut desc = DXGI_ADAPTER_DESC1 {
			VendorId: 0x1002,
			DedicatedVideoMemory: 8 << 30,
			..Default::default()
		};
		let adapter = GraphicsAdapter::new(BackendType::Direct3D11, d3d11_adapter_info(&desc));
		assert_eq!(adapter.adapter_type(), AdapterType::IntegratedGpu);

		desc.Flags = DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32;
		let adapter = GraphicsAdapter::new(BackendType::Direct3D11, d3d11_adapter_info(&desc));
		assert_eq!(adapter.adapter_type(), AdapterType::Cpu);
		Ok(())
	}
}
