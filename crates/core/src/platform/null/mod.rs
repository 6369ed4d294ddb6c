//! A backend that executes nothing. Submissions complete immediately, or once explicitly completed if
//! [`NullCreateInfo::deferred_completion`] is set, which makes it useful for testing the front end on machines without
//! a GPU.

mod command;
mod resource;

pub use command::*;
pub use resource::*;

use crate::command::{Color, QueueType, RenderArea, RenderPassDesc};
use crate::device::{
	AdapterInfo, BackendType, DeviceConfig, GraphicsDeviceCaps, GraphicsDeviceFeatures, GraphicsDeviceLimits,
	MemoryArchitecture,
};
use crate::platform::{DebugObject, Platform, PlatformPresent, SwapChainImages};
use crate::resource::{BufferDesc, SwapChainDesc, TextureDesc};
use log::debug;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

pub struct NullCreateInfo {
	pub adapter: AdapterInfo,
	/// Submissions stay incomplete until [`NullQueue::complete_all`] or a wait completes them.
	pub deferred_completion: bool,
	/// Buffers larger than this fail to allocate.
	pub max_allocation_size: Option<u64>,
}

impl Default for NullCreateInfo {
	fn default() -> Self {
		Self {
			adapter: AdapterInfo {
				vendor_id: 0,
				device_id: 0,
				name: "Null Adapter".to_string(),
				software: true,
				memory_architecture: MemoryArchitecture::Unified,
			},
			deferred_completion: false,
			max_allocation_size: None,
		}
	}
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct NullHandle(pub u64);

#[derive(thiserror::Error, Debug)]
pub enum NullError {
	#[error("Out of memory: requested {requested} bytes, at most {max} bytes can be allocated")]
	OutOfMemory { requested: u64, max: u64 },
	#[error("Waited for fence value {fence_value:#x}, but only {submitted:#x} was submitted")]
	NeverSignaled { fence_value: u64, submitted: u64 },
}

/// Number of backend objects currently alive.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct NullLiveObjects {
	pub command_buffers: u64,
	pub buffers: u64,
	pub textures: u64,
	pub swap_chains: u64,
}

pub struct Null {
	adapter: AdapterInfo,
	deferred_completion: bool,
	max_allocation_size: Option<u64>,
	next_handle: AtomicU64,
	live_command_buffers: AtomicU64,
	live_buffers: AtomicU64,
	live_textures: AtomicU64,
	live_swap_chains: AtomicU64,
}

impl Null {
	pub fn live_objects(&self) -> NullLiveObjects {
		NullLiveObjects {
			command_buffers: self.live_command_buffers.load(Relaxed),
			buffers: self.live_buffers.load(Relaxed),
			textures: self.live_textures.load(Relaxed),
			swap_chains: self.live_swap_chains.load(Relaxed),
		}
	}

	fn next_handle(&self) -> NullHandle {
		NullHandle(self.next_handle.fetch_add(1, Relaxed))
	}

	fn alloc_texture(&self, backbuffer: bool) -> NullTexture {
		self.live_textures.fetch_add(1, Relaxed);
		NullTexture::new(self.next_handle(), backbuffer)
	}

	fn alloc_backbuffers(&self, swap_chain: &NullSwapChain) -> SwapChainImages<Self> {
		SwapChainImages {
			textures: (0..swap_chain.backbuffer_count)
				.map(|_| self.alloc_texture(true))
				.collect(),
			current: 0,
		}
	}
}

unsafe impl Platform for Null {
	const BACKEND: BackendType = BackendType::Null;
	type PlatformCreateInfo = NullCreateInfo;
	type PlatformError = NullError;
	type Queue = NullQueue;
	type CommandBuffer = NullCommandBuffer;
	type Buffer = NullBuffer;
	type Texture = NullTexture;
	type SwapChain = NullSwapChain;
	type BufferHandle = NullHandle;
	type TextureHandle = NullHandle;

	unsafe fn create_platform(create_info: Self::PlatformCreateInfo, config: &DeviceConfig) -> Result<Self, NullError> {
		debug!(
			"Creating null platform for {} {:?}, ignoring debugger {:?}",
			config.app.name, config.app.version, config.debug
		);
		Ok(Self {
			adapter: create_info.adapter,
			deferred_completion: create_info.deferred_completion,
			max_allocation_size: create_info.max_allocation_size,
			next_handle: AtomicU64::new(1),
			live_command_buffers: AtomicU64::new(0),
			live_buffers: AtomicU64::new(0),
			live_textures: AtomicU64::new(0),
			live_swap_chains: AtomicU64::new(0),
		})
	}

	fn adapter_info(&self) -> AdapterInfo {
		self.adapter.clone()
	}

	fn caps(&self) -> GraphicsDeviceCaps {
		GraphicsDeviceCaps {
			backend: BackendType::Null,
			features: GraphicsDeviceFeatures::default(),
			limits: GraphicsDeviceLimits::MINIMUM,
		}
	}

	unsafe fn create_queue(&self, queue_type: QueueType, initial_fence_value: u64) -> Result<NullQueue, NullError> {
		Ok(NullQueue::new(queue_type, initial_fence_value, self.deferred_completion))
	}

	unsafe fn destroy_queue(&self, _queue: &NullQueue) {}

	unsafe fn create_command_buffer(&self, queue: &NullQueue) -> Result<NullCommandBuffer, NullError> {
		self.live_command_buffers.fetch_add(1, Relaxed);
		Ok(NullCommandBuffer::new(queue.queue_type()))
	}

	unsafe fn begin_command_buffer(&self, cmd: &mut NullCommandBuffer) -> Result<(), NullError> {
		cmd.begin();
		Ok(())
	}

	unsafe fn reset_command_buffer(&self, cmd: &mut NullCommandBuffer) -> Result<(), NullError> {
		cmd.reset();
		Ok(())
	}

	unsafe fn destroy_command_buffer(&self, _cmd: NullCommandBuffer) {
		self.live_command_buffers.fetch_sub(1, Relaxed);
	}

	unsafe fn cmd_begin_render_pass(&self, cmd: &mut NullCommandBuffer, desc: &RenderPassDesc<Self>, area: RenderArea) {
		cmd.record(NullCommand::BeginRenderPass {
			color_attachments: desc
				.color_attachments
				.iter()
				.map(|a| NullColorAttachment {
					texture: a.texture.handle(),
					load_action: a.load_action,
					store_action: a.store_action,
					clear_color: a.clear_color,
				})
				.collect(),
			depth_stencil_attachment: desc.depth_stencil_attachment.as_ref().map(|a| a.texture.handle()),
			area,
		});
	}

	unsafe fn cmd_end_render_pass(&self, cmd: &mut NullCommandBuffer) {
		cmd.record(NullCommand::EndRenderPass);
	}

	unsafe fn cmd_set_blend_color(&self, cmd: &mut NullCommandBuffer, color: Color) {
		cmd.record(NullCommand::SetBlendColor(color));
	}

	unsafe fn submit(&self, queue: &NullQueue, cmd: &mut NullCommandBuffer, fence_value: u64) -> Result<(), NullError> {
		queue.submit(cmd.finish(), fence_value);
		Ok(())
	}

	unsafe fn completed_fence_value(&self, queue: &NullQueue) -> u64 {
		queue.completed_fence_value()
	}

	unsafe fn wait_for_fence_value(&self, queue: &NullQueue, fence_value: u64) -> Result<(), NullError> {
		queue.complete_up_to(fence_value)
	}

	unsafe fn create_buffer(&self, desc: &BufferDesc) -> Result<NullBuffer, NullError> {
		if let Some(max) = self.max_allocation_size {
			if desc.size > max {
				return Err(NullError::OutOfMemory {
					requested: desc.size,
					max,
				});
			}
		}
		let buffer = NullBuffer::new(self.next_handle(), desc.size)?;
		self.live_buffers.fetch_add(1, Relaxed);
		Ok(buffer)
	}

	unsafe fn write_buffer(&self, buffer: &NullBuffer, offset: u64, data: &[u8]) -> Result<(), NullError> {
		buffer.write(offset, data);
		Ok(())
	}

	unsafe fn read_buffer(&self, buffer: &NullBuffer, offset: u64, out: &mut [u8]) -> Result<(), NullError> {
		buffer.read(offset, out);
		Ok(())
	}

	unsafe fn destroy_buffer(&self, _buffer: NullBuffer) {
		self.live_buffers.fetch_sub(1, Relaxed);
	}

	fn buffer_handle(buffer: &NullBuffer) -> NullHandle {
		buffer.handle()
	}

	unsafe fn create_texture(&self, _desc: &TextureDesc) -> Result<NullTexture, NullError> {
		Ok(self.alloc_texture(false))
	}

	unsafe fn destroy_texture(&self, _texture: NullTexture) {
		self.live_textures.fetch_sub(1, Relaxed);
	}

	fn texture_handle(texture: &NullTexture) -> NullHandle {
		texture.handle()
	}

	unsafe fn set_debug_name(&self, object: DebugObject<Self>, name: &str) {
		match object {
			DebugObject::Buffer(buffer) => buffer.set_debug_name(name),
			DebugObject::Texture(texture) => texture.set_debug_name(name),
		}
	}

	unsafe fn create_swap_chain(
		&self,
		_queue: &NullQueue,
		desc: &SwapChainDesc,
	) -> Result<(NullSwapChain, SwapChainImages<Self>), NullError> {
		self.live_swap_chains.fetch_add(1, Relaxed);
		let swap_chain = NullSwapChain::new(desc);
		let images = self.alloc_backbuffers(&swap_chain);
		Ok((swap_chain, images))
	}

	unsafe fn resize_swap_chain(
		&self,
		_queue: &NullQueue,
		swap_chain: &mut NullSwapChain,
		width: u32,
		height: u32,
	) -> Result<SwapChainImages<Self>, NullError> {
		swap_chain.resize(width, height);
		Ok(self.alloc_backbuffers(swap_chain))
	}

	unsafe fn present(&self, _queue: &NullQueue, swap_chain: &mut NullSwapChain) -> Result<PlatformPresent, NullError> {
		Ok(swap_chain.present())
	}

	unsafe fn destroy_swap_chain(&self, _swap_chain: NullSwapChain) {
		self.live_swap_chains.fetch_sub(1, Relaxed);
	}
}

#[cfg(test)]
pub(crate) fn test_device(create_info: NullCreateInfo) -> crate::error::Result<crate::device::DeviceInstance<Null>> {
	crate::device::GraphicsDevice::new(
		create_info,
		&DeviceConfig {
			app: crate::app_config_from_cargo!(),
			..DeviceConfig::default()
		},
	)
}
