//! The Vulkan 1.3 backend, built on [`ash`] with [`gpu_allocator`] for memory management. Requires timeline
//! semaphores, synchronization2 and dynamic rendering.

mod command;
mod convert;
mod ext;
mod init;
mod resource;
mod swap_chain;

pub use command::*;
pub use convert::*;
pub use ext::*;
pub use init::*;
pub use resource::*;
pub use swap_chain::*;

use crate::command::{Color, QueueType, RenderArea, RenderPassDesc};
use crate::device::{AdapterInfo, BackendType, DeviceConfig, GraphicsDeviceCaps};
use crate::format::PixelFormat;
use crate::platform::{DebugObject, Platform, PlatformPresent, SwapChainImages};
use crate::resource::{BufferDesc, SwapChainDesc, TextureDesc};
use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::vk::Handle;
use gpu_allocator::vulkan::Allocator;
use gpu_allocator::AllocationError;
use log::warn;
use parking_lot::{Mutex, MutexGuard};
use raw_window_handle::RawDisplayHandle;
use std::ffi::CString;
use std::fmt::{Debug, Display, Formatter};
use std::mem::ManuallyDrop;
use thiserror::Error;

#[derive(Clone, Debug, Default)]
pub struct VulkanCreateInfo {
	/// Enables the instance extensions required to create surfaces on this display, and the swapchain device
	/// extension. Without a display, the device is headless and can not create swap chains.
	pub display: Option<RawDisplayHandle>,
}

#[derive(Error)]
pub enum VulkanError {
	#[error("VkResult: {0}")]
	Vk(#[from] ash::vk::Result),
	#[error("gpu-allocator Error: {0}")]
	Allocation(#[from] AllocationError),
	#[error("Loading Vulkan failed: {0}")]
	Loading(#[from] ash::LoadingError),
	#[error("No device supporting Vulkan 1.3 with timeline semaphores, synchronization2 and dynamic rendering found")]
	NoSuitableAdapter,
	#[error("{0:?} is not supported by this device for the requested usage")]
	UnsupportedFormat(PixelFormat),
	#[error("Swap chains require a SurfaceTarget")]
	MissingSurface,
	#[error("Swap chains require VulkanCreateInfo::display to be set on device creation")]
	SwapchainNotEnabled,
	#[error("The graphics queue family can not present to this surface")]
	SurfaceUnsupported,
}

impl Debug for VulkanError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}

#[derive(Default)]
pub struct VulkanExtensions {
	pub debug_utils: Option<debug_utils::Device>,
	pub surface: Option<surface::Instance>,
	pub swapchain: Option<swapchain::Device>,
}

/// A vulkan queue, shared by all [`QueueType`]s that had to fall back to the same queue family.
pub struct SharedQueue {
	pub family_index: u32,
	pub queue: Mutex<ash::vk::Queue>,
}

pub struct Vulkan {
	pub entry: ash::Entry,
	pub instance: ash::Instance,
	pub physical_device: ash::vk::PhysicalDevice,
	pub device: ash::Device,
	pub extensions: VulkanExtensions,
	/// indexed by [`QueueType::index`]
	pub queues: [std::sync::Arc<SharedQueue>; QueueType::COUNT],
	memory_allocator: ManuallyDrop<Mutex<Allocator>>,
	debug_messenger: Option<(debug_utils::Instance, ash::vk::DebugUtilsMessengerEXT)>,
	adapter: AdapterInfo,
	caps: GraphicsDeviceCaps,
}

impl Vulkan {
	pub fn memory_allocator(&self) -> MutexGuard<'_, Allocator> {
		self.memory_allocator.lock()
	}

	pub fn extensions(&self) -> &VulkanExtensions {
		&self.extensions
	}

	pub unsafe fn set_debug_object_name(&self, handle: impl Handle, name: &str) {
		unsafe {
			if let Some(debug_utils) = self.extensions.debug_utils.as_ref() {
				let Ok(name) = CString::new(name) else {
					return;
				};
				if let Err(e) = debug_utils.set_debug_utils_object_name(
					&ash::vk::DebugUtilsObjectNameInfoEXT::default()
						.object_handle(handle)
						.object_name(&name),
				) {
					warn!("Failed to set debug name {:?}: {}", name, e);
				}
			}
		}
	}
}

impl Drop for Vulkan {
	fn drop(&mut self) {
		unsafe {
			if let Err(e) = self.device.device_wait_idle() {
				warn!("device_wait_idle failed during teardown: {}", e);
			}
			self.extensions = VulkanExtensions::default();
			ManuallyDrop::drop(&mut self.memory_allocator);
			self.device.destroy_device(None);
			if let Some((debug_instance, messenger)) = self.debug_messenger.take() {
				debug_instance.destroy_debug_utils_messenger(messenger, None);
			}
			self.instance.destroy_instance(None);
		}
	}
}

unsafe impl Platform for Vulkan {
	const BACKEND: BackendType = BackendType::Vulkan;
	type PlatformCreateInfo = VulkanCreateInfo;
	type PlatformError = VulkanError;
	type Queue = VulkanQueue;
	type CommandBuffer = VulkanCommandBuffer;
	type Buffer = VulkanBuffer;
	type Texture = VulkanTexture;
	type SwapChain = VulkanSwapChain;
	type BufferHandle = ash::vk::Buffer;
	type TextureHandle = ash::vk::Image;

	unsafe fn create_platform(create_info: VulkanCreateInfo, config: &DeviceConfig) -> Result<Self, VulkanError> {
		unsafe { Vulkan::new(create_info, config) }
	}

	fn adapter_info(&self) -> AdapterInfo {
		self.adapter.clone()
	}

	fn caps(&self) -> GraphicsDeviceCaps {
		self.caps
	}

	unsafe fn create_queue(&self, queue_type: QueueType, initial_fence_value: u64) -> Result<VulkanQueue, VulkanError> {
		unsafe { VulkanQueue::new(self, queue_type, initial_fence_value) }
	}

	unsafe fn destroy_queue(&self, queue: &VulkanQueue) {
		unsafe { queue.destroy(self) }
	}

	unsafe fn create_command_buffer(&self, queue: &VulkanQueue) -> Result<VulkanCommandBuffer, VulkanError> {
		unsafe { VulkanCommandBuffer::new(self, queue) }
	}

	unsafe fn begin_command_buffer(&self, cmd: &mut VulkanCommandBuffer) -> Result<(), VulkanError> {
		unsafe { cmd.begin(self) }
	}

	unsafe fn reset_command_buffer(&self, cmd: &mut VulkanCommandBuffer) -> Result<(), VulkanError> {
		unsafe { cmd.reset(self) }
	}

	unsafe fn destroy_command_buffer(&self, cmd: VulkanCommandBuffer) {
		unsafe { cmd.destroy(self) }
	}

	unsafe fn cmd_begin_render_pass(&self, cmd: &mut VulkanCommandBuffer, desc: &RenderPassDesc<Self>, area: RenderArea) {
		unsafe { cmd.begin_render_pass(self, desc, area) }
	}

	unsafe fn cmd_end_render_pass(&self, cmd: &mut VulkanCommandBuffer) {
		unsafe { cmd.end_render_pass(self) }
	}

	unsafe fn cmd_set_blend_color(&self, cmd: &mut VulkanCommandBuffer, color: Color) {
		unsafe { self.device.cmd_set_blend_constants(cmd.cmd, &color.to_array()) }
	}

	unsafe fn submit(
		&self,
		queue: &VulkanQueue,
		cmd: &mut VulkanCommandBuffer,
		fence_value: u64,
	) -> Result<(), VulkanError> {
		unsafe { queue.submit(self, cmd, fence_value) }
	}

	unsafe fn completed_fence_value(&self, queue: &VulkanQueue) -> u64 {
		unsafe { queue.completed_fence_value(self) }
	}

	unsafe fn wait_for_fence_value(&self, queue: &VulkanQueue, fence_value: u64) -> Result<(), VulkanError> {
		unsafe { queue.wait_for_fence_value(self, fence_value) }
	}

	unsafe fn create_buffer(&self, desc: &BufferDesc) -> Result<VulkanBuffer, VulkanError> {
		unsafe { VulkanBuffer::new(self, desc) }
	}

	unsafe fn write_buffer(&self, buffer: &VulkanBuffer, offset: u64, data: &[u8]) -> Result<(), VulkanError> {
		unsafe { buffer.write(offset, data) }
	}

	unsafe fn read_buffer(&self, buffer: &VulkanBuffer, offset: u64, out: &mut [u8]) -> Result<(), VulkanError> {
		unsafe { buffer.read(offset, out) }
	}

	unsafe fn destroy_buffer(&self, buffer: VulkanBuffer) {
		unsafe { buffer.destroy(self) }
	}

	fn buffer_handle(buffer: &VulkanBuffer) -> ash::vk::Buffer {
		buffer.buffer
	}

	unsafe fn create_texture(&self, desc: &TextureDesc) -> Result<VulkanTexture, VulkanError> {
		unsafe { VulkanTexture::new(self, desc) }
	}

	unsafe fn destroy_texture(&self, texture: VulkanTexture) {
		unsafe { texture.destroy(self) }
	}

	fn texture_handle(texture: &VulkanTexture) -> ash::vk::Image {
		texture.image
	}

	unsafe fn set_debug_name(&self, object: DebugObject<Self>, name: &str) {
		unsafe {
			match object {
				DebugObject::Buffer(buffer) => self.set_debug_object_name(buffer.buffer, name),
				DebugObject::Texture(texture) => self.set_debug_object_name(texture.image, name),
			}
		}
	}

	unsafe fn create_swap_chain(
		&self,
		queue: &VulkanQueue,
		desc: &SwapChainDesc,
	) -> Result<(VulkanSwapChain, SwapChainImages<Self>), VulkanError> {
		unsafe { VulkanSwapChain::new(self, queue, desc) }
	}

	unsafe fn resize_swap_chain(
		&self,
		queue: &VulkanQueue,
		swap_chain: &mut VulkanSwapChain,
		width: u32,
		height: u32,
	) -> Result<SwapChainImages<Self>, VulkanError> {
		unsafe { swap_chain.resize(self, queue, width, height) }
	}

	unsafe fn present(
		&self,
		queue: &VulkanQueue,
		swap_chain: &mut VulkanSwapChain,
	) -> Result<PlatformPresent, VulkanError> {
		unsafe { swap_chain.present(self, queue) }
	}

	unsafe fn destroy_swap_chain(&self, swap_chain: VulkanSwapChain) {
		unsafe { swap_chain.destroy(self) }
	}
}
