use crate::command::{Color, QueueType, RenderArea, RenderPassDesc};
use crate::device::{AdapterInfo, BackendType, DeviceConfig, GraphicsDeviceCaps};
use crate::resource::{BufferDesc, SwapChainDesc, TextureDesc};
use smallvec::SmallVec;
use std::error::Error;

/// Internal interface every backend implements, may change at any time!
///
/// The front end serializes all calls that take a `&Self::Queue` together with a fence value, hands out exclusive
/// `&mut` access to command buffers and swap chains, and guarantees that objects are only destroyed once the GPU no
/// longer references them.
pub unsafe trait Platform: Sized + Send + Sync + 'static {
	const BACKEND: BackendType;

	type PlatformCreateInfo: 'static;
	type PlatformError: 'static + Error + Send + Sync;
	type Queue: 'static + Send + Sync;
	type CommandBuffer: 'static + Send + Sync;
	type Buffer: 'static + Send + Sync;
	type Texture: 'static + Send + Sync;
	type SwapChain: 'static + Send + Sync;
	type BufferHandle: Clone;
	type TextureHandle: Clone;

	/// Create the backend device on the adapter best matching `config`.
	unsafe fn create_platform(
		create_info: Self::PlatformCreateInfo,
		config: &DeviceConfig,
	) -> Result<Self, Self::PlatformError>;

	fn adapter_info(&self) -> AdapterInfo;

	fn caps(&self) -> GraphicsDeviceCaps;

	/// Create the queue of `queue_type`. Its fence must report `initial_fence_value - 1` as completed.
	unsafe fn create_queue(
		&self,
		queue_type: QueueType,
		initial_fence_value: u64,
	) -> Result<Self::Queue, Self::PlatformError>;

	/// Destroy a queue after all of its work has completed and all of its command buffers have been destroyed.
	unsafe fn destroy_queue(&self, queue: &Self::Queue);

	unsafe fn create_command_buffer(&self, queue: &Self::Queue) -> Result<Self::CommandBuffer, Self::PlatformError>;

	/// Start recording into a fresh or reset command buffer.
	unsafe fn begin_command_buffer(&self, cmd: &mut Self::CommandBuffer) -> Result<(), Self::PlatformError>;

	/// Discard all recorded contents. The command buffer is either not executing on the GPU anymore or was never
	/// submitted.
	unsafe fn reset_command_buffer(&self, cmd: &mut Self::CommandBuffer) -> Result<(), Self::PlatformError>;

	unsafe fn destroy_command_buffer(&self, cmd: Self::CommandBuffer);

	/// The front end has validated that no render pass is open, all attachments carry the correct usage and
	/// `area` lies within all attachments.
	unsafe fn cmd_begin_render_pass(&self, cmd: &mut Self::CommandBuffer, desc: &RenderPassDesc<Self>, area: RenderArea);

	unsafe fn cmd_end_render_pass(&self, cmd: &mut Self::CommandBuffer);

	unsafe fn cmd_set_blend_color(&self, cmd: &mut Self::CommandBuffer, color: Color);

	/// Finish recording and submit `cmd`, signaling `fence_value` on the queue's fence once it completes. Fence values
	/// strictly increase per queue.
	unsafe fn submit(
		&self,
		queue: &Self::Queue,
		cmd: &mut Self::CommandBuffer,
		fence_value: u64,
	) -> Result<(), Self::PlatformError>;

	unsafe fn completed_fence_value(&self, queue: &Self::Queue) -> u64;

	/// Block until the queue's fence reached `fence_value`.
	unsafe fn wait_for_fence_value(&self, queue: &Self::Queue, fence_value: u64) -> Result<(), Self::PlatformError>;

	unsafe fn create_buffer(&self, desc: &BufferDesc) -> Result<Self::Buffer, Self::PlatformError>;

	/// Copy `data` into the buffer at `offset`. The buffer has [`BufferUsage::MAP_WRITE`] and the range is in bounds.
	///
	/// [`BufferUsage::MAP_WRITE`]: crate::resource::BufferUsage::MAP_WRITE
	unsafe fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]) -> Result<(), Self::PlatformError>;

	/// Copy from the buffer at `offset` into `out`. The buffer has [`BufferUsage::MAP_READ`] and the range is in
	/// bounds.
	///
	/// [`BufferUsage::MAP_READ`]: crate::resource::BufferUsage::MAP_READ
	unsafe fn read_buffer(&self, buffer: &Self::Buffer, offset: u64, out: &mut [u8]) -> Result<(), Self::PlatformError>;

	unsafe fn destroy_buffer(&self, buffer: Self::Buffer);

	fn buffer_handle(buffer: &Self::Buffer) -> Self::BufferHandle;

	unsafe fn create_texture(&self, desc: &TextureDesc) -> Result<Self::Texture, Self::PlatformError>;

	/// Destroy a texture, including backbuffer textures, which must only release the views the backend created for
	/// them and not the images owned by the swap chain.
	unsafe fn destroy_texture(&self, texture: Self::Texture);

	fn texture_handle(texture: &Self::Texture) -> Self::TextureHandle;

	/// Assign a debug name visible in graphics debuggers. Backends without support ignore it.
	unsafe fn set_debug_name(&self, object: DebugObject<Self>, name: &str);

	unsafe fn create_swap_chain(
		&self,
		queue: &Self::Queue,
		desc: &SwapChainDesc,
	) -> Result<(Self::SwapChain, SwapChainImages<Self>), Self::PlatformError>;

	/// Recreate the backbuffers of `swap_chain` at the new size. All previous backbuffer textures have been destroyed
	/// and the GPU no longer references them.
	///
	/// Work submitted through [`CommandQueue`] is not waited on, draining it is the caller's responsibility. A backend
	/// may still block on presentation it issued itself, like a present still waiting on its semaphore, before
	/// releasing the objects that presentation uses.
	///
	/// [`CommandQueue`]: crate::command::CommandQueue
	unsafe fn resize_swap_chain(
		&self,
		queue: &Self::Queue,
		swap_chain: &mut Self::SwapChain,
		width: u32,
		height: u32,
	) -> Result<SwapChainImages<Self>, Self::PlatformError>;

	/// Present the current backbuffer. Must be serialized with submissions on `queue`.
	unsafe fn present(
		&self,
		queue: &Self::Queue,
		swap_chain: &mut Self::SwapChain,
	) -> Result<PlatformPresent, Self::PlatformError>;

	/// All backbuffer textures have been destroyed before.
	unsafe fn destroy_swap_chain(&self, swap_chain: Self::SwapChain);
}

pub enum DebugObject<'a, P: Platform> {
	Buffer(&'a P::Buffer),
	Texture(&'a P::Texture),
}

pub struct SwapChainImages<P: Platform> {
	pub textures: SmallVec<[P::Texture; 3]>,
	/// the backbuffer to render into next
	pub current: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PlatformPresent {
	/// `next_backbuffer` is the index the backend will let us render into next, or `None` if backbuffers rotate in
	/// order.
	Presented { next_backbuffer: Option<u32> },
	/// The surface changed and the swap chain must be recreated.
	OutOfDate,
}
