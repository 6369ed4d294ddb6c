use crate::command::queue::{unreachable_device_dropped, PooledCommandBuffer};
use crate::command::{Color, CommandQueue, CommandQueueInner, Execution, RenderPassDesc};
use crate::device::{GraphicsDevice, WeakGraphicsDevice};
use crate::error::Result;
use crate::platform::Platform;
use crate::refcount::WeakRef;
use static_assertions::{assert_impl_all, assert_not_impl_any};
use std::fmt::{Debug, Formatter};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CommandBufferState {
	/// Freshly issued, nothing recorded yet.
	Idle,
	Recording,
	/// Submitted to its queue and possibly executing on the GPU.
	Submitted,
	/// The GPU has finished executing, the queue will recycle it into [`CommandBufferState::Idle`].
	Completed,
}

/// Records GPU work. Obtained from [`CommandQueue::get_command_buffer`] and consumed by submitting it back to the same
/// queue.
///
/// Recording requires `&mut self`, so only a single thread can record into a command buffer at any time and no
/// locking happens on the recording path. Dropping a command buffer without submitting it discards its contents and
/// returns it to the queue's pool.
pub struct CommandBuffer<P: Platform> {
	device: WeakGraphicsDevice<P>,
	queue: WeakRef<CommandQueueInner<P>>,
	cmd: Option<PooledCommandBuffer<P>>,
	state: CommandBufferState,
	render_pass_open: bool,
}
assert_impl_all!(CommandBuffer<crate::platform::null::Null>: Send, Sync);
assert_not_impl_any!(CommandBuffer<crate::platform::null::Null>: Clone);

impl<P: Platform> CommandBuffer<P> {
	pub(crate) fn new(
		device: WeakGraphicsDevice<P>,
		queue: WeakRef<CommandQueueInner<P>>,
		cmd: PooledCommandBuffer<P>,
	) -> Self {
		Self {
			device,
			queue,
			cmd: Some(cmd),
			state: CommandBufferState::Idle,
			render_pass_open: false,
		}
	}

	pub fn state(&self) -> CommandBufferState {
		self.state
	}

	pub fn is_render_pass_open(&self) -> bool {
		self.render_pass_open
	}

	pub fn device(&self) -> GraphicsDevice<P> {
		match self.device.upgrade() {
			Some(device) => device,
			None => unreachable_device_dropped(),
		}
	}

	/// The queue that issued this command buffer, and the only queue it may be submitted to.
	pub fn queue(&self) -> CommandQueue<P> {
		match self.queue.upgrade() {
			Some(queue) => CommandQueue::from_ref(queue),
			None => unreachable_device_dropped(),
		}
	}

	pub fn native(&self) -> &P::CommandBuffer {
		&self.cmd().native
	}

	pub(crate) fn issued_by(&self, queue: &CommandQueue<P>) -> bool {
		self.queue.ptr_eq(&queue.downgrade())
	}

	fn cmd(&self) -> &PooledCommandBuffer<P> {
		match &self.cmd {
			Some(cmd) => cmd,
			None => unreachable!("CommandBuffer used after submission"),
		}
	}

	fn cmd_mut(&mut self) -> &mut PooledCommandBuffer<P> {
		match &mut self.cmd {
			Some(cmd) => cmd,
			None => unreachable!("CommandBuffer used after submission"),
		}
	}

	fn begin_use(&mut self) {
		match self.state {
			CommandBufferState::Idle => self.state = CommandBufferState::Recording,
			CommandBufferState::Recording => (),
			state => panic!("CommandBuffer can not be recorded into while {state:?}"),
		}
	}

	/// Begin a render pass. Panics if a render pass is already open or the attachments are invalid.
	pub fn begin_render_pass(&mut self, desc: &RenderPassDesc<P>) {
		assert!(
			!self.render_pass_open,
			"begin_render_pass called while a render pass is already open, call end_render_pass first"
		);
		self.begin_use();
		let device = self.device();
		let area = desc.resolve_render_area(device.caps().limits.max_color_attachments);
		let cmd = self.cmd_mut();
		cmd.resources.extend(desc.textures().cloned());
		unsafe { device.platform.cmd_begin_render_pass(&mut cmd.native, desc, area) };
		self.render_pass_open = true;
	}

	/// End the currently open render pass. Panics if no render pass is open.
	pub fn end_render_pass(&mut self) {
		assert!(
			self.render_pass_open,
			"end_render_pass called without a matching begin_render_pass"
		);
		let device = self.device();
		unsafe { device.platform.cmd_end_render_pass(&mut self.cmd_mut().native) };
		self.render_pass_open = false;
	}

	/// Set the constant blend color used by subsequent draws. Panics if no render pass is open.
	pub fn set_blend_color(&mut self, color: Color) {
		assert!(self.render_pass_open, "set_blend_color called outside a render pass");
		let device = self.device();
		unsafe { device.platform.cmd_set_blend_color(&mut self.cmd_mut().native, color) };
	}

	/// Submit to the queue that issued this command buffer.
	pub fn submit(self) -> Result<Execution<P>> {
		let queue = self.queue();
		queue.submit(self)
	}

	pub(crate) fn take_for_submit(&mut self) -> PooledCommandBuffer<P> {
		assert!(
			!self.render_pass_open,
			"CommandBuffer submitted while a render pass is open, call end_render_pass first"
		);
		self.begin_use();
		self.state = CommandBufferState::Submitted;
		match self.cmd.take() {
			Some(cmd) => cmd,
			None => unreachable!("CommandBuffer submitted twice"),
		}
	}
}

impl<P: Platform> Drop for CommandBuffer<P> {
	fn drop(&mut self) {
		if let Some(cmd) = self.cmd.take() {
			// a torn down device already destroyed the queue and its pool
			if let (Some(queue), Some(device)) = (self.queue.upgrade(), self.device.upgrade()) {
				queue.recycle(&device, cmd);
			}
		}
	}
}

impl<P: Platform> Debug for CommandBuffer<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CommandBuffer")
			.field("state", &self.state)
			.field("render_pass_open", &self.render_pass_open)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::command::{ColorAttachment, QueueType, RenderArea};
	use crate::device::DeviceInstance;
	use crate::format::PixelFormat;
	use crate::platform::null::{test_device, Null, NullCommand, NullCreateInfo};
	use crate::resource::{Texture, TextureDesc, TextureUsage};
	use glam::UVec2;

	fn setup() -> anyhow::Result<(DeviceInstance<Null>, Texture<Null>)> {
		let device = test_device(NullCreateInfo::default())?;
		let texture = device.create_texture(&TextureDesc {
			name: "target",
			format: PixelFormat::RGBA8Unorm,
			usage: TextureUsage::COLOR_ATTACHMENT,
			width: 128,
			height: 64,
			..TextureDesc::default()
		})?;
		Ok((device, texture))
	}

	fn pass(texture: &Texture<Null>) -> [ColorAttachment<'_, Null>; 1] {
		[ColorAttachment::new(texture)]
	}

	#[test]
	fn test_state_transitions() -> anyhow::Result<()> {
		let (device, texture) = setup()?;
		let mut cmd = device.get_queue(QueueType::Graphics).get_command_buffer()?;
		assert_eq!(cmd.state(), CommandBufferState::Idle);
		cmd.begin_render_pass(&RenderPassDesc {
			color_attachments: &pass(&texture),
			depth_stencil_attachment: None,
			render_area: None,
		});
		assert_eq!(cmd.state(), CommandBufferState::Recording);
		assert!(cmd.is_render_pass_open());
		cmd.set_blend_color(Color::WHITE);
		cmd.end_render_pass();
		assert!(!cmd.is_render_pass_open());

		let execution = cmd.submit()?;
		assert_eq!(execution.state(), CommandBufferState::Completed);

		let submissions = device.get_queue(QueueType::Graphics).native().submissions();
		assert_eq!(submissions.len(), 1);
		let commands = &submissions[0].commands;
		assert_eq!(commands.len(), 3);
		match &commands[0] {
			NullCommand::BeginRenderPass { area, .. } => assert_eq!(
				*area,
				RenderArea {
					offset: UVec2::ZERO,
					extent: UVec2::new(128, 64),
				}
			),
			other => panic!("expected BeginRenderPass, got {other:?}"),
		}
		assert_eq!(commands[1], NullCommand::SetBlendColor(Color::WHITE));
		assert_eq!(commands[2], NullCommand::EndRenderPass);
		Ok(())
	}

	#[test]
	#[should_panic(expected = "render pass is already open")]
	fn test_second_begin_render_pass_panics() {
		let (device, texture) = setup().unwrap();
		let mut cmd = device.get_queue(QueueType::Graphics).get_command_buffer().unwrap();
		let attachments = pass(&texture);
		let desc = RenderPassDesc {
			color_attachments: &attachments,
			depth_stencil_attachment: None,
			render_area: None,
		};
		cmd.begin_render_pass(&desc);
		cmd.begin_render_pass(&desc);
	}

	#[test]
	#[should_panic(expected = "without a matching begin_render_pass")]
	fn test_end_without_begin_panics() {
		let (device, _texture) = setup().unwrap();
		let mut cmd = device.get_queue(QueueType::Graphics).get_command_buffer().unwrap();
		cmd.end_render_pass();
	}

	#[test]
	#[should_panic(expected = "outside a render pass")]
	fn test_blend_color_outside_pass_panics() {
		let (device, _texture) = setup().unwrap();
		let mut cmd = device.get_queue(QueueType::Graphics).get_command_buffer().unwrap();
		cmd.set_blend_color(Color::BLACK);
	}

	#[test]
	#[should_panic(expected = "submitted while a render pass is open")]
	fn test_submit_with_open_pass_panics() {
		let (device, texture) = setup().unwrap();
		let mut cmd = device.get_queue(QueueType::Graphics).get_command_buffer().unwrap();
		cmd.begin_render_pass(&RenderPassDesc {
			color_attachments: &pass(&texture),
			depth_stencil_attachment: None,
			render_area: None,
		});
		let _ = cmd.submit();
	}

	#[test]
	#[should_panic(expected = "exceeds the attachments' extent")]
	fn test_render_area_out_of_bounds_panics() {
		let (device, texture) = setup().unwrap();
		let mut cmd = device.get_queue(QueueType::Graphics).get_command_buffer().unwrap();
		cmd.begin_render_pass(&RenderPassDesc {
			color_attachments: &pass(&texture),
			depth_stencil_attachment: None,
			render_area: Some(RenderArea {
				offset: UVec2::new(64, 0),
				extent: UVec2::new(128, 64),
			}),
		});
	}

	#[test]
	#[should_panic(expected = "exceeds the attachments' extent")]
	fn test_render_area_overflowing_offset_panics() {
		let (device, texture) = setup().unwrap();
		let mut cmd = device.get_queue(QueueType::Graphics).get_command_buffer().unwrap();
		cmd.begin_render_pass(&RenderPassDesc {
			color_attachments: &pass(&texture),
			depth_stencil_attachment: None,
			render_area: Some(RenderArea {
				offset: UVec2::new(u32::MAX, 0),
				extent: UVec2::new(1, 1),
			}),
		});
	}

	#[test]
	#[should_panic(expected = "was not created with COLOR_ATTACHMENT usage")]
	fn test_attachment_usage_panics() {
		let device = test_device(NullCreateInfo::default()).unwrap();
		let texture = device
			.create_texture(&TextureDesc {
				name: "sampled only",
				format: PixelFormat::RGBA8Unorm,
				usage: TextureUsage::SAMPLED,
				..TextureDesc::default()
			})
			.unwrap();
		let mut cmd = device.get_queue(QueueType::Graphics).get_command_buffer().unwrap();
		cmd.begin_render_pass(&RenderPassDesc {
			color_attachments: &pass(&texture),
			depth_stencil_attachment: None,
			render_area: None,
		});
	}

	#[test]
	fn test_dropped_unsubmitted_is_recycled() -> anyhow::Result<()> {
		let (device, texture) = setup()?;
		let queue = device.get_queue(QueueType::Graphics);
		{
			let mut cmd = queue.get_command_buffer()?;
			cmd.begin_render_pass(&RenderPassDesc {
				color_attachments: &pass(&texture),
				depth_stencil_attachment: None,
				render_area: None,
			});
			cmd.end_render_pass();
		}
		assert_eq!(device.platform.live_objects().command_buffers, 1);
		let cmd = queue.get_command_buffer()?;
		assert_eq!(device.platform.live_objects().command_buffers, 1);
		assert!(cmd.native().commands().is_empty());
		drop(cmd);
		assert!(queue.native().submissions().is_empty());
		Ok(())
	}

	#[test]
	fn test_unsubmitted_does_not_keep_device_alive() -> anyhow::Result<()> {
		let (device, texture) = setup()?;
		let weak = device.downgrade();
		let mut cmd = device.get_queue(QueueType::Graphics).get_command_buffer()?;
		cmd.begin_render_pass(&RenderPassDesc {
			color_attachments: &pass(&texture),
			depth_stencil_attachment: None,
			render_area: None,
		});
		cmd.end_render_pass();

		drop(device);
		assert!(weak.upgrade().is_none());
		drop(cmd);
		drop(texture);
		Ok(())
	}
}
