use crate::command::{CommandBuffer, CommandBufferState, Execution};
use crate::device::{GraphicsDevice, WeakGraphicsDevice};
use crate::error::{GraphicsError, Result};
use crate::platform::Platform;
use crate::refcount::{RefPtr, WeakRef};
use crate::resource::Texture;
use crossbeam_queue::SegQueue;
use crossbeam_utils::CachePadded;
use log::{trace, warn};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use parking_lot::Mutex;
use static_assertions::assert_impl_all;
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum QueueType {
	Graphics = 0,
	Compute = 1,
	Copy = 2,
}

impl QueueType {
	pub const ALL: [QueueType; 3] = [QueueType::Graphics, QueueType::Compute, QueueType::Copy];
	pub const COUNT: usize = Self::ALL.len();

	/// The first fence value signaled by a queue of this type. The type is encoded in the upper 8 bits, so fence
	/// values of different queues never collide.
	pub const fn initial_fence_value(self) -> u64 {
		((self as u64) << 56) | 1
	}

	pub fn index(self) -> usize {
		u8::from(self) as usize
	}
}

/// A pooled backend command buffer and the resources it references while executing.
pub(crate) struct PooledCommandBuffer<P: Platform> {
	pub native: P::CommandBuffer,
	pub resources: Vec<Texture<P>>,
}

struct InFlight<P: Platform> {
	fence_value: u64,
	cmd: PooledCommandBuffer<P>,
}

struct SubmissionState {
	next_fence_value: u64,
}

/// An ordered channel of GPU work. There is exactly one `CommandQueue` per [`QueueType`] on a device, which issues
/// [`CommandBuffer`]s from a pool and accepts them back on submission.
///
/// Submission is internally synchronized, any number of threads may submit concurrently.
pub struct CommandQueue<P: Platform>(RefPtr<CommandQueueInner<P>>);
assert_impl_all!(CommandQueue<crate::platform::null::Null>: Send, Sync);

pub struct CommandQueueInner<P: Platform> {
	device: WeakGraphicsDevice<P>,
	queue_type: QueueType,
	native: P::Queue,
	submission: Mutex<SubmissionState>,
	last_completed: CachePadded<AtomicU64>,
	in_flight: Mutex<VecDeque<InFlight<P>>>,
	free_pool: SegQueue<PooledCommandBuffer<P>>,
}

impl<P: Platform> Clone for CommandQueue<P> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<P: Platform> Deref for CommandQueue<P> {
	type Target = CommandQueueInner<P>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<P: Platform> CommandQueue<P> {
	pub(crate) fn new(device: WeakGraphicsDevice<P>, queue_type: QueueType, native: P::Queue) -> Self {
		let initial = queue_type.initial_fence_value();
		Self(RefPtr::new(CommandQueueInner {
			device,
			queue_type,
			native,
			submission: Mutex::new(SubmissionState {
				next_fence_value: initial,
			}),
			last_completed: CachePadded::new(AtomicU64::new(initial - 1)),
			in_flight: Mutex::new(VecDeque::new()),
			free_pool: SegQueue::new(),
		}))
	}

	pub(crate) fn from_ref(inner: RefPtr<CommandQueueInner<P>>) -> Self {
		Self(inner)
	}

	pub(crate) fn downgrade(&self) -> WeakRef<CommandQueueInner<P>> {
		RefPtr::downgrade(&self.0)
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		RefPtr::ptr_eq(&self.0, &other.0)
	}

	/// Get a [`CommandBuffer`] in the [`CommandBufferState::Idle`] state, reusing a retired one if available.
	pub fn get_command_buffer(&self) -> Result<CommandBuffer<P>> {
		let device = self.device();
		self.retire(&device);
		let mut cmd = match self.free_pool.pop() {
			Some(cmd) => cmd,
			None => {
				trace!("{:?} queue allocating a new command buffer", self.queue_type);
				let native = unsafe { device.platform.create_command_buffer(&self.native) }
					.map_err(|e| GraphicsError::resource_creation("CommandBuffer", e))?;
				PooledCommandBuffer {
					native,
					resources: Vec::new(),
				}
			}
		};
		unsafe {
			if let Err(e) = device.platform.begin_command_buffer(&mut cmd.native) {
				device.platform.destroy_command_buffer(cmd.native);
				return Err(GraphicsError::resource_creation("CommandBuffer", e));
			}
		}
		Ok(CommandBuffer::new(self.device.clone(), self.downgrade(), cmd))
	}

	/// Submit `cmd`, which must have been issued by this queue. Submissions execute on the GPU in the order they were
	/// submitted.
	pub fn submit(&self, mut cmd: CommandBuffer<P>) -> Result<Execution<P>> {
		profiling::function_scope!();
		assert!(
			cmd.issued_by(self),
			"CommandBuffer submitted to a {:?} queue that did not issue it",
			self.queue_type
		);
		let mut pooled = cmd.take_for_submit();
		let device = self.device();

		let fence_value = {
			let mut submission = self.submission.lock();
			let fence_value = submission.next_fence_value;
			if let Err(e) = unsafe { device.platform.submit(&self.native, &mut pooled.native, fence_value) } {
				drop(submission);
				self.recycle(&device, pooled);
				return Err(GraphicsError::device_lost(e));
			}
			submission.next_fence_value += 1;
			// pushed while still holding the submission lock, keeping in_flight sorted by fence value
			self.in_flight.lock().push_back(InFlight {
				fence_value,
				cmd: pooled,
			});
			fence_value
		};
		Ok(Execution::new(self.downgrade(), self.queue_type, fence_value))
	}

	/// Block until all work submitted to this queue has completed, then recycle all command buffers.
	pub fn wait_idle(&self) -> Result<()> {
		profiling::function_scope!();
		let device = self.device();
		let last_submitted = self.last_submitted_fence_value();
		if self.last_completed.load(Relaxed) < last_submitted {
			unsafe { device.platform.wait_for_fence_value(&self.native, last_submitted) }
				.map_err(GraphicsError::device_lost)?;
		}
		self.retire(&device);
		Ok(())
	}

	/// Run `f` with exclusive access to the native queue, serialized with all submissions.
	pub(crate) fn with_submission_lock<R>(&self, f: impl FnOnce(&P::Queue) -> R) -> R {
		let _submission = self.submission.lock();
		f(&self.native)
	}

	/// Move all command buffers whose work has completed back into the free pool, releasing the resources they
	/// referenced.
	fn retire(&self, device: &GraphicsDevice<P>) -> u64 {
		let completed = self.update_completed(device);
		let mut in_flight = self.in_flight.lock();
		while in_flight.front().is_some_and(|front| front.fence_value <= completed) {
			if let Some(done) = in_flight.pop_front() {
				self.recycle(device, done.cmd);
			}
		}
		completed
	}

	/// Wait for all work and destroy every backend object of this queue. Called once by the device's teardown, the
	/// queue must not be used afterward.
	pub(crate) fn destroy(&self, platform: &P) {
		unsafe {
			let last_submitted = self.last_submitted_fence_value();
			if let Err(e) = platform.wait_for_fence_value(&self.native, last_submitted) {
				warn!("Failed to wait for {:?} queue during teardown: {}", self.queue_type, e);
			}
			let in_flight = std::mem::take(&mut *self.in_flight.lock());
			for cmd in in_flight.into_iter().map(|f| f.cmd).chain(std::iter::from_fn(|| self.free_pool.pop())) {
				platform.destroy_command_buffer(cmd.native);
			}
			platform.destroy_queue(&self.native);
		}
	}
}

impl<P: Platform> CommandQueueInner<P> {
	pub fn queue_type(&self) -> QueueType {
		self.queue_type
	}

	pub fn native(&self) -> &P::Queue {
		&self.native
	}

	/// The fence value of the latest submission, or one less than [`QueueType::initial_fence_value`] if nothing was
	/// submitted yet.
	pub fn last_submitted_fence_value(&self) -> u64 {
		self.submission.lock().next_fence_value - 1
	}

	pub fn completed_fence_value(&self) -> u64 {
		self.update_completed(&self.device())
	}

	pub(crate) fn is_fence_completed(&self, fence_value: u64) -> bool {
		if fence_value <= self.last_completed.load(Relaxed) {
			return true;
		}
		match self.device.upgrade() {
			Some(device) => fence_value <= self.update_completed(&device),
			// the device drained this queue during its teardown
			None => true,
		}
	}

	/// The state of a submission with `fence_value` on this queue.
	pub(crate) fn execution_state(&self, fence_value: u64) -> CommandBufferState {
		if self.is_fence_completed(fence_value) {
			CommandBufferState::Completed
		} else {
			CommandBufferState::Submitted
		}
	}

	pub(crate) fn recycle(&self, device: &GraphicsDevice<P>, mut cmd: PooledCommandBuffer<P>) {
		cmd.resources.clear();
		unsafe {
			match device.platform.reset_command_buffer(&mut cmd.native) {
				Ok(()) => self.free_pool.push(cmd),
				Err(e) => {
					warn!("Failed to reset command buffer, destroying it: {}", e);
					device.platform.destroy_command_buffer(cmd.native);
				}
			}
		}
	}

	fn update_completed(&self, device: &GraphicsDevice<P>) -> u64 {
		let completed = unsafe { device.platform.completed_fence_value(&self.native) };
		self.last_completed.fetch_max(completed, Relaxed).max(completed)
	}

	pub fn device(&self) -> GraphicsDevice<P> {
		match self.device.upgrade() {
			Some(device) => device,
			None => unreachable_device_dropped(),
		}
	}
}

#[inline(never)]
#[track_caller]
pub(crate) fn unreachable_device_dropped() -> ! {
	panic!("GraphicsDevice was dropped while its queues or command buffers were still in use")
}

impl<P: Platform> Debug for CommandQueue<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CommandQueue")
			.field("queue_type", &self.queue_type)
			.field("last_submitted", &self.last_submitted_fence_value())
			.field("last_completed", &self.last_completed.load(Relaxed))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::command::{ColorAttachment, RenderPassDesc};
	use crate::format::PixelFormat;
	use crate::platform::null::{test_device, NullCreateInfo};
	use crate::resource::{GraphicsResource, TextureDesc, TextureUsage};

	fn deferred() -> NullCreateInfo {
		NullCreateInfo {
			deferred_completion: true,
			..NullCreateInfo::default()
		}
	}

	#[test]
	fn test_initial_fence_values() -> anyhow::Result<()> {
		assert_eq!(QueueType::Graphics.initial_fence_value(), 1);
		assert_eq!(QueueType::Compute.initial_fence_value(), (1 << 56) | 1);
		assert_eq!(QueueType::Copy.initial_fence_value(), (2 << 56) | 1);

		let device = test_device(NullCreateInfo::default())?;
		for queue_type in QueueType::ALL {
			let queue = device.get_queue(queue_type);
			assert_eq!(queue.last_submitted_fence_value(), queue_type.initial_fence_value() - 1);
			assert_eq!(queue.completed_fence_value(), queue_type.initial_fence_value() - 1);
		}
		Ok(())
	}

	#[test]
	fn test_fence_values_increase() -> anyhow::Result<()> {
		let device = test_device(NullCreateInfo::default())?;
		let queue = device.get_queue(QueueType::Compute);
		let first = queue.get_command_buffer()?.submit()?;
		let second = queue.submit(queue.get_command_buffer()?)?;
		assert_eq!(first.fence_value(), QueueType::Compute.initial_fence_value());
		assert_eq!(second.fence_value(), first.fence_value() + 1);
		assert_eq!(second.queue_type(), QueueType::Compute);
		assert_eq!(queue.last_submitted_fence_value(), second.fence_value());
		Ok(())
	}

	#[test]
	fn test_execution_completes_after_wait_idle() -> anyhow::Result<()> {
		let device = test_device(deferred())?;
		let queue = device.get_queue(QueueType::Graphics);
		let execution = queue.get_command_buffer()?.submit()?;
		assert_eq!(execution.state(), CommandBufferState::Submitted);
		assert!(!execution.is_completed());

		queue.wait_idle()?;
		assert!(execution.is_completed());
		assert!(execution.clone().is_completed());
		Ok(())
	}

	#[test]
	fn test_in_flight_resources_released_on_retire() -> anyhow::Result<()> {
		let device = test_device(deferred())?;
		let queue = device.get_queue(QueueType::Graphics);
		let texture = device.create_texture(&TextureDesc {
			name: "target",
			format: PixelFormat::RGBA8Unorm,
			usage: TextureUsage::COLOR_ATTACHMENT,
			width: 16,
			height: 16,
			..TextureDesc::default()
		})?;

		let mut cmd = queue.get_command_buffer()?;
		cmd.begin_render_pass(&RenderPassDesc {
			color_attachments: &[ColorAttachment::new(&texture)],
			depth_stencil_attachment: None,
			render_area: None,
		});
		cmd.end_render_pass();
		let execution = cmd.submit()?;

		assert_eq!(texture.name(), "target");
		drop(texture);
		// still referenced by the in flight command buffer
		assert_eq!(device.platform.live_objects().textures, 1);

		queue.native().complete_all();
		assert!(execution.is_completed());
		// retired on the next command buffer request
		let _cmd = queue.get_command_buffer()?;
		assert_eq!(device.platform.live_objects().textures, 0);
		assert_eq!(device.platform.live_objects().command_buffers, 1);
		Ok(())
	}

	#[test]
	fn test_command_buffers_are_pooled() -> anyhow::Result<()> {
		let device = test_device(deferred())?;
		let queue = device.get_queue(QueueType::Copy);
		let a = queue.get_command_buffer()?.submit()?;
		let b = queue.get_command_buffer()?.submit()?;
		assert_eq!(device.platform.live_objects().command_buffers, 2);
		assert!(!a.is_completed() && !b.is_completed());

		queue.native().complete_up_to(a.fence_value())?;
		assert!(a.is_completed());
		assert!(!b.is_completed());
		queue.get_command_buffer()?.submit()?;
		assert_eq!(device.platform.live_objects().command_buffers, 2);
		Ok(())
	}

	#[test]
	#[should_panic(expected = "did not issue it")]
	fn test_submit_to_wrong_queue_panics() {
		let device = test_device(NullCreateInfo::default()).unwrap();
		let cmd = device.get_queue(QueueType::Graphics).get_command_buffer().unwrap();
		let _ = device.get_queue(QueueType::Compute).submit(cmd);
	}

	#[test]
	fn test_execution_outlives_device() -> anyhow::Result<()> {
		let device = test_device(deferred())?;
		let execution = device.get_queue(QueueType::Graphics).get_command_buffer()?.submit()?;
		assert!(!execution.is_completed());
		drop(device);
		assert!(execution.is_completed());
		Ok(())
	}
}
