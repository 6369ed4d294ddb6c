use crate::command::{CommandBufferState, CommandQueueInner, QueueType};
use crate::platform::Platform;
use crate::refcount::WeakRef;
use std::fmt::{Debug, Formatter};

/// Tracks a submitted [`CommandBuffer`] until the GPU has finished executing it. Querying never blocks, use
/// [`CommandQueue::wait_idle`] to wait for completion.
///
/// [`CommandBuffer`]: crate::command::CommandBuffer
/// [`CommandQueue::wait_idle`]: crate::command::CommandQueue::wait_idle
pub struct Execution<P: Platform> {
	queue: WeakRef<CommandQueueInner<P>>,
	queue_type: QueueType,
	fence_value: u64,
}

impl<P: Platform> Execution<P> {
	pub(crate) fn new(queue: WeakRef<CommandQueueInner<P>>, queue_type: QueueType, fence_value: u64) -> Self {
		Self {
			queue,
			queue_type,
			fence_value,
		}
	}

	pub fn queue_type(&self) -> QueueType {
		self.queue_type
	}

	pub fn fence_value(&self) -> u64 {
		self.fence_value
	}

	/// Either [`CommandBufferState::Submitted`] or [`CommandBufferState::Completed`].
	pub fn state(&self) -> CommandBufferState {
		match self.queue.upgrade() {
			Some(queue) => queue.execution_state(self.fence_value),
			// the queue was destroyed, which waits for all its work
			None => CommandBufferState::Completed,
		}
	}

	pub fn is_completed(&self) -> bool {
		self.state() == CommandBufferState::Completed
	}
}

impl<P: Platform> Clone for Execution<P> {
	fn clone(&self) -> Self {
		Self {
			queue: self.queue.clone(),
			queue_type: self.queue_type,
			fence_value: self.fence_value,
		}
	}
}

impl<P: Platform> Debug for Execution<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Execution")
			.field("queue_type", &self.queue_type)
			.field("fence_value", &self.fence_value)
			.finish()
	}
}
