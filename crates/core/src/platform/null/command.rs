use crate::command::{Color, LoadAction, QueueType, RenderArea, StoreAction};
use crate::platform::null::{NullError, NullHandle};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

#[derive(Clone, Debug, PartialEq)]
pub struct NullColorAttachment {
	pub texture: NullHandle,
	pub load_action: LoadAction,
	pub store_action: StoreAction,
	pub clear_color: Color,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NullCommand {
	BeginRenderPass {
		color_attachments: SmallVec<[NullColorAttachment; 1]>,
		depth_stencil_attachment: Option<NullHandle>,
		area: RenderArea,
	},
	EndRenderPass,
	SetBlendColor(Color),
}

#[derive(Clone, Debug, PartialEq)]
pub struct NullSubmission {
	pub fence_value: u64,
	pub commands: Vec<NullCommand>,
}

pub struct NullCommandBuffer {
	queue_type: QueueType,
	recording: bool,
	commands: Vec<NullCommand>,
}

impl NullCommandBuffer {
	pub(super) fn new(queue_type: QueueType) -> Self {
		Self {
			queue_type,
			recording: false,
			commands: Vec::new(),
		}
	}

	pub fn queue_type(&self) -> QueueType {
		self.queue_type
	}

	pub fn commands(&self) -> &[NullCommand] {
		&self.commands
	}

	pub(super) fn begin(&mut self) {
		assert!(!self.recording, "null command buffer was begun twice");
		self.recording = true;
	}

	pub(super) fn record(&mut self, command: NullCommand) {
		assert!(self.recording, "null command buffer recorded into outside of begin and submit");
		self.commands.push(command);
	}

	pub(super) fn finish(&mut self) -> Vec<NullCommand> {
		assert!(self.recording, "null command buffer submitted without begin");
		self.recording = false;
		std::mem::take(&mut self.commands)
	}

	pub(super) fn reset(&mut self) {
		self.recording = false;
		self.commands.clear();
	}
}

pub struct NullQueue {
	queue_type: QueueType,
	deferred_completion: bool,
	submitted: AtomicU64,
	completed: AtomicU64,
	submissions: Mutex<Vec<NullSubmission>>,
}

impl NullQueue {
	pub(super) fn new(queue_type: QueueType, initial_fence_value: u64, deferred_completion: bool) -> Self {
		Self {
			queue_type,
			deferred_completion,
			submitted: AtomicU64::new(initial_fence_value - 1),
			completed: AtomicU64::new(initial_fence_value - 1),
			submissions: Mutex::new(Vec::new()),
		}
	}

	pub fn queue_type(&self) -> QueueType {
		self.queue_type
	}

	/// Every submission made to this queue, in submission order.
	pub fn submissions(&self) -> Vec<NullSubmission> {
		self.submissions.lock().clone()
	}

	pub fn completed_fence_value(&self) -> u64 {
		self.completed.load(Relaxed)
	}

	/// Complete all submissions up to and including `fence_value`.
	pub fn complete_up_to(&self, fence_value: u64) -> Result<(), NullError> {
		let submitted = self.submitted.load(Relaxed);
		if fence_value > submitted {
			return Err(NullError::NeverSignaled { fence_value, submitted });
		}
		self.completed.fetch_max(fence_value, Relaxed);
		Ok(())
	}

	pub fn complete_all(&self) {
		self.completed.fetch_max(self.submitted.load(Relaxed), Relaxed);
	}

	pub(super) fn submit(&self, commands: Vec<NullCommand>, fence_value: u64) {
		let previous = self.submitted.swap(fence_value, Relaxed);
		assert!(
			fence_value > previous,
			"fence value {fence_value:#x} submitted after {previous:#x}"
		);
		self.submissions.lock().push(NullSubmission { fence_value, commands });
		if !self.deferred_completion {
			self.completed.store(fence_value, Relaxed);
		}
	}
}
