use crate::command::{LoadAction, QueueType, RenderArea, RenderPassDesc, StoreAction};
use crate::platform::vulkan::{DeviceExt, SharedQueue, SubresourceStates, Vulkan, VulkanError, VulkanTexture};
use ash::vk::{
	AccessFlags2, ClearDepthStencilValue, ClearValue, CommandBufferBeginInfo, CommandBufferSubmitInfo,
	CommandBufferUsageFlags, CommandPool, CommandPoolCreateFlags, CommandPoolCreateInfo, CommandPoolResetFlags, DependencyInfo, Extent2D,
	ImageAspectFlags, ImageLayout, ImageMemoryBarrier2, ImageSubresourceRange, Offset2D, PipelineStageFlags2, Rect2D,
	RenderingAttachmentInfo, RenderingInfo, Semaphore, SemaphoreSubmitInfo, SemaphoreWaitInfo, SubmitInfo2,
	QUEUE_FAMILY_IGNORED,
};
use log::error;
use smallvec::SmallVec;
use std::sync::Arc;

/// A [`QueueType`] backed by a vulkan queue and a timeline semaphore acting as its fence.
pub struct VulkanQueue {
	queue_type: QueueType,
	pub shared: Arc<SharedQueue>,
	pub timeline: Semaphore,
}

impl VulkanQueue {
	pub unsafe fn new(vulkan: &Vulkan, queue_type: QueueType, initial_fence_value: u64) -> Result<Self, VulkanError> {
		unsafe {
			let timeline = vulkan.device.create_timeline_semaphore(initial_fence_value - 1)?;
			Ok(Self {
				queue_type,
				shared: vulkan.queues[queue_type.index()].clone(),
				timeline,
			})
		}
	}

	pub fn queue_type(&self) -> QueueType {
		self.queue_type
	}

	pub fn family_index(&self) -> u32 {
		self.shared.family_index
	}

	pub unsafe fn destroy(&self, vulkan: &Vulkan) {
		unsafe {
			vulkan.device.destroy_semaphore(self.timeline, None);
		}
	}

	pub unsafe fn submit(&self, vulkan: &Vulkan, cmd: &mut VulkanCommandBuffer, fence_value: u64) -> Result<(), VulkanError> {
		profiling::function_scope!();
		unsafe {
			vulkan.device.end_command_buffer(cmd.cmd)?;
			let queue = self.shared.queue.lock();
			vulkan.device.queue_submit2(
				*queue,
				&[SubmitInfo2::default()
					.command_buffer_infos(&[CommandBufferSubmitInfo::default().command_buffer(cmd.cmd)])
					.signal_semaphore_infos(&[SemaphoreSubmitInfo::default()
						.semaphore(self.timeline)
						.value(fence_value)
						.stage_mask(PipelineStageFlags2::ALL_COMMANDS)])],
				ash::vk::Fence::null(),
			)?;
			cmd.commit_initialization();
			Ok(())
		}
	}

	pub unsafe fn completed_fence_value(&self, vulkan: &Vulkan) -> u64 {
		unsafe {
			match vulkan.device.get_semaphore_counter_value(self.timeline) {
				Ok(value) => value,
				Err(e) => {
					error!("Querying the {:?} queue's timeline semaphore failed: {}", self.queue_type, e);
					0
				}
			}
		}
	}

	pub unsafe fn wait_for_fence_value(&self, vulkan: &Vulkan, fence_value: u64) -> Result<(), VulkanError> {
		profiling::function_scope!();
		unsafe {
			vulkan.device.wait_semaphores(
				&SemaphoreWaitInfo::default()
					.semaphores(&[self.timeline])
					.values(&[fence_value]),
				u64::MAX,
			)?;
			Ok(())
		}
	}
}

/// An attachment of the open render pass, to be transitioned back into its resting layout on end.
struct OpenAttachment {
	image: ash::vk::Image,
	range: ImageSubresourceRange,
	layout: ImageLayout,
	resting_layout: ImageLayout,
	stage: PipelineStageFlags2,
	access: AccessFlags2,
}

/// A subresource whose contents a command buffer defines or discards, applied to the texture once submitted.
struct PendingInitialization {
	states: SubresourceStates,
	index: usize,
	initialized: bool,
}

pub struct VulkanCommandBuffer {
	pool: CommandPool,
	pub cmd: ash::vk::CommandBuffer,
	open_attachments: SmallVec<[OpenAttachment; 2]>,
	pending_initialization: SmallVec<[PendingInitialization; 4]>,
}

impl VulkanCommandBuffer {
	pub unsafe fn new(vulkan: &Vulkan, queue: &VulkanQueue) -> Result<Self, VulkanError> {
		unsafe {
			let device = &vulkan.device;
			let pool = device.create_command_pool(
				&CommandPoolCreateInfo::default()
					.flags(CommandPoolCreateFlags::TRANSIENT)
					.queue_family_index(queue.family_index()),
				None,
			)?;
			let cmd = match device.allocate_primary_command_buffer(pool) {
				Ok(cmd) => cmd,
				Err(e) => {
					device.destroy_command_pool(pool, None);
					return Err(e.into());
				}
			};
			Ok(Self {
				pool,
				cmd,
				open_attachments: SmallVec::new(),
				pending_initialization: SmallVec::new(),
			})
		}
	}

	pub unsafe fn begin(&mut self, vulkan: &Vulkan) -> Result<(), VulkanError> {
		unsafe {
			vulkan.device.begin_command_buffer(
				self.cmd,
				&CommandBufferBeginInfo::default().flags(CommandBufferUsageFlags::ONE_TIME_SUBMIT),
			)?;
			Ok(())
		}
	}

	pub unsafe fn reset(&mut self, vulkan: &Vulkan) -> Result<(), VulkanError> {
		unsafe {
			self.discard_recording();
			vulkan
				.device
				.reset_command_pool(self.pool, CommandPoolResetFlags::empty())?;
			Ok(())
		}
	}

	/// Forget everything recorded, the contents of an unsubmitted command buffer never reach its textures.
	fn discard_recording(&mut self) {
		self.open_attachments.clear();
		self.pending_initialization.clear();
	}

	pub unsafe fn destroy(self, vulkan: &Vulkan) {
		unsafe {
			// command buffers allocated from a pool are freed implicitly
			vulkan.device.destroy_command_pool(self.pool, None);
		}
	}

	/// Whether a subresource holds defined contents at this point of the recording, taking earlier passes of this
	/// command buffer into account.
	fn is_initialized(&self, states: &SubresourceStates, index: usize) -> bool {
		self.pending_initialization
			.iter()
			.rev()
			.find(|pending| pending.index == index && pending.states.ptr_eq(states))
			.map_or_else(|| states.get(index), |pending| pending.initialized)
	}

	fn record_initialization(&mut self, states: &SubresourceStates, index: usize, initialized: bool) {
		self.pending_initialization.push(PendingInitialization {
			states: states.clone(),
			index,
			initialized,
		});
	}

	/// Called once the command buffer was submitted, under the queue's submission lock.
	fn commit_initialization(&mut self) {
		for pending in self.pending_initialization.drain(..) {
			pending.states.set(pending.index, pending.initialized);
		}
	}

	/// The layout a subresource is in before the render pass. Anything not loaded may be discarded.
	fn previous_layout(&self, texture: &VulkanTexture, mip_level: u32, array_layer: u32, load_action: LoadAction) -> ImageLayout {
		let index = texture.subresource_index(mip_level, array_layer);
		if load_action == LoadAction::Load && self.is_initialized(&texture.initialized, index) {
			texture.resting_layout
		} else {
			ImageLayout::UNDEFINED
		}
	}

	fn transition(attachment: &OpenAttachment, old_layout: ImageLayout, new_layout: ImageLayout, into_pass: bool) -> ImageMemoryBarrier2<'static> {
		let (src_stage, src_access, dst_stage, dst_access) = if into_pass {
			(
				PipelineStageFlags2::ALL_COMMANDS,
				AccessFlags2::MEMORY_WRITE,
				attachment.stage,
				attachment.access,
			)
		} else {
			(
				attachment.stage,
				attachment.access,
				PipelineStageFlags2::ALL_COMMANDS,
				AccessFlags2::MEMORY_READ | AccessFlags2::MEMORY_WRITE,
			)
		};
		ImageMemoryBarrier2::default()
			.src_stage_mask(src_stage)
			.src_access_mask(src_access)
			.dst_stage_mask(dst_stage)
			.dst_access_mask(dst_access)
			.old_layout(old_layout)
			.new_layout(new_layout)
			.src_queue_family_index(QUEUE_FAMILY_IGNORED)
			.dst_queue_family_index(QUEUE_FAMILY_IGNORED)
			.image(attachment.image)
			.subresource_range(attachment.range)
	}

	pub unsafe fn begin_render_pass(&mut self, vulkan: &Vulkan, desc: &RenderPassDesc<Vulkan>, area: RenderArea) {
		unsafe {
			debug_assert!(self.open_attachments.is_empty());
			let mut barriers = SmallVec::<[ImageMemoryBarrier2; 2]>::new();

			let mut color_infos = SmallVec::<[RenderingAttachmentInfo; 1]>::new();
			for attachment in desc.color_attachments {
				let texture = attachment.texture.native();
				let (mip, layer) = (attachment.mip_level, attachment.array_layer);
				let open = OpenAttachment {
					image: texture.image,
					range: texture.subresource_range(mip, layer),
					layout: ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
					resting_layout: texture.resting_layout,
					stage: PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
					access: AccessFlags2::COLOR_ATTACHMENT_READ | AccessFlags2::COLOR_ATTACHMENT_WRITE,
				};
				let old_layout = self.previous_layout(texture, mip, layer, attachment.load_action);
				barriers.push(Self::transition(&open, old_layout, open.layout, true));
				color_infos.push(
					RenderingAttachmentInfo::default()
						.image_view(texture.attachment_view(mip, layer).unwrap_or_default())
						.image_layout(open.layout)
						.load_op(attachment.load_action.to_ash_load_op())
						.store_op(attachment.store_action.to_ash_store_op())
						.clear_value(ClearValue {
							color: attachment.clear_color.to_ash_clear_color(),
						}),
				);
				let stored = attachment.store_action == StoreAction::Store;
				self.record_initialization(&texture.initialized, texture.subresource_index(mip, layer), stored);
				self.open_attachments.push(open);
			}

			let mut depth_info = None;
			let mut stencil_info = None;
			if let Some(attachment) = &desc.depth_stencil_attachment {
				let texture = attachment.texture.native();
				let (mip, layer) = (attachment.mip_level, attachment.array_layer);
				let has_stencil = texture.aspect.contains(ImageAspectFlags::STENCIL);
				let open = OpenAttachment {
					image: texture.image,
					range: texture.subresource_range(mip, layer),
					layout: ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
					resting_layout: texture.resting_layout,
					stage: PipelineStageFlags2::EARLY_FRAGMENT_TESTS | PipelineStageFlags2::LATE_FRAGMENT_TESTS,
					access: AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
				};
				// the whole subresource transitions at once, so stencil must be preserved if either aspect loads
				let load_action = if attachment.depth_load_action == LoadAction::Load
					|| (has_stencil && attachment.stencil_load_action == LoadAction::Load)
				{
					LoadAction::Load
				} else {
					LoadAction::Discard
				};
				let old_layout = self.previous_layout(texture, mip, layer, load_action);
				barriers.push(Self::transition(&open, old_layout, open.layout, true));

				let view = texture.attachment_view(mip, layer).unwrap_or_default();
				let clear_value = ClearValue {
					depth_stencil: ClearDepthStencilValue {
						depth: attachment.clear_depth,
						stencil: attachment.clear_stencil as u32,
					},
				};
				depth_info = Some(
					RenderingAttachmentInfo::default()
						.image_view(view)
						.image_layout(open.layout)
						.load_op(attachment.depth_load_action.to_ash_load_op())
						.store_op(attachment.depth_store_action.to_ash_store_op())
						.clear_value(clear_value),
				);
				if has_stencil {
					stencil_info = Some(
						RenderingAttachmentInfo::default()
							.image_view(view)
							.image_layout(open.layout)
							.load_op(attachment.stencil_load_action.to_ash_load_op())
							.store_op(attachment.stencil_store_action.to_ash_store_op())
							.clear_value(clear_value),
					);
				}
				let stored = attachment.depth_store_action == StoreAction::Store
					|| (has_stencil && attachment.stencil_store_action == StoreAction::Store);
				self.record_initialization(&texture.initialized, texture.subresource_index(mip, layer), stored);
				self.open_attachments.push(open);
			}

			let device = &vulkan.device;
			device.cmd_pipeline_barrier2(self.cmd, &DependencyInfo::default().image_memory_barriers(&barriers));

			let mut rendering_info = RenderingInfo::default()
				.render_area(Rect2D {
					offset: Offset2D {
						x: area.offset.x as i32,
						y: area.offset.y as i32,
					},
					extent: Extent2D {
						width: area.extent.x,
						height: area.extent.y,
					},
				})
				.layer_count(1)
				.color_attachments(&color_infos);
			if let Some(depth_info) = depth_info.as_ref() {
				rendering_info = rendering_info.depth_attachment(depth_info);
			}
			if let Some(stencil_info) = stencil_info.as_ref() {
				rendering_info = rendering_info.stencil_attachment(stencil_info);
			}
			device.cmd_begin_rendering(self.cmd, &rendering_info);
		}
	}

	pub unsafe fn end_render_pass(&mut self, vulkan: &Vulkan) {
		unsafe {
			let device = &vulkan.device;
			device.cmd_end_rendering(self.cmd);
			let barriers = self
				.open_attachments
				.drain(..)
				.map(|open| Self::transition(&open, open.layout, open.resting_layout, false))
				.collect::<SmallVec<[_; 2]>>();
			device.cmd_pipeline_barrier2(self.cmd, &DependencyInfo::default().image_memory_barriers(&barriers));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn unallocated() -> VulkanCommandBuffer {
		VulkanCommandBuffer {
			pool: CommandPool::null(),
			cmd: ash::vk::CommandBuffer::null(),
			open_attachments: SmallVec::new(),
			pending_initialization: SmallVec::new(),
		}
	}

	#[test]
	fn test_initialization_applies_on_submit() -> anyhow::Result<()> {
		let states = SubresourceStates::new(2);
		let mut cmd = unallocated();
		cmd.record_initialization(&states, 1, true);
		assert!(cmd.is_initialized(&states, 1));
		assert!(!cmd.is_initialized(&states, 0));
		assert!(!states.get(1));

		cmd.commit_initialization();
		assert!(states.get(1));
		assert!(cmd.pending_initialization.is_empty());
		Ok(())
	}

	#[test]
	fn test_unsubmitted_initialization_is_discarded() -> anyhow::Result<()> {
		let states = SubresourceStates::new(1);
		let mut cmd = unallocated();
		cmd.record_initialization(&states, 0, true);
		cmd.discard_recording();
		assert!(!cmd.is_initialized(&states, 0));
		assert!(!states.get(0));
		Ok(())
	}

	#[test]
	fn test_latest_pass_wins() -> anyhow::Result<()> {
		let states = SubresourceStates::new(1);
		let other = SubresourceStates::new(1);
		let mut cmd = unallocated();
		cmd.record_initialization(&states, 0, true);
		cmd.record_initialization(&other, 0, true);
		cmd.record_initialization(&states, 0, false);
		assert!(!cmd.is_initialized(&states, 0));
		assert!(cmd.is_initialized(&other, 0));

		cmd.commit_initialization();
		assert!(!states.get(0));
		assert!(other.get(0));
		Ok(())
	}
}
