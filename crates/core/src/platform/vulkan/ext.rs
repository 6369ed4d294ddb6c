use ash::prelude::VkResult;
use ash::vk::{
	CommandBuffer, CommandBufferAllocateInfo, CommandBufferLevel, CommandPool, Semaphore, SemaphoreCreateInfo,
	SemaphoreType, SemaphoreTypeCreateInfo,
};
use std::mem::MaybeUninit;

/// Shorthands for the few device calls the backend issues with fixed parameters.
pub trait DeviceExt {
	/// A single primary command buffer from `pool`, allocated without a `Vec`.
	unsafe fn allocate_primary_command_buffer(&self, pool: CommandPool) -> VkResult<CommandBuffer>;

	/// A timeline semaphore whose counter starts at `initial_value`.
	unsafe fn create_timeline_semaphore(&self, initial_value: u64) -> VkResult<Semaphore>;
}

impl DeviceExt for ash::Device {
	unsafe fn allocate_primary_command_buffer(&self, pool: CommandPool) -> VkResult<CommandBuffer> {
		let info = CommandBufferAllocateInfo::default()
			.command_pool(pool)
			.level(CommandBufferLevel::PRIMARY)
			.command_buffer_count(1);
		let mut cmd = MaybeUninit::uninit();
		unsafe { (self.fp_v1_0().allocate_command_buffers)(self.handle(), &info, cmd.as_mut_ptr()).assume_init_on_success(cmd) }
	}

	unsafe fn create_timeline_semaphore(&self, initial_value: u64) -> VkResult<Semaphore> {
		let mut timeline = SemaphoreTypeCreateInfo::default()
			.semaphore_type(SemaphoreType::TIMELINE)
			.initial_value(initial_value);
		unsafe { self.create_semaphore(&SemaphoreCreateInfo::default().push_next(&mut timeline), None) }
	}
}
