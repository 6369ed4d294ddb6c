#![cfg(test)]

use crate::{null_device, vulkan_device};
use rhi_core::command::QueueType;
use rhi_core::device::{AdapterType, GraphicsDevice};
use rhi_core::platform::Platform;

#[test]
fn test_queues_null() -> anyhow::Result<()> {
	test_queues(null_device()?.device())
}

#[test]
fn test_queues_vulkan() -> anyhow::Result<()> {
	match vulkan_device()? {
		Some(device) => test_queues(device.device()),
		None => Ok(()),
	}
}

fn test_queues<P: Platform>(device: &GraphicsDevice<P>) -> anyhow::Result<()> {
	for queue_type in QueueType::ALL {
		let queue = device.get_queue(queue_type);
		assert_eq!(queue.queue_type(), queue_type);
		assert!(queue.ptr_eq(device.get_queue(queue_type)));
		assert_eq!(queue.last_submitted_fence_value(), queue_type.initial_fence_value() - 1);
		assert_eq!(queue.completed_fence_value(), queue_type.initial_fence_value() - 1);
	}
	assert!(!device.get_queue(QueueType::Graphics).ptr_eq(device.get_queue(QueueType::Copy)));
	assert_eq!(device.queues().count(), QueueType::COUNT);
	Ok(())
}

#[test]
fn test_adapter_null() -> anyhow::Result<()> {
	let device = null_device()?;
	assert_eq!(device.adapter().adapter_type(), AdapterType::Cpu);
	test_adapter(device.device())
}

#[test]
fn test_adapter_vulkan() -> anyhow::Result<()> {
	match vulkan_device()? {
		Some(device) => test_adapter(device.device()),
		None => Ok(()),
	}
}

fn test_adapter<P: Platform>(device: &GraphicsDevice<P>) -> anyhow::Result<()> {
	assert_eq!(device.backend(), P::BACKEND);
	assert_eq!(device.caps().backend, P::BACKEND);
	assert_eq!(device.adapter().backend(), P::BACKEND);
	assert!(!device.adapter().name().is_empty());
	let limits = &device.caps().limits;
	assert!(limits.max_color_attachments >= 1);
	assert!(limits.max_texture_dimension_2d >= 4096);
	Ok(())
}
