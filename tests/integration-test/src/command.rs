#![cfg(test)]

use crate::{null_device, null_device_with, vulkan_device};
use glam::UVec2;
use rhi_core::command::{
	Color, ColorAttachment, CommandBufferState, DepthStencilAttachment, LoadAction, QueueType, RenderArea,
	RenderPassDesc, StoreAction,
};
use rhi_core::device::GraphicsDevice;
use rhi_core::format::PixelFormat;
use rhi_core::platform::null::{NullCommand, NullCreateInfo};
use rhi_core::platform::Platform;
use rhi_core::resource::{TextureDesc, TextureUsage};

#[test]
fn test_offscreen_render_pass_null() -> anyhow::Result<()> {
	test_offscreen_render_pass(null_device()?.device())
}

#[test]
fn test_offscreen_render_pass_vulkan() -> anyhow::Result<()> {
	match vulkan_device()? {
		Some(device) => test_offscreen_render_pass(device.device()),
		None => Ok(()),
	}
}

fn test_offscreen_render_pass<P: Platform>(device: &GraphicsDevice<P>) -> anyhow::Result<()> {
	let color = device.create_texture(&TextureDesc {
		name: "color",
		format: PixelFormat::RGBA8Unorm,
		usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED,
		width: 128,
		height: 64,
		mip_levels: 2,
		..TextureDesc::default()
	})?;
	let depth = device.create_texture(&TextureDesc {
		name: "depth",
		format: PixelFormat::Depth24UnormStencil8,
		usage: TextureUsage::DEPTH_STENCIL_ATTACHMENT,
		width: 64,
		height: 32,
		..TextureDesc::default()
	})?;

	let queue = device.get_queue(QueueType::Graphics);
	let mut cmd = queue.get_command_buffer()?;
	assert_eq!(cmd.state(), CommandBufferState::Idle);
	cmd.begin_render_pass(&RenderPassDesc {
		color_attachments: &[ColorAttachment {
			mip_level: 1,
			clear_color: Color::CORNFLOWER_BLUE,
			..ColorAttachment::new(&color)
		}],
		depth_stencil_attachment: Some(DepthStencilAttachment {
			stencil_load_action: LoadAction::Clear,
			stencil_store_action: StoreAction::Store,
			clear_stencil: 0x80,
			..DepthStencilAttachment::new(&depth)
		}),
		render_area: None,
	});
	assert_eq!(cmd.state(), CommandBufferState::Recording);
	assert!(cmd.is_render_pass_open());
	cmd.set_blend_color(Color::WHITE);
	cmd.end_render_pass();

	// the contents of the first pass are loaded again
	cmd.begin_render_pass(&RenderPassDesc {
		color_attachments: &[ColorAttachment {
			mip_level: 1,
			load_action: LoadAction::Load,
			..ColorAttachment::new(&color)
		}],
		depth_stencil_attachment: None,
		render_area: Some(RenderArea {
			offset: UVec2::new(16, 8),
			extent: UVec2::new(32, 16),
		}),
	});
	cmd.end_render_pass();

	let execution = cmd.submit()?;
	assert_eq!(execution.queue_type(), QueueType::Graphics);
	assert_eq!(execution.fence_value(), QueueType::Graphics.initial_fence_value());
	queue.wait_idle()?;
	assert!(execution.is_completed());
	assert_eq!(queue.completed_fence_value(), execution.fence_value());
	Ok(())
}

#[test]
fn test_all_queues_submit_null() -> anyhow::Result<()> {
	test_all_queues_submit(null_device()?.device())
}

#[test]
fn test_all_queues_submit_vulkan() -> anyhow::Result<()> {
	match vulkan_device()? {
		Some(device) => test_all_queues_submit(device.device()),
		None => Ok(()),
	}
}

fn test_all_queues_submit<P: Platform>(device: &GraphicsDevice<P>) -> anyhow::Result<()> {
	for queue_type in QueueType::ALL {
		let queue = device.get_queue(queue_type);
		let executions = (0..3)
			.map(|_| queue.get_command_buffer()?.submit())
			.collect::<Result<Vec<_>, _>>()?;
		let fence_values = executions.iter().map(|e| e.fence_value()).collect::<Vec<_>>();
		let initial = queue_type.initial_fence_value();
		assert_eq!(fence_values, [initial, initial + 1, initial + 2]);
		assert_eq!(queue.last_submitted_fence_value(), initial + 2);
	}
	device.wait_idle()?;
	for queue in device.queues() {
		assert_eq!(queue.completed_fence_value(), queue.last_submitted_fence_value());
	}
	Ok(())
}

#[test]
fn test_discarded_recording_null() -> anyhow::Result<()> {
	test_discarded_recording(null_device()?.device())
}

#[test]
fn test_discarded_recording_vulkan() -> anyhow::Result<()> {
	match vulkan_device()? {
		Some(device) => test_discarded_recording(device.device()),
		None => Ok(()),
	}
}

/// A command buffer dropped without submitting must not leave its textures looking written to.
fn test_discarded_recording<P: Platform>(device: &GraphicsDevice<P>) -> anyhow::Result<()> {
	let target = device.create_texture(&TextureDesc {
		name: "target",
		format: PixelFormat::RGBA8Unorm,
		usage: TextureUsage::COLOR_ATTACHMENT,
		width: 32,
		height: 32,
		..TextureDesc::default()
	})?;
	let queue = device.get_queue(QueueType::Graphics);
	{
		let mut cmd = queue.get_command_buffer()?;
		cmd.begin_render_pass(&RenderPassDesc {
			color_attachments: &[ColorAttachment::new(&target)],
			depth_stencil_attachment: None,
			render_area: None,
		});
		cmd.end_render_pass();
	}

	let mut cmd = queue.get_command_buffer()?;
	cmd.begin_render_pass(&RenderPassDesc {
		color_attachments: &[ColorAttachment {
			load_action: LoadAction::Load,
			..ColorAttachment::new(&target)
		}],
		depth_stencil_attachment: None,
		render_area: None,
	});
	cmd.end_render_pass();
	let execution = cmd.submit()?;
	queue.wait_idle()?;
	assert!(execution.is_completed());
	Ok(())
}

#[test]
fn test_execution_lifecycle() -> anyhow::Result<()> {
	let device = null_device_with(NullCreateInfo {
		deferred_completion: true,
		..NullCreateInfo::default()
	})?;
	let queue = device.get_queue(QueueType::Compute);

	let first = queue.get_command_buffer()?.submit()?;
	let second = queue.get_command_buffer()?.submit()?;
	assert_eq!(first.state(), CommandBufferState::Submitted);
	assert_eq!(second.state(), CommandBufferState::Submitted);

	queue.native().complete_up_to(first.fence_value())?;
	assert_eq!(first.state(), CommandBufferState::Completed);
	assert_eq!(second.state(), CommandBufferState::Submitted);

	queue.wait_idle()?;
	assert!(second.is_completed());
	Ok(())
}

#[test]
fn test_recorded_commands() -> anyhow::Result<()> {
	let device = null_device()?;
	let target = device.create_texture(&TextureDesc {
		name: "target",
		format: PixelFormat::BGRA8Unorm,
		usage: TextureUsage::COLOR_ATTACHMENT,
		width: 16,
		height: 16,
		..TextureDesc::default()
	})?;
	let queue = device.get_queue(QueueType::Graphics);
	let mut cmd = queue.get_command_buffer()?;
	cmd.begin_render_pass(&RenderPassDesc {
		color_attachments: &[ColorAttachment {
			store_action: StoreAction::Discard,
			..ColorAttachment::new(&target)
		}],
		depth_stencil_attachment: None,
		render_area: None,
	});
	cmd.end_render_pass();
	let execution = cmd.submit()?;

	let submissions = queue.native().submissions();
	let submission = submissions
		.iter()
		.find(|s| s.fence_value == execution.fence_value())
		.ok_or_else(|| anyhow::anyhow!("submission not recorded"))?;
	match submission.commands.as_slice() {
		[NullCommand::BeginRenderPass {
			color_attachments,
			depth_stencil_attachment: None,
			area,
		}, NullCommand::EndRenderPass] => {
			assert_eq!(color_attachments.len(), 1);
			assert_eq!(color_attachments[0].texture, target.handle());
			assert_eq!(color_attachments[0].store_action, StoreAction::Discard);
			assert_eq!(area.extent, UVec2::new(16, 16));
		}
		commands => panic!("unexpected commands {commands:?}"),
	}
	Ok(())
}
