#![cfg(test)]

use crate::null_device;
use rhi_core::command::{Color, ColorAttachment, CommandBufferState, QueueType, RenderPassDesc};
use rhi_core::format::PixelFormat;
use rhi_core::platform::null::{NullCommand, NullLiveObjects};
use rhi_core::resource::{PresentMode, PresentResult, SwapChainDesc};
use std::thread;

#[test]
fn test_clear_and_present() -> anyhow::Result<()> {
	let device = null_device()?;
	let mut swap_chain = device.create_swap_chain(&SwapChainDesc {
		name: "window",
		width: 800,
		height: 600,
		color_format: PixelFormat::BGRA8Unorm,
		depth_stencil_format: PixelFormat::Undefined,
		present_mode: PresentMode::Fifo,
		backbuffer_count: 2,
		surface: None,
	})?;
	assert!(swap_chain.get_depth_stencil_texture().is_none());

	for frame in 0..4u32 {
		let queue = device.get_queue(QueueType::Graphics);
		let mut cmd = queue.get_command_buffer()?;
		let backbuffer = swap_chain.get_backbuffer_texture().clone();
		assert_eq!((backbuffer.width(0), backbuffer.height(0)), (800, 600));
		cmd.begin_render_pass(&RenderPassDesc {
			color_attachments: &[ColorAttachment {
				clear_color: Color::new(frame as f32 / 4., 0., 0., 1.),
				..ColorAttachment::new(&backbuffer)
			}],
			depth_stencil_attachment: None,
			render_area: None,
		});
		cmd.end_render_pass();
		let execution = cmd.submit()?;
		assert_eq!(execution.state(), CommandBufferState::Completed);

		assert_eq!(swap_chain.present()?, PresentResult::Presented);
		assert_eq!(swap_chain.backbuffer_index(), (frame + 1) % 2);
	}

	let submissions = device.get_queue(QueueType::Graphics).native().submissions();
	assert_eq!(submissions.len(), 4);
	assert!(submissions
		.iter()
		.all(|s| matches!(s.commands.as_slice(), [NullCommand::BeginRenderPass { .. }, NullCommand::EndRenderPass])));
	assert_eq!(swap_chain.native().present_count(), 4);
	Ok(())
}

#[test]
fn test_resources_released_once() -> anyhow::Result<()> {
	let device = null_device()?;
	let swap_chain = device.create_swap_chain(&SwapChainDesc {
		width: 800,
		height: 600,
		..SwapChainDesc::default()
	})?;
	let backbuffer = swap_chain.get_backbuffer_texture().clone();
	let queue = device.get_queue(QueueType::Graphics);
	let mut cmd = queue.get_command_buffer()?;
	cmd.begin_render_pass(&RenderPassDesc {
		color_attachments: &[ColorAttachment::new(&backbuffer)],
		depth_stencil_attachment: None,
		render_area: None,
	});
	cmd.end_render_pass();
	cmd.submit()?;

	drop(swap_chain);
	// the backbuffer outlives its swap chain as long as it is referenced
	assert_eq!(device.platform.live_objects().textures, 1);
	drop(backbuffer);
	queue.wait_idle()?;
	assert_eq!(
		device.platform.live_objects(),
		NullLiveObjects {
			command_buffers: 1,
			..NullLiveObjects::default()
		}
	);
	Ok(())
}

#[test]
fn test_concurrent_submission() -> anyhow::Result<()> {
	const THREADS: usize = 4;
	const SUBMITS: usize = 25;

	let device = null_device()?;
	thread::scope(|scope| {
		let handles = (0..THREADS)
			.map(|_| {
				scope.spawn(|| -> anyhow::Result<Vec<u64>> {
					let queue = device.get_queue(QueueType::Copy);
					(0..SUBMITS)
						.map(|_| Ok(queue.get_command_buffer()?.submit()?.fence_value()))
						.collect()
				})
			})
			.collect::<Vec<_>>();
		let mut fence_values = Vec::new();
		for handle in handles {
			let values = handle.join().map_err(|_| anyhow::anyhow!("submitting thread panicked"))??;
			assert!(values.windows(2).all(|w| w[0] < w[1]));
			fence_values.extend(values);
		}
		fence_values.sort_unstable();
		fence_values.dedup();
		assert_eq!(fence_values.len(), THREADS * SUBMITS);
		anyhow::Ok(())
	})?;

	let queue = device.get_queue(QueueType::Copy);
	let initial = QueueType::Copy.initial_fence_value();
	assert_eq!(queue.last_submitted_fence_value(), initial + (THREADS * SUBMITS) as u64 - 1);
	Ok(())
}
