#![cfg(test)]

use crate::null_device;
use rhi_core::command::QueueType;
use rhi_core::format::PixelFormat;
use rhi_core::resource::{PresentMode, PresentResult, SwapChainDesc};

fn desc(backbuffer_count: u32) -> SwapChainDesc<'static> {
	SwapChainDesc {
		name: "swap chain",
		width: 640,
		height: 480,
		backbuffer_count,
		..SwapChainDesc::default()
	}
}

#[test]
fn test_present_cycles_backbuffers() -> anyhow::Result<()> {
	for count in [2, 3] {
		let device = null_device()?;
		let mut swap_chain = device.create_swap_chain(&desc(count))?;
		assert_eq!(swap_chain.backbuffer_count(), count);
		assert_eq!(swap_chain.backbuffer_index(), 0);
		for i in 1..=2 * count {
			assert_eq!(swap_chain.present()?, PresentResult::Presented);
			assert_eq!(swap_chain.backbuffer_index(), i % count);
			assert!(swap_chain.get_backbuffer_texture().ptr_eq(&swap_chain.backbuffers()[(i % count) as usize]));
		}
	}
	Ok(())
}

#[test]
fn test_resize_is_idempotent() -> anyhow::Result<()> {
	let device = null_device()?;
	let mut swap_chain = device.create_swap_chain(&desc(2))?;
	let before = swap_chain.get_backbuffer_texture().clone();

	assert!(!swap_chain.resize(640, 480)?);
	assert!(swap_chain.get_backbuffer_texture().ptr_eq(&before));

	assert!(swap_chain.resize(1280, 720)?);
	assert!(!swap_chain.get_backbuffer_texture().ptr_eq(&before));
	let resized = swap_chain.get_backbuffer_texture().clone();
	assert!(!swap_chain.resize(1280, 720)?);
	assert!(swap_chain.get_backbuffer_texture().ptr_eq(&resized));
	assert_eq!((swap_chain.width(), swap_chain.height()), (1280, 720));
	assert_eq!(swap_chain.native().extent(), (1280, 720));
	Ok(())
}

#[test]
fn test_resize_to_zero_is_ignored() -> anyhow::Result<()> {
	let device = null_device()?;
	let mut swap_chain = device.create_swap_chain(&desc(3))?;
	swap_chain.present()?;
	let index = swap_chain.backbuffer_index();

	assert!(!swap_chain.resize(0, 480)?);
	assert!(!swap_chain.resize(640, 0)?);
	assert!(!swap_chain.resize(0, 0)?);
	assert_eq!((swap_chain.width(), swap_chain.height()), (640, 480));
	assert_eq!(swap_chain.backbuffer_index(), index);
	assert_eq!(swap_chain.get_backbuffer_texture().width(0), 640);
	Ok(())
}

#[test]
fn test_backbuffer_properties() -> anyhow::Result<()> {
	let device = null_device()?;
	let swap_chain = device.create_swap_chain(&SwapChainDesc {
		color_format: PixelFormat::RGBA8UnormSrgb,
		present_mode: PresentMode::Mailbox,
		..desc(2)
	})?;
	assert_eq!(swap_chain.color_format(), PixelFormat::RGBA8UnormSrgb);
	assert_eq!(swap_chain.present_mode(), PresentMode::Mailbox);
	assert!(swap_chain.queue().ptr_eq(device.get_queue(QueueType::Graphics)));
	for backbuffer in swap_chain.backbuffers() {
		assert!(backbuffer.is_backbuffer());
		assert_eq!(backbuffer.format(), PixelFormat::RGBA8UnormSrgb);
		assert_eq!((backbuffer.width(0), backbuffer.height(0)), (640, 480));
		assert_eq!(backbuffer.mip_levels(), 1);
	}
	Ok(())
}

#[test]
fn test_missing_graphics_queue() -> anyhow::Result<()> {
	use crate::device_config;
	use rhi_core::device::{DeviceConfig, GraphicsDevice, QueueTypes};
	use rhi_core::error::GraphicsErrorKind;
	use rhi_core::platform::null::{Null, NullCreateInfo};

	let device = GraphicsDevice::<Null>::new(
		NullCreateInfo::default(),
		&DeviceConfig {
			queue_types: QueueTypes::COMPUTE | QueueTypes::COPY,
			..device_config()
		},
	)?;
	let err = device.create_swap_chain(&desc(2)).unwrap_err();
	assert_eq!(err.kind(), GraphicsErrorKind::InvalidUsage);
	Ok(())
}
