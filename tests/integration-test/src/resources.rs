#![cfg(test)]

use crate::{null_device, vulkan_device};
use glam::Vec4;
use rhi_core::device::GraphicsDevice;
use rhi_core::error::GraphicsErrorKind;
use rhi_core::format::PixelFormat;
use rhi_core::platform::Platform;
use rhi_core::resource::{
	BufferDesc, BufferUsage, GraphicsResource, HeapType, TextureDesc, TextureType, TextureUsage,
};

#[test]
fn test_upload_buffer_null() -> anyhow::Result<()> {
	test_upload_buffer(null_device()?.device())
}

#[test]
fn test_upload_buffer_vulkan() -> anyhow::Result<()> {
	match vulkan_device()? {
		Some(device) => test_upload_buffer(device.device()),
		None => Ok(()),
	}
}

fn test_upload_buffer<P: Platform>(device: &GraphicsDevice<P>) -> anyhow::Result<()> {
	let vertices = [Vec4::new(-1., -1., 0., 1.), Vec4::new(3., -1., 0., 1.), Vec4::new(-1., 3., 0., 1.)];
	let buffer = device.create_buffer_with_data(
		&BufferDesc {
			name: "vertices",
			usage: BufferUsage::MAP_WRITE | BufferUsage::VERTEX,
			..BufferDesc::default()
		},
		&vertices,
	)?;
	assert_eq!(buffer.size(), 3 * 16);
	assert_eq!(buffer.heap_type(), HeapType::Upload);
	assert!(buffer.device().is_some_and(|d| d.ptr_eq(device)));

	buffer.write_data(16, &[Vec4::ZERO])?;
	let mut out = [Vec4::ZERO; 1];
	let err = buffer.read_data(0, &mut out).unwrap_err();
	assert_eq!(err.kind(), GraphicsErrorKind::InvalidUsage);
	let err = buffer.write_data(32, &[Vec4::ZERO; 2]).unwrap_err();
	assert_eq!(err.kind(), GraphicsErrorKind::InvalidUsage);
	Ok(())
}

#[test]
fn test_readback_buffer_null() -> anyhow::Result<()> {
	test_readback_buffer(null_device()?.device())
}

#[test]
fn test_readback_buffer_vulkan() -> anyhow::Result<()> {
	match vulkan_device()? {
		Some(device) => test_readback_buffer(device.device()),
		None => Ok(()),
	}
}

fn test_readback_buffer<P: Platform>(device: &GraphicsDevice<P>) -> anyhow::Result<()> {
	let buffer = device.create_buffer(&BufferDesc {
		name: "readback",
		usage: BufferUsage::MAP_READ | BufferUsage::COPY_DST,
		size: 256,
		..BufferDesc::default()
	})?;
	assert_eq!(buffer.heap_type(), HeapType::Readback);
	let mut out = [0u32; 64];
	buffer.read_data(0, &mut out)?;
	let err = buffer.write_data(0, &[0u32]).unwrap_err();
	assert_eq!(err.kind(), GraphicsErrorKind::InvalidUsage);

	let err = device
		.create_buffer(&BufferDesc {
			name: "readback vertices",
			usage: BufferUsage::MAP_READ | BufferUsage::VERTEX,
			size: 256,
			..BufferDesc::default()
		})
		.unwrap_err();
	assert_eq!(err.kind(), GraphicsErrorKind::InvalidUsage);
	Ok(())
}

#[test]
fn test_textures_null() -> anyhow::Result<()> {
	test_textures(null_device()?.device())
}

#[test]
fn test_textures_vulkan() -> anyhow::Result<()> {
	match vulkan_device()? {
		Some(device) => test_textures(device.device()),
		None => Ok(()),
	}
}

fn test_textures<P: Platform>(device: &GraphicsDevice<P>) -> anyhow::Result<()> {
	let texture = device.create_texture(&TextureDesc {
		name: "mipped",
		format: PixelFormat::RGBA8Unorm,
		usage: TextureUsage::SAMPLED | TextureUsage::COLOR_ATTACHMENT,
		width: 256,
		height: 256,
		mip_levels: 4,
		..TextureDesc::default()
	})?;
	assert_eq!(texture.width(0), 256);
	assert_eq!(texture.width(3), 32);
	assert_eq!(texture.width(4), 0);
	assert_eq!(texture.heap_type(), HeapType::Default);
	assert!(!texture.is_backbuffer());

	let full_chain = device.create_texture(&TextureDesc {
		name: "full chain",
		format: PixelFormat::RGBA8Unorm,
		usage: TextureUsage::SAMPLED,
		width: 64,
		height: 16,
		mip_levels: 0,
		..TextureDesc::default()
	})?;
	assert_eq!(full_chain.mip_levels(), 7);
	assert_eq!(full_chain.height(6), 1);

	let depth = device.create_texture(&TextureDesc {
		name: "depth",
		format: PixelFormat::Depth32Float,
		usage: TextureUsage::DEPTH_STENCIL_ATTACHMENT,
		width: 800,
		height: 600,
		..TextureDesc::default()
	})?;
	assert_eq!(depth.format(), PixelFormat::Depth32Float);

	let cube = device.create_texture(&TextureDesc {
		name: "cube",
		texture_type: TextureType::TextureCube,
		format: PixelFormat::RGBA8Unorm,
		usage: TextureUsage::SAMPLED,
		width: 32,
		height: 32,
		array_layers: 6,
		..TextureDesc::default()
	})?;
	assert_eq!(cube.array_layers(), 6);
	assert_eq!(cube.subresource_index(0, 5), 5);

	let err = device
		.create_texture(&TextureDesc {
			name: "empty",
			format: PixelFormat::RGBA8Unorm,
			usage: TextureUsage::SAMPLED,
			width: 0,
			..TextureDesc::default()
		})
		.unwrap_err();
	assert_eq!(err.kind(), GraphicsErrorKind::ResourceCreation);
	Ok(())
}
