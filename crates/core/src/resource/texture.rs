use crate::device::{GraphicsDevice, GraphicsDeviceLimits, WeakGraphicsDevice};
use crate::error::{GraphicsError, Result};
use crate::format::PixelFormat;
use crate::platform::{DebugObject, Platform};
use crate::refcount::RefPtr;
use crate::resource::{GraphicsResource, HeapType};
use parking_lot::Mutex;
use static_assertions::assert_impl_all;
use std::fmt::{Debug, Formatter};
use std::mem::ManuallyDrop;
use std::ops::Deref;

bitflags::bitflags! {
	#[repr(transparent)]
	#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
	pub struct TextureUsage: u32 {
		const COPY_SRC = 0b1;
		const COPY_DST = 0b10;
		const SAMPLED = 0b100;
		const STORAGE = 0b1000;
		const COLOR_ATTACHMENT = 0b1_0000;
		const DEPTH_STENCIL_ATTACHMENT = 0b10_0000;
		/// Reserved for backbuffers of a [`SwapChain`].
		///
		/// [`SwapChain`]: crate::resource::SwapChain
		const SWAPCHAIN = 0b100_0000;
	}
}

impl TextureUsage {
	pub fn is_attachment(&self) -> bool {
		self.intersects(TextureUsage::COLOR_ATTACHMENT | TextureUsage::DEPTH_STENCIL_ATTACHMENT)
	}
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum TextureType {
	Texture1D,
	#[default]
	Texture2D,
	Texture3D,
	TextureCube,
}

/// Number of mip levels of a full mip chain down to 1x1x1.
pub const fn calculate_mip_levels(width: u32, height: u32, depth: u32) -> u32 {
	let mut max = width;
	if height > max {
		max = height;
	}
	if depth > max {
		max = depth;
	}
	u32::BITS - max.leading_zeros()
}

/// Size of a dimension at `mip_level`, or 0 if the texture does not have that mip level.
#[inline]
pub const fn mip_size(base: u32, mip_level: u32, mip_levels: u32) -> u32 {
	if mip_level < mip_levels {
		match base.checked_shr(mip_level) {
			Some(0) | None => 1,
			Some(size) => size,
		}
	} else {
		0
	}
}

#[derive(Copy, Clone, Debug)]
pub struct TextureDesc<'a> {
	/// Name of the texture, for tracking and debugging purposes
	pub name: &'a str,
	pub texture_type: TextureType,
	pub format: PixelFormat,
	pub usage: TextureUsage,
	pub width: u32,
	pub height: u32,
	/// Depth of [`TextureType::Texture3D`], must be 1 otherwise.
	pub depth: u32,
	/// 0 requests a full mip chain.
	pub mip_levels: u32,
	/// Must be a multiple of 6 for [`TextureType::TextureCube`].
	pub array_layers: u32,
	pub sample_count: u32,
}

impl Default for TextureDesc<'_> {
	fn default() -> Self {
		Self {
			name: "",
			texture_type: TextureType::Texture2D,
			format: PixelFormat::Undefined,
			usage: TextureUsage::empty(),
			width: 1,
			height: 1,
			depth: 1,
			mip_levels: 1,
			array_layers: 1,
			sample_count: 1,
		}
	}
}

impl TextureDesc<'_> {
	pub fn info(&self) -> TextureInfo {
		TextureInfo {
			texture_type: self.texture_type,
			format: self.format,
			usage: self.usage,
			width: self.width,
			height: self.height,
			depth: self.depth,
			mip_levels: match self.mip_levels {
				0 => calculate_mip_levels(self.width, self.height, self.depth),
				mip_levels => mip_levels,
			},
			array_layers: self.array_layers,
			sample_count: self.sample_count,
		}
	}

	pub fn validate(&self, limits: &GraphicsDeviceLimits) -> Result<()> {
		let creation = |reason: &str| Err(GraphicsError::resource_creation(self.name, reason));
		let invalid = |reason: &str| Err(GraphicsError::invalid_usage(self.name, reason));

		if self.format.is_undefined() {
			return creation("format must not be Undefined");
		}
		if self.width == 0 || self.height == 0 || self.depth == 0 || self.array_layers == 0 {
			return creation(
				format!(
					"dimensions must be non-zero, got {}x{}x{} with {} layers",
					self.width, self.height, self.depth, self.array_layers
				)
				.as_str(),
			);
		}

		let max_dimension = match self.texture_type {
			TextureType::Texture1D => {
				if self.height != 1 || self.depth != 1 {
					return creation("Texture1D must have a height and depth of 1");
				}
				limits.max_texture_dimension_1d
			}
			TextureType::Texture2D => {
				if self.depth != 1 {
					return creation("Texture2D must have a depth of 1, use array_layers instead");
				}
				limits.max_texture_dimension_2d
			}
			TextureType::Texture3D => {
				if self.array_layers != 1 {
					return creation("Texture3D can not have array layers");
				}
				limits.max_texture_dimension_3d
			}
			TextureType::TextureCube => {
				if self.depth != 1 || self.width != self.height || self.array_layers % 6 != 0 {
					return creation("TextureCube must be square with a depth of 1 and a multiple of 6 array layers");
				}
				limits.max_texture_dimension_cube
			}
		};
		if self.width.max(self.height).max(self.depth) > max_dimension {
			return creation(format!("exceeds the maximum dimension of {max_dimension}").as_str());
		}
		if self.array_layers > limits.max_texture_array_layers {
			return creation(
				format!("exceeds the maximum of {} array layers", limits.max_texture_array_layers).as_str(),
			);
		}
		let full_chain = calculate_mip_levels(self.width, self.height, self.depth);
		if self.mip_levels > full_chain {
			return creation(format!("requested {} mip levels, at most {full_chain} possible", self.mip_levels).as_str());
		}
		if !matches!(self.sample_count, 1 | 2 | 4 | 8 | 16) {
			return creation(format!("unsupported sample count {}", self.sample_count).as_str());
		}

		if self.usage.is_empty() {
			return invalid("must declare at least one TextureUsage");
		}
		if self.usage.contains(TextureUsage::SWAPCHAIN) {
			return invalid("SWAPCHAIN usage is reserved for swap chain backbuffers");
		}
		if self.sample_count > 1 && (self.info().mip_levels != 1 || self.texture_type != TextureType::Texture2D) {
			return invalid("multisampled textures must be 2D without mip levels");
		}
		if self.format.is_depth_stencil() {
			if self.usage.intersects(TextureUsage::COLOR_ATTACHMENT | TextureUsage::STORAGE) {
				return invalid("depth stencil formats can not be used as COLOR_ATTACHMENT or STORAGE");
			}
		} else if self.usage.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT) {
			return invalid("DEPTH_STENCIL_ATTACHMENT requires a depth stencil format");
		}
		if self.format.is_compressed()
			&& self.usage.intersects(TextureUsage::COLOR_ATTACHMENT | TextureUsage::STORAGE)
		{
			return invalid("compressed formats can only be sampled and copied");
		}
		Ok(())
	}
}

/// The description of a created texture. All queries are pure and never fail.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TextureInfo {
	pub texture_type: TextureType,
	pub format: PixelFormat,
	pub usage: TextureUsage,
	pub width: u32,
	pub height: u32,
	pub depth: u32,
	pub mip_levels: u32,
	pub array_layers: u32,
	pub sample_count: u32,
}

impl TextureInfo {
	pub fn width(&self, mip_level: u32) -> u32 {
		mip_size(self.width, mip_level, self.mip_levels)
	}

	pub fn height(&self, mip_level: u32) -> u32 {
		mip_size(self.height, mip_level, self.mip_levels)
	}

	pub fn depth(&self, mip_level: u32) -> u32 {
		match self.texture_type {
			TextureType::Texture3D => mip_size(self.depth, mip_level, self.mip_levels),
			_ => (mip_level < self.mip_levels) as u32,
		}
	}

	/// Index of a subresource in mip-major order, computed in 64 bits so any mip level and array layer is accepted.
	pub fn subresource_index(&self, mip_level: u32, array_layer: u32) -> u64 {
		mip_level as u64 + array_layer as u64 * self.mip_levels as u64
	}

	pub fn subresource_count(&self) -> u32 {
		self.mip_levels * self.array_layers
	}

	/// Tightly packed size of one array layer of `mip_level`, 0 if the mip level does not exist.
	pub fn mip_level_size_in_bytes(&self, mip_level: u32) -> u64 {
		self.format
			.region_size_in_bytes(self.width(mip_level), self.height(mip_level))
			* self.depth(mip_level) as u64
	}
}

pub struct Texture<P: Platform>(RefPtr<TextureInner<P>>);
assert_impl_all!(Texture<crate::platform::null::Null>: Send, Sync);

pub struct TextureInner<P: Platform> {
	device: WeakGraphicsDevice<P>,
	native: ManuallyDrop<P::Texture>,
	info: TextureInfo,
	name: Mutex<String>,
}

impl<P: Platform> Clone for Texture<P> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<P: Platform> Deref for Texture<P> {
	type Target = TextureInner<P>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<P: Platform> Texture<P> {
	pub(crate) fn new(device: &GraphicsDevice<P>, native: P::Texture, info: TextureInfo, name: &str) -> Self {
		device.resource_created();
		Self(RefPtr::new(TextureInner {
			device: device.downgrade(),
			native: ManuallyDrop::new(native),
			info,
			name: Mutex::new(name.to_string()),
		}))
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		RefPtr::ptr_eq(&self.0, &other.0)
	}
}

impl<P: Platform> TextureInner<P> {
	pub fn info(&self) -> &TextureInfo {
		&self.info
	}

	pub fn texture_type(&self) -> TextureType {
		self.info.texture_type
	}

	pub fn format(&self) -> PixelFormat {
		self.info.format
	}

	pub fn usage(&self) -> TextureUsage {
		self.info.usage
	}

	pub fn width(&self, mip_level: u32) -> u32 {
		self.info.width(mip_level)
	}

	pub fn height(&self, mip_level: u32) -> u32 {
		self.info.height(mip_level)
	}

	pub fn depth(&self, mip_level: u32) -> u32 {
		self.info.depth(mip_level)
	}

	pub fn mip_levels(&self) -> u32 {
		self.info.mip_levels
	}

	pub fn array_layers(&self) -> u32 {
		self.info.array_layers
	}

	pub fn sample_count(&self) -> u32 {
		self.info.sample_count
	}

	pub fn subresource_index(&self, mip_level: u32, array_layer: u32) -> u64 {
		self.info.subresource_index(mip_level, array_layer)
	}

	pub fn is_backbuffer(&self) -> bool {
		self.info.usage.contains(TextureUsage::SWAPCHAIN)
	}

	pub fn native(&self) -> &P::Texture {
		&self.native
	}

	pub fn handle(&self) -> P::TextureHandle {
		P::texture_handle(&self.native)
	}
}

impl<P: Platform> GraphicsResource<P> for Texture<P> {
	fn device(&self) -> Option<GraphicsDevice<P>> {
		self.device.upgrade()
	}

	fn heap_type(&self) -> HeapType {
		HeapType::Default
	}

	fn name(&self) -> String {
		self.name.lock().clone()
	}

	fn set_name(&self, name: &str) {
		let mut guard = self.name.lock();
		if let Some(device) = self.device.upgrade() {
			unsafe { device.platform.set_debug_name(DebugObject::Texture(&*self.native), name) };
		}
		*guard = name.to_string();
	}
}

impl<P: Platform> Drop for TextureInner<P> {
	fn drop(&mut self) {
		if let Some(device) = self.device.upgrade() {
			unsafe {
				let native = ManuallyDrop::take(&mut self.native);
				device.platform.destroy_texture(native);
			}
			device.resource_destroyed();
		}
	}
}

impl<P: Platform> Debug for Texture<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Texture")
			.field("name", &self.name())
			.field("info", &self.info)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::GraphicsErrorKind;

	fn color_desc(width: u32, height: u32, mip_levels: u32) -> TextureDesc<'static> {
		TextureDesc {
			name: "color",
			format: PixelFormat::RGBA8Unorm,
			usage: TextureUsage::SAMPLED | TextureUsage::COLOR_ATTACHMENT,
			width,
			height,
			mip_levels,
			..TextureDesc::default()
		}
	}

	fn kind(desc: TextureDesc) -> Option<GraphicsErrorKind> {
		desc.validate(&GraphicsDeviceLimits::MINIMUM).err().map(|e| e.kind())
	}

	#[test]
	fn test_mip_width() -> anyhow::Result<()> {
		let info = color_desc(256, 256, 4).info();
		assert_eq!(info.width(0), 256);
		assert_eq!(info.width(1), 128);
		assert_eq!(info.width(3), 32);
		assert_eq!(info.width(4), 0);
		assert_eq!(info.width(100), 0);
		Ok(())
	}

	#[test]
	fn test_mip_size_clamps_to_one() -> anyhow::Result<()> {
		let info = color_desc(256, 16, 0).info();
		assert_eq!(info.mip_levels, 9);
		for mip in 0..info.mip_levels {
			assert_eq!(info.width(mip), (256 >> mip).max(1));
			assert_eq!(info.height(mip), (16 >> mip).max(1));
			assert_eq!(info.depth(mip), 1);
		}
		assert_eq!(info.height(8), 1);
		assert_eq!(info.height(9), 0);
		assert_eq!(info.depth(9), 0);
		Ok(())
	}

	#[test]
	fn test_calculate_mip_levels() -> anyhow::Result<()> {
		assert_eq!(calculate_mip_levels(1, 1, 1), 1);
		assert_eq!(calculate_mip_levels(256, 256, 1), 9);
		assert_eq!(calculate_mip_levels(800, 600, 1), 10);
		assert_eq!(calculate_mip_levels(4, 4, 64), 7);
		Ok(())
	}

	#[test]
	fn test_3d_depth_mips() -> anyhow::Result<()> {
		let info = TextureDesc {
			texture_type: TextureType::Texture3D,
			depth: 32,
			..color_desc(64, 64, 0)
		}
		.info();
		assert_eq!(info.mip_levels, 7);
		assert_eq!(info.depth(2), 8);
		assert_eq!(info.depth(6), 1);
		assert_eq!(info.depth(7), 0);
		Ok(())
	}

	#[test]
	fn test_subresource_index() -> anyhow::Result<()> {
		let info = TextureDesc {
			array_layers: 6,
			..color_desc(64, 64, 4)
		}
		.info();
		assert_eq!(info.subresource_index(0, 0), 0);
		assert_eq!(info.subresource_index(3, 0), 3);
		assert_eq!(info.subresource_index(1, 2), 9);
		assert_eq!(info.subresource_count(), 24);
		assert_eq!(info.subresource_index(0, u32::MAX), u32::MAX as u64 * 4);
		assert_eq!(info.subresource_index(u32::MAX, u32::MAX), u32::MAX as u64 * 5);
		Ok(())
	}

	#[test]
	fn test_mip_level_size_in_bytes() -> anyhow::Result<()> {
		let info = color_desc(256, 256, 4).info();
		assert_eq!(info.mip_level_size_in_bytes(0), 256 * 256 * 4);
		assert_eq!(info.mip_level_size_in_bytes(3), 32 * 32 * 4);
		assert_eq!(info.mip_level_size_in_bytes(4), 0);
		Ok(())
	}

	#[test]
	fn test_validation() -> anyhow::Result<()> {
		color_desc(256, 256, 0).validate(&GraphicsDeviceLimits::MINIMUM)?;
		assert_eq!(kind(color_desc(0, 256, 1)), Some(GraphicsErrorKind::ResourceCreation));
		assert_eq!(kind(color_desc(256, 256, 10)), Some(GraphicsErrorKind::ResourceCreation));
		assert_eq!(kind(color_desc(100_000, 1, 1)), Some(GraphicsErrorKind::ResourceCreation));
		assert_eq!(
			kind(TextureDesc {
				format: PixelFormat::Undefined,
				..color_desc(4, 4, 1)
			}),
			Some(GraphicsErrorKind::ResourceCreation)
		);
		assert_eq!(
			kind(TextureDesc {
				format: PixelFormat::Depth32Float,
				..color_desc(4, 4, 1)
			}),
			Some(GraphicsErrorKind::InvalidUsage)
		);
		assert_eq!(
			kind(TextureDesc {
				usage: TextureUsage::SWAPCHAIN,
				..color_desc(4, 4, 1)
			}),
			Some(GraphicsErrorKind::InvalidUsage)
		);
		assert_eq!(
			kind(TextureDesc {
				usage: TextureUsage::DEPTH_STENCIL_ATTACHMENT,
				..color_desc(4, 4, 1)
			}),
			Some(GraphicsErrorKind::InvalidUsage)
		);
		assert_eq!(
			kind(TextureDesc {
				texture_type: TextureType::TextureCube,
				array_layers: 4,
				..color_desc(4, 4, 1)
			}),
			Some(GraphicsErrorKind::ResourceCreation)
		);
		Ok(())
	}
}
