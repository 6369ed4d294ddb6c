/// How the channels of a [`PixelFormat`] are interpreted.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PixelFormatType {
	Unknown,
	Float,
	Unorm,
	UnormSrgb,
	Snorm,
	Uint,
	Sint,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FormatBlock {
	pub width: u32,
	pub height: u32,
	pub bytes: u32,
}

impl FormatBlock {
	const PIXEL_1: Self = Self::pixel(1);
	const PIXEL_2: Self = Self::pixel(2);
	const PIXEL_4: Self = Self::pixel(4);
	const PIXEL_8: Self = Self::pixel(8);
	const PIXEL_16: Self = Self::pixel(16);
	const BC_8: Self = Self::bc(8);
	const BC_16: Self = Self::bc(16);

	const fn pixel(bytes: u32) -> Self {
		Self {
			width: 1,
			height: 1,
			bytes,
		}
	}

	const fn bc(bytes: u32) -> Self {
		Self {
			width: 4,
			height: 4,
			bytes,
		}
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PixelFormatInfo {
	pub name: &'static str,
	pub ty: PixelFormatType,
	pub bits_per_pixel: u32,
	pub block: FormatBlock,
	pub depth_bits: u32,
	pub stencil_bits: u32,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum PixelFormat {
	#[default]
	Undefined,
	// 8-bit
	R8Unorm,
	R8Snorm,
	R8Uint,
	R8Sint,
	// 16-bit
	R16Unorm,
	R16Snorm,
	R16Uint,
	R16Sint,
	R16Float,
	RG8Unorm,
	RG8Snorm,
	RG8Uint,
	RG8Sint,
	// 32-bit
	R32Uint,
	R32Sint,
	R32Float,
	RG16Unorm,
	RG16Snorm,
	RG16Uint,
	RG16Sint,
	RG16Float,
	RGBA8Unorm,
	RGBA8UnormSrgb,
	RGBA8Snorm,
	RGBA8Uint,
	RGBA8Sint,
	BGRA8Unorm,
	BGRA8UnormSrgb,
	// packed 32-bit
	RGB10A2Unorm,
	RG11B10Float,
	RGB9E5Float,
	// 64-bit
	RG32Uint,
	RG32Sint,
	RG32Float,
	RGBA16Unorm,
	RGBA16Snorm,
	RGBA16Uint,
	RGBA16Sint,
	RGBA16Float,
	// 128-bit
	RGBA32Uint,
	RGBA32Sint,
	RGBA32Float,
	// depth stencil
	Depth16Unorm,
	Depth32Float,
	Depth24UnormStencil8,
	// block compressed
	BC1RGBAUnorm,
	BC1RGBAUnormSrgb,
	BC2RGBAUnorm,
	BC2RGBAUnormSrgb,
	BC3RGBAUnorm,
	BC3RGBAUnormSrgb,
	BC4RUnorm,
	BC4RSnorm,
	BC5RGUnorm,
	BC5RGSnorm,
	BC6HRGBUfloat,
	BC6HRGBFloat,
	BC7RGBAUnorm,
	BC7RGBAUnormSrgb,
}

impl PixelFormat {
	pub const fn info(self) -> PixelFormatInfo {
		use PixelFormat::*;
		use PixelFormatType as T;

		const fn color(name: &'static str, ty: PixelFormatType, bits_per_pixel: u32, block: FormatBlock) -> PixelFormatInfo {
			PixelFormatInfo {
				name,
				ty,
				bits_per_pixel,
				block,
				depth_bits: 0,
				stencil_bits: 0,
			}
		}

		const fn depth(name: &'static str, ty: PixelFormatType, depth_bits: u32, stencil_bits: u32) -> PixelFormatInfo {
			let bits_per_pixel = if depth_bits + stencil_bits > 16 { 32 } else { 16 };
			PixelFormatInfo {
				name,
				ty,
				bits_per_pixel,
				block: FormatBlock::pixel(bits_per_pixel / 8),
				depth_bits,
				stencil_bits,
			}
		}

		match self {
			Undefined => PixelFormatInfo {
				name: "Undefined",
				ty: T::Unknown,
				bits_per_pixel: 0,
				block: FormatBlock::pixel(0),
				depth_bits: 0,
				stencil_bits: 0,
			},
			R8Unorm => color("R8Unorm", T::Unorm, 8, FormatBlock::PIXEL_1),
			R8Snorm => color("R8Snorm", T::Snorm, 8, FormatBlock::PIXEL_1),
			R8Uint => color("R8Uint", T::Uint, 8, FormatBlock::PIXEL_1),
			R8Sint => color("R8Sint", T::Sint, 8, FormatBlock::PIXEL_1),
			R16Unorm => color("R16Unorm", T::Unorm, 16, FormatBlock::PIXEL_2),
			R16Snorm => color("R16Snorm", T::Snorm, 16, FormatBlock::PIXEL_2),
			R16Uint => color("R16Uint", T::Uint, 16, FormatBlock::PIXEL_2),
			R16Sint => color("R16Sint", T::Sint, 16, FormatBlock::PIXEL_2),
			R16Float => color("R16Float", T::Float, 16, FormatBlock::PIXEL_2),
			RG8Unorm => color("RG8Unorm", T::Unorm, 16, FormatBlock::PIXEL_2),
			RG8Snorm => color("RG8Snorm", T::Snorm, 16, FormatBlock::PIXEL_2),
			RG8Uint => color("RG8Uint", T::Uint, 16, FormatBlock::PIXEL_2),
			RG8Sint => color("RG8Sint", T::Sint, 16, FormatBlock::PIXEL_2),
			R32Uint => color("R32Uint", T::Uint, 32, FormatBlock::PIXEL_4),
			R32Sint => color("R32Sint", T::Sint, 32, FormatBlock::PIXEL_4),
			R32Float => color("R32Float", T::Float, 32, FormatBlock::PIXEL_4),
			RG16Unorm => color("RG16Unorm", T::Unorm, 32, FormatBlock::PIXEL_4),
			RG16Snorm => color("RG16Snorm", T::Snorm, 32, FormatBlock::PIXEL_4),
			RG16Uint => color("RG16Uint", T::Uint, 32, FormatBlock::PIXEL_4),
			RG16Sint => color("RG16Sint", T::Sint, 32, FormatBlock::PIXEL_4),
			RG16Float => color("RG16Float", T::Float, 32, FormatBlock::PIXEL_4),
			RGBA8Unorm => color("RGBA8Unorm", T::Unorm, 32, FormatBlock::PIXEL_4),
			RGBA8UnormSrgb => color("RGBA8UnormSrgb", T::UnormSrgb, 32, FormatBlock::PIXEL_4),
			RGBA8Snorm => color("RGBA8Snorm", T::Snorm, 32, FormatBlock::PIXEL_4),
			RGBA8Uint => color("RGBA8Uint", T::Uint, 32, FormatBlock::PIXEL_4),
			RGBA8Sint => color("RGBA8Sint", T::Sint, 32, FormatBlock::PIXEL_4),
			BGRA8Unorm => color("BGRA8Unorm", T::Unorm, 32, FormatBlock::PIXEL_4),
			BGRA8UnormSrgb => color("BGRA8UnormSrgb", T::UnormSrgb, 32, FormatBlock::PIXEL_4),
			RGB10A2Unorm => color("RGB10A2Unorm", T::Unorm, 32, FormatBlock::PIXEL_4),
			RG11B10Float => color("RG11B10Float", T::Float, 32, FormatBlock::PIXEL_4),
			RGB9E5Float => color("RGB9E5Float", T::Float, 32, FormatBlock::PIXEL_4),
			RG32Uint => color("RG32Uint", T::Uint, 64, FormatBlock::PIXEL_8),
			RG32Sint => color("RG32Sint", T::Sint, 64, FormatBlock::PIXEL_8),
			RG32Float => color("RG32Float", T::Float, 64, FormatBlock::PIXEL_8),
			RGBA16Unorm => color("RGBA16Unorm", T::Unorm, 64, FormatBlock::PIXEL_8),
			RGBA16Snorm => color("RGBA16Snorm", T::Snorm, 64, FormatBlock::PIXEL_8),
			RGBA16Uint => color("RGBA16Uint", T::Uint, 64, FormatBlock::PIXEL_8),
			RGBA16Sint => color("RGBA16Sint", T::Sint, 64, FormatBlock::PIXEL_8),
			RGBA16Float => color("RGBA16Float", T::Float, 64, FormatBlock::PIXEL_8),
			RGBA32Uint => color("RGBA32Uint", T::Uint, 128, FormatBlock::PIXEL_16),
			RGBA32Sint => color("RGBA32Sint", T::Sint, 128, FormatBlock::PIXEL_16),
			RGBA32Float => color("RGBA32Float", T::Float, 128, FormatBlock::PIXEL_16),
			Depth16Unorm => depth("Depth16Unorm", T::Unorm, 16, 0),
			Depth32Float => depth("Depth32Float", T::Float, 32, 0),
			Depth24UnormStencil8 => depth("Depth24UnormStencil8", T::Unorm, 24, 8),
			BC1RGBAUnorm => color("BC1RGBAUnorm", T::Unorm, 4, FormatBlock::BC_8),
			BC1RGBAUnormSrgb => color("BC1RGBAUnormSrgb", T::UnormSrgb, 4, FormatBlock::BC_8),
			BC2RGBAUnorm => color("BC2RGBAUnorm", T::Unorm, 8, FormatBlock::BC_16),
			BC2RGBAUnormSrgb => color("BC2RGBAUnormSrgb", T::UnormSrgb, 8, FormatBlock::BC_16),
			BC3RGBAUnorm => color("BC3RGBAUnorm", T::Unorm, 8, FormatBlock::BC_16),
			BC3RGBAUnormSrgb => color("BC3RGBAUnormSrgb", T::UnormSrgb, 8, FormatBlock::BC_16),
			BC4RUnorm => color("BC4RUnorm", T::Unorm, 4, FormatBlock::BC_8),
			BC4RSnorm => color("BC4RSnorm", T::Snorm, 4, FormatBlock::BC_8),
			BC5RGUnorm => color("BC5RGUnorm", T::Unorm, 8, FormatBlock::BC_16),
			BC5RGSnorm => color("BC5RGSnorm", T::Snorm, 8, FormatBlock::BC_16),
			BC6HRGBUfloat => color("BC6HRGBUfloat", T::Float, 8, FormatBlock::BC_16),
			BC6HRGBFloat => color("BC6HRGBFloat", T::Float, 8, FormatBlock::BC_16),
			BC7RGBAUnorm => color("BC7RGBAUnorm", T::Unorm, 8, FormatBlock::BC_16),
			BC7RGBAUnormSrgb => color("BC7RGBAUnormSrgb", T::UnormSrgb, 8, FormatBlock::BC_16),
		}
	}

	#[inline]
	pub const fn is_undefined(self) -> bool {
		matches!(self, PixelFormat::Undefined)
	}

	#[inline]
	pub const fn name(self) -> &'static str {
		self.info().name
	}

	#[inline]
	pub const fn format_type(self) -> PixelFormatType {
		self.info().ty
	}

	#[inline]
	pub const fn bits_per_pixel(self) -> u32 {
		self.info().bits_per_pixel
	}

	#[inline]
	pub const fn block(self) -> FormatBlock {
		self.info().block
	}

	#[inline]
	pub const fn is_depth(self) -> bool {
		self.info().depth_bits > 0
	}

	#[inline]
	pub const fn is_stencil(self) -> bool {
		self.info().stencil_bits > 0
	}

	#[inline]
	pub const fn is_depth_stencil(self) -> bool {
		self.is_depth() || self.is_stencil()
	}

	#[inline]
	pub const fn is_compressed(self) -> bool {
		self.info().block.width > 1
	}

	#[inline]
	pub const fn is_srgb(self) -> bool {
		matches!(self.info().ty, PixelFormatType::UnormSrgb)
	}

	pub const fn srgb_to_linear(self) -> PixelFormat {
		use PixelFormat::*;
		match self {
			BC1RGBAUnormSrgb => BC1RGBAUnorm,
			BC2RGBAUnormSrgb => BC2RGBAUnorm,
			BC3RGBAUnormSrgb => BC3RGBAUnorm,
			BGRA8UnormSrgb => BGRA8Unorm,
			RGBA8UnormSrgb => RGBA8Unorm,
			BC7RGBAUnormSrgb => BC7RGBAUnorm,
			other => other,
		}
	}

	pub const fn linear_to_srgb(self) -> PixelFormat {
		use PixelFormat::*;
		match self {
			BC1RGBAUnorm => BC1RGBAUnormSrgb,
			BC2RGBAUnorm => BC2RGBAUnormSrgb,
			BC3RGBAUnorm => BC3RGBAUnormSrgb,
			BGRA8Unorm => BGRA8UnormSrgb,
			RGBA8Unorm => RGBA8UnormSrgb,
			BC7RGBAUnorm => BC7RGBAUnormSrgb,
			other => other,
		}
	}

	/// Bytes of a tightly packed region of `width` x `height` texels, rounding up to whole compression blocks.
	pub const fn region_size_in_bytes(self, width: u32, height: u32) -> u64 {
		let block = self.block();
		if block.bytes == 0 {
			return 0;
		}
		let blocks_x = width.div_ceil(block.width) as u64;
		let blocks_y = height.div_ceil(block.height) as u64;
		blocks_x * blocks_y * block.bytes as u64
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_depth_stencil_classification() -> anyhow::Result<()> {
		assert!(PixelFormat::Depth32Float.is_depth());
		assert!(!PixelFormat::Depth32Float.is_stencil());
		assert!(PixelFormat::Depth24UnormStencil8.is_depth_stencil());
		assert!(PixelFormat::Depth24UnormStencil8.is_stencil());
		assert_eq!(PixelFormat::Depth24UnormStencil8.bits_per_pixel(), 32);
		assert_eq!(PixelFormat::Depth16Unorm.block().bytes, 2);
		assert!(!PixelFormat::BGRA8Unorm.is_depth_stencil());
		Ok(())
	}

	#[test]
	fn test_srgb_conversions() -> anyhow::Result<()> {
		assert!(PixelFormat::BGRA8UnormSrgb.is_srgb());
		assert_eq!(PixelFormat::BGRA8UnormSrgb.srgb_to_linear(), PixelFormat::BGRA8Unorm);
		assert_eq!(PixelFormat::BC7RGBAUnorm.linear_to_srgb(), PixelFormat::BC7RGBAUnormSrgb);
		assert_eq!(PixelFormat::R32Float.linear_to_srgb(), PixelFormat::R32Float);
		Ok(())
	}

	#[test]
	fn test_region_size() -> anyhow::Result<()> {
		assert!(PixelFormat::BC1RGBAUnorm.is_compressed());
		assert!(!PixelFormat::RGBA8Unorm.is_compressed());
		assert_eq!(PixelFormat::RGBA8Unorm.region_size_in_bytes(4, 4), 64);
		// partial blocks round up
		assert_eq!(PixelFormat::BC1RGBAUnorm.region_size_in_bytes(5, 4), 16);
		assert_eq!(PixelFormat::BC7RGBAUnorm.region_size_in_bytes(4, 4), 16);
		assert_eq!(PixelFormat::Undefined.region_size_in_bytes(4, 4), 0);
		Ok(())
	}
}
