use crate::command::{Color, LoadAction, StoreAction};
use crate::format::PixelFormat;
use crate::resource::{BufferUsage, HeapType, PresentMode, TextureType, TextureUsage};
use ash::vk::{
	AttachmentLoadOp, AttachmentStoreOp, BufferUsageFlags, ClearColorValue, Format, ImageAspectFlags, ImageCreateFlags,
	ImageType, ImageUsageFlags, ImageViewType, PresentModeKHR, SampleCountFlags,
};
use gpu_allocator::MemoryLocation;

impl PixelFormat {
	pub fn to_ash_format(&self) -> Format {
		use PixelFormat::*;
		match self {
			Undefined => Format::UNDEFINED,
			R8Unorm => Format::R8_UNORM,
			R8Snorm => Format::R8_SNORM,
			R8Uint => Format::R8_UINT,
			R8Sint => Format::R8_SINT,
			R16Unorm => Format::R16_UNORM,
			R16Snorm => Format::R16_SNORM,
			R16Uint => Format::R16_UINT,
			R16Sint => Format::R16_SINT,
			R16Float => Format::R16_SFLOAT,
			RG8Unorm => Format::R8G8_UNORM,
			RG8Snorm => Format::R8G8_SNORM,
			RG8Uint => Format::R8G8_UINT,
			RG8Sint => Format::R8G8_SINT,
			R32Uint => Format::R32_UINT,
			R32Sint => Format::R32_SINT,
			R32Float => Format::R32_SFLOAT,
			RG16Unorm => Format::R16G16_UNORM,
			RG16Snorm => Format::R16G16_SNORM,
			RG16Uint => Format::R16G16_UINT,
			RG16Sint => Format::R16G16_SINT,
			RG16Float => Format::R16G16_SFLOAT,
			RGBA8Unorm => Format::R8G8B8A8_UNORM,
			RGBA8UnormSrgb => Format::R8G8B8A8_SRGB,
			RGBA8Snorm => Format::R8G8B8A8_SNORM,
			RGBA8Uint => Format::R8G8B8A8_UINT,
			RGBA8Sint => Format::R8G8B8A8_SINT,
			BGRA8Unorm => Format::B8G8R8A8_UNORM,
			BGRA8UnormSrgb => Format::B8G8R8A8_SRGB,
			RGB10A2Unorm => Format::A2B10G10R10_UNORM_PACK32,
			RG11B10Float => Format::B10G11R11_UFLOAT_PACK32,
			RGB9E5Float => Format::E5B9G9R9_UFLOAT_PACK32,
			RG32Uint => Format::R32G32_UINT,
			RG32Sint => Format::R32G32_SINT,
			RG32Float => Format::R32G32_SFLOAT,
			RGBA16Unorm => Format::R16G16B16A16_UNORM,
			RGBA16Snorm => Format::R16G16B16A16_SNORM,
			RGBA16Uint => Format::R16G16B16A16_UINT,
			RGBA16Sint => Format::R16G16B16A16_SINT,
			RGBA16Float => Format::R16G16B16A16_SFLOAT,
			RGBA32Uint => Format::R32G32B32A32_UINT,
			RGBA32Sint => Format::R32G32B32A32_SINT,
			RGBA32Float => Format::R32G32B32A32_SFLOAT,
			Depth16Unorm => Format::D16_UNORM,
			Depth32Float => Format::D32_SFLOAT,
			Depth24UnormStencil8 => Format::D24_UNORM_S8_UINT,
			BC1RGBAUnorm => Format::BC1_RGBA_UNORM_BLOCK,
			BC1RGBAUnormSrgb => Format::BC1_RGBA_SRGB_BLOCK,
			BC2RGBAUnorm => Format::BC2_UNORM_BLOCK,
			BC2RGBAUnormSrgb => Format::BC2_SRGB_BLOCK,
			BC3RGBAUnorm => Format::BC3_UNORM_BLOCK,
			BC3RGBAUnormSrgb => Format::BC3_SRGB_BLOCK,
			BC4RUnorm => Format::BC4_UNORM_BLOCK,
			BC4RSnorm => Format::BC4_SNORM_BLOCK,
			BC5RGUnorm => Format::BC5_UNORM_BLOCK,
			BC5RGSnorm => Format::BC5_SNORM_BLOCK,
			BC6HRGBUfloat => Format::BC6H_UFLOAT_BLOCK,
			BC6HRGBFloat => Format::BC6H_SFLOAT_BLOCK,
			BC7RGBAUnorm => Format::BC7_UNORM_BLOCK,
			BC7RGBAUnormSrgb => Format::BC7_SRGB_BLOCK,
		}
	}

	pub fn to_ash_aspect(&self) -> ImageAspectFlags {
		let mut out = ImageAspectFlags::empty();
		if self.is_depth() {
			out |= ImageAspectFlags::DEPTH;
		}
		if self.is_stencil() {
			out |= ImageAspectFlags::STENCIL;
		}
		if out.is_empty() {
			ImageAspectFlags::COLOR
		} else {
			out
		}
	}
}

impl BufferUsage {
	pub fn to_ash_buffer_usage_flags(&self) -> BufferUsageFlags {
		let mut out = BufferUsageFlags::empty();
		if self.contains(BufferUsage::COPY_SRC) {
			out |= BufferUsageFlags::TRANSFER_SRC;
		}
		if self.contains(BufferUsage::COPY_DST) {
			out |= BufferUsageFlags::TRANSFER_DST;
		}
		if self.contains(BufferUsage::INDEX) {
			out |= BufferUsageFlags::INDEX_BUFFER;
		}
		if self.contains(BufferUsage::VERTEX) {
			out |= BufferUsageFlags::VERTEX_BUFFER;
		}
		if self.contains(BufferUsage::UNIFORM) {
			out |= BufferUsageFlags::UNIFORM_BUFFER;
		}
		if self.contains(BufferUsage::STORAGE) {
			out |= BufferUsageFlags::STORAGE_BUFFER;
		}
		if self.contains(BufferUsage::INDIRECT) {
			out |= BufferUsageFlags::INDIRECT_BUFFER;
		}
		// empty flags are invalid in vulkan, reachable by a buffer that is only mappable
		if out.is_empty() {
			if self.contains(BufferUsage::MAP_READ) {
				BufferUsageFlags::TRANSFER_DST
			} else {
				BufferUsageFlags::TRANSFER_SRC
			}
		} else {
			out
		}
	}
}

impl HeapType {
	pub fn to_gpu_allocator_memory_location(&self) -> MemoryLocation {
		match self {
			HeapType::Default => MemoryLocation::GpuOnly,
			HeapType::Upload => MemoryLocation::CpuToGpu,
			HeapType::Readback => MemoryLocation::GpuToCpu,
		}
	}
}

impl TextureUsage {
	pub fn to_ash_image_usage_flags(&self) -> ImageUsageFlags {
		let mut out = ImageUsageFlags::empty();
		if self.contains(TextureUsage::COPY_SRC) {
			out |= ImageUsageFlags::TRANSFER_SRC;
		}
		if self.contains(TextureUsage::COPY_DST) {
			out |= ImageUsageFlags::TRANSFER_DST;
		}
		if self.contains(TextureUsage::SAMPLED) {
			out |= ImageUsageFlags::SAMPLED;
		}
		if self.contains(TextureUsage::STORAGE) {
			out |= ImageUsageFlags::STORAGE;
		}
		if self.contains(TextureUsage::COLOR_ATTACHMENT) {
			out |= ImageUsageFlags::COLOR_ATTACHMENT;
		}
		if self.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT) {
			out |= ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
		}
		out
	}
}

impl TextureType {
	pub fn to_ash_image_type(&self) -> ImageType {
		match self {
			TextureType::Texture1D => ImageType::TYPE_1D,
			TextureType::Texture2D | TextureType::TextureCube => ImageType::TYPE_2D,
			TextureType::Texture3D => ImageType::TYPE_3D,
		}
	}

	pub fn to_ash_image_create_flags(&self) -> ImageCreateFlags {
		match self {
			TextureType::TextureCube => ImageCreateFlags::CUBE_COMPATIBLE,
			_ => ImageCreateFlags::empty(),
		}
	}

	/// The view type of a single mip level and array layer, as used for attachments.
	pub fn to_ash_attachment_view_type(&self) -> ImageViewType {
		match self {
			TextureType::Texture1D => ImageViewType::TYPE_1D,
			TextureType::Texture2D | TextureType::TextureCube => ImageViewType::TYPE_2D,
			TextureType::Texture3D => ImageViewType::TYPE_3D,
		}
	}
}

pub fn sample_count_to_ash(sample_count: u32) -> SampleCountFlags {
	match sample_count {
		2 => SampleCountFlags::TYPE_2,
		4 => SampleCountFlags::TYPE_4,
		8 => SampleCountFlags::TYPE_8,
		16 => SampleCountFlags::TYPE_16,
		_ => SampleCountFlags::TYPE_1,
	}
}

impl LoadAction {
	pub fn to_ash_load_op(&self) -> AttachmentLoadOp {
		match self {
			LoadAction::Clear => AttachmentLoadOp::CLEAR,
			LoadAction::Load => AttachmentLoadOp::LOAD,
			LoadAction::Discard => AttachmentLoadOp::DONT_CARE,
		}
	}
}

impl StoreAction {
	pub fn to_ash_store_op(&self) -> AttachmentStoreOp {
		match self {
			StoreAction::Store => AttachmentStoreOp::STORE,
			StoreAction::Discard => AttachmentStoreOp::DONT_CARE,
		}
	}
}

impl PresentMode {
	pub fn to_ash_present_mode(&self) -> PresentModeKHR {
		match self {
			PresentMode::Immediate => PresentModeKHR::IMMEDIATE,
			PresentMode::Mailbox => PresentModeKHR::MAILBOX,
			PresentMode::Fifo => PresentModeKHR::FIFO,
		}
	}
}

impl Color {
	pub fn to_ash_clear_color(&self) -> ClearColorValue {
		ClearColorValue {
			float32: self.to_array(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_aspect() -> anyhow::Result<()> {
		assert_eq!(PixelFormat::BGRA8Unorm.to_ash_aspect(), ImageAspectFlags::COLOR);
		assert_eq!(PixelFormat::Depth32Float.to_ash_aspect(), ImageAspectFlags::DEPTH);
		assert_eq!(
			PixelFormat::Depth24UnormStencil8.to_ash_aspect(),
			ImageAspectFlags::DEPTH | ImageAspectFlags::STENCIL
		);
		Ok(())
	}

	#[test]
	fn test_mappable_buffer_usage_is_never_empty() -> anyhow::Result<()> {
		assert_eq!(
			BufferUsage::MAP_WRITE.to_ash_buffer_usage_flags(),
			BufferUsageFlags::TRANSFER_SRC
		);
		assert_eq!(
			BufferUsage::MAP_READ.to_ash_buffer_usage_flags(),
			BufferUsageFlags::TRANSFER_DST
		);
		assert_eq!(
			(BufferUsage::MAP_WRITE | BufferUsage::VERTEX).to_ash_buffer_usage_flags(),
			BufferUsageFlags::VERTEX_BUFFER
		);
		Ok(())
	}

	#[test]
	fn test_srgb_formats() -> anyhow::Result<()> {
		assert_eq!(PixelFormat::BGRA8UnormSrgb.to_ash_format(), Format::B8G8R8A8_SRGB);
		assert_eq!(
			PixelFormat::BGRA8Unorm.linear_to_srgb().to_ash_format(),
			Format::B8G8R8A8_SRGB
		);
		Ok(())
	}
}
