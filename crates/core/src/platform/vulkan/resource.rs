use crate::format::PixelFormat;
use crate::platform::vulkan::{sample_count_to_ash, Vulkan, VulkanError};
use crate::resource::{BufferDesc, TextureDesc};
use ash::vk::{
	BufferCreateInfo, ComponentMapping, Extent3D, Format, ImageAspectFlags, ImageCreateInfo, ImageLayout,
	ImageSubresourceRange, ImageTiling, ImageView, ImageViewCreateInfo, ImageViewType, SharingMode,
};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use log::warn;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct VulkanBuffer {
	pub buffer: ash::vk::Buffer,
	pub allocation: Allocation,
	pub size: u64,
}

impl VulkanBuffer {
	pub unsafe fn new(vulkan: &Vulkan, desc: &BufferDesc) -> Result<Self, VulkanError> {
		unsafe {
			let buffer = vulkan.device.create_buffer(
				&BufferCreateInfo::default()
					.usage(desc.usage.to_ash_buffer_usage_flags())
					.size(desc.size)
					.sharing_mode(SharingMode::EXCLUSIVE),
				None,
			)?;
			let requirements = vulkan.device.get_buffer_memory_requirements(buffer);
			let allocation = match vulkan.memory_allocator().allocate(&AllocationCreateDesc {
				requirements,
				name: desc.name,
				location: desc.heap_type().to_gpu_allocator_memory_location(),
				allocation_scheme: AllocationScheme::GpuAllocatorManaged,
				linear: true,
			}) {
				Ok(allocation) => allocation,
				Err(e) => {
					vulkan.device.destroy_buffer(buffer, None);
					return Err(e.into());
				}
			};
			if let Err(e) = vulkan
				.device
				.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
			{
				free_allocation(vulkan, allocation);
				vulkan.device.destroy_buffer(buffer, None);
				return Err(e.into());
			}
			Ok(Self {
				buffer,
				allocation,
				size: desc.size,
			})
		}
	}

	fn mapped_ptr(&self) -> Result<*mut u8, VulkanError> {
		self.allocation
			.mapped_ptr()
			.map(|ptr| ptr.as_ptr().cast::<u8>())
			.ok_or(VulkanError::Vk(ash::vk::Result::ERROR_MEMORY_MAP_FAILED))
	}

	/// # Safety
	/// `offset + data.len()` must be within the buffer and the GPU must not access the range concurrently.
	pub unsafe fn write(&self, offset: u64, data: &[u8]) -> Result<(), VulkanError> {
		unsafe {
			let ptr = self.mapped_ptr()?;
			std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset as usize), data.len());
			Ok(())
		}
	}

	/// # Safety
	/// `offset + out.len()` must be within the buffer and the GPU must not access the range concurrently.
	pub unsafe fn read(&self, offset: u64, out: &mut [u8]) -> Result<(), VulkanError> {
		unsafe {
			let ptr = self.mapped_ptr()?;
			std::ptr::copy_nonoverlapping(ptr.add(offset as usize).cast_const(), out.as_mut_ptr(), out.len());
			Ok(())
		}
	}

	pub unsafe fn destroy(self, vulkan: &Vulkan) {
		unsafe {
			free_allocation(vulkan, self.allocation);
			vulkan.device.destroy_buffer(self.buffer, None);
		}
	}
}

fn free_allocation(vulkan: &Vulkan, allocation: Allocation) {
	if let Err(e) = vulkan.memory_allocator().free(allocation) {
		warn!("Failed to free allocation: {}", e);
	}
}

pub struct VulkanTexture {
	pub image: ash::vk::Image,
	/// `None` for images owned by a swapchain
	pub allocation: Option<Allocation>,
	pub format: Format,
	pub aspect: ImageAspectFlags,
	pub extent: Extent3D,
	pub mip_levels: u32,
	pub array_layers: u32,
	/// The layout the image is left in between render passes.
	pub resting_layout: ImageLayout,
	/// One view per subresource if the texture is an attachment, indexed by [`Self::subresource_index`].
	attachment_views: SmallVec<[ImageView; 1]>,
	/// Whether a subresource holds defined contents, so that loading it must preserve them.
	pub initialized: SubresourceStates,
}

/// Per subresource flags shared between a texture and the command buffers that change them.
#[derive(Clone)]
pub struct SubresourceStates(Arc<[AtomicBool]>);

impl SubresourceStates {
	pub fn new(count: u32) -> Self {
		Self((0..count).map(|_| AtomicBool::new(false)).collect())
	}

	pub fn get(&self, index: usize) -> bool {
		self.0[index].load(Ordering::Acquire)
	}

	pub fn set(&self, index: usize, value: bool) {
		self.0[index].store(value, Ordering::Release)
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl VulkanTexture {
	pub unsafe fn new(vulkan: &Vulkan, desc: &TextureDesc) -> Result<Self, VulkanError> {
		unsafe {
			let info = desc.info();
			let format = info.format.to_ash_format();
			let extent = Extent3D {
				width: info.width,
				height: info.height,
				depth: info.depth,
			};
			let image = match vulkan.device.create_image(
				&ImageCreateInfo::default()
					.flags(info.texture_type.to_ash_image_create_flags())
					.image_type(info.texture_type.to_ash_image_type())
					.format(format)
					.extent(extent)
					.mip_levels(info.mip_levels)
					.array_layers(info.array_layers)
					.samples(sample_count_to_ash(info.sample_count))
					.tiling(ImageTiling::OPTIMAL)
					.usage(info.usage.to_ash_image_usage_flags())
					.sharing_mode(SharingMode::EXCLUSIVE)
					.initial_layout(ImageLayout::UNDEFINED),
				None,
			) {
				Ok(image) => image,
				Err(ash::vk::Result::ERROR_FORMAT_NOT_SUPPORTED) => {
					return Err(VulkanError::UnsupportedFormat(info.format))
				}
				Err(e) => return Err(e.into()),
			};
			let requirements = vulkan.device.get_image_memory_requirements(image);
			let allocation = match vulkan.memory_allocator().allocate(&AllocationCreateDesc {
				requirements,
				name: desc.name,
				location: MemoryLocation::GpuOnly,
				allocation_scheme: AllocationScheme::GpuAllocatorManaged,
				linear: false,
			}) {
				Ok(allocation) => allocation,
				Err(e) => {
					vulkan.device.destroy_image(image, None);
					return Err(e.into());
				}
			};
			if let Err(e) = vulkan
				.device
				.bind_image_memory(image, allocation.memory(), allocation.offset())
			{
				free_allocation(vulkan, allocation);
				vulkan.device.destroy_image(image, None);
				return Err(e.into());
			}

			let mut texture = Self {
				image,
				allocation: Some(allocation),
				format,
				aspect: info.format.to_ash_aspect(),
				extent,
				mip_levels: info.mip_levels,
				array_layers: info.array_layers,
				resting_layout: ImageLayout::GENERAL,
				attachment_views: SmallVec::new(),
				initialized: SubresourceStates::new(info.mip_levels * info.array_layers),
			};
			if info.usage.is_attachment() {
				let view_type = info.texture_type.to_ash_attachment_view_type();
				if let Err(e) = texture.create_attachment_views(vulkan, view_type) {
					texture.destroy(vulkan);
					return Err(e);
				}
			}
			Ok(texture)
		}
	}

	/// Wrap an image owned by a swapchain, which is rested in [`ImageLayout::PRESENT_SRC_KHR`].
	pub unsafe fn from_swapchain_image(
		vulkan: &Vulkan,
		image: ash::vk::Image,
		format: PixelFormat,
		width: u32,
		height: u32,
	) -> Result<Self, VulkanError> {
		unsafe {
			let mut texture = Self {
				image,
				allocation: None,
				format: format.to_ash_format(),
				aspect: ImageAspectFlags::COLOR,
				extent: Extent3D { width, height, depth: 1 },
				mip_levels: 1,
				array_layers: 1,
				resting_layout: ImageLayout::PRESENT_SRC_KHR,
				attachment_views: SmallVec::new(),
				initialized: SubresourceStates::new(1),
			};
			texture.create_attachment_views(vulkan, ImageViewType::TYPE_2D)?;
			Ok(texture)
		}
	}

	unsafe fn create_attachment_views(&mut self, vulkan: &Vulkan, view_type: ImageViewType) -> Result<(), VulkanError> {
		unsafe {
			for array_layer in 0..self.array_layers {
				for mip_level in 0..self.mip_levels {
					let view = vulkan.device.create_image_view(
						&ImageViewCreateInfo::default()
							.image(self.image)
							.view_type(view_type)
							.format(self.format)
							.components(ComponentMapping::default())
							.subresource_range(self.subresource_range(mip_level, array_layer)),
						None,
					)?;
					self.attachment_views.push(view);
				}
			}
			Ok(())
		}
	}

	pub fn subresource_index(&self, mip_level: u32, array_layer: u32) -> usize {
		mip_level as usize + array_layer as usize * self.mip_levels as usize
	}

	pub fn subresource_range(&self, mip_level: u32, array_layer: u32) -> ImageSubresourceRange {
		ImageSubresourceRange {
			aspect_mask: self.aspect,
			base_mip_level: mip_level,
			level_count: 1,
			base_array_layer: array_layer,
			layer_count: 1,
		}
	}

	/// The view of a single subresource, only available on textures with attachment usage.
	pub fn attachment_view(&self, mip_level: u32, array_layer: u32) -> Option<ImageView> {
		self.attachment_views
			.get(self.subresource_index(mip_level, array_layer))
			.copied()
	}

	/// Whether a subresource holds defined contents as of the last submitted command buffer writing it.
	pub fn is_initialized(&self, mip_level: u32, array_layer: u32) -> bool {
		self.initialized.get(self.subresource_index(mip_level, array_layer))
	}

	pub fn is_swapchain_image(&self) -> bool {
		self.allocation.is_none()
	}

	pub unsafe fn destroy(self, vulkan: &Vulkan) {
		unsafe {
			for view in &self.attachment_views {
				vulkan.device.destroy_image_view(*view, None);
			}
			if let Some(allocation) = self.allocation {
				free_allocation(vulkan, allocation);
				vulkan.device.destroy_image(self.image, None);
			}
		}
	}
}
