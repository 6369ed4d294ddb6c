use crate::format::PixelFormat;
use crate::platform::vulkan::{Vulkan, VulkanError, VulkanQueue, VulkanTexture};
use crate::platform::{PlatformPresent, SwapChainImages};
use crate::resource::{PresentMode, SwapChainDesc};
use ash::khr::{surface, swapchain};
use ash::vk::{
	ColorSpaceKHR, CompositeAlphaFlagsKHR, Extent2D, Fence, FenceCreateInfo, ImageUsageFlags, PresentInfoKHR,
	PresentModeKHR, Semaphore, SemaphoreCreateInfo, SemaphoreSubmitInfo, SharingMode, SubmitInfo2, SurfaceKHR,
	SwapchainCreateInfoKHR, SwapchainKHR,
};
use log::{debug, warn};
use smallvec::SmallVec;

pub struct VulkanSwapChain {
	pub surface: SurfaceKHR,
	pub swapchain: SwapchainKHR,
	format: PixelFormat,
	present_mode: PresentMode,
	requested_image_count: u32,
	pub extent: Extent2D,
	/// signaled by the graphics queue once all work rendering to the backbuffer has completed, one per image
	present_semaphores: SmallVec<[Semaphore; 3]>,
	acquire_fence: Fence,
	current: u32,
}

impl VulkanSwapChain {
	fn extensions(vulkan: &Vulkan) -> Result<(&surface::Instance, &swapchain::Device), VulkanError> {
		let extensions = vulkan.extensions();
		match (extensions.surface.as_ref(), extensions.swapchain.as_ref()) {
			(Some(surface), Some(swapchain)) => Ok((surface, swapchain)),
			_ => Err(VulkanError::SwapchainNotEnabled),
		}
	}

	pub unsafe fn new(
		vulkan: &Vulkan,
		queue: &VulkanQueue,
		desc: &SwapChainDesc,
	) -> Result<(Self, SwapChainImages<Vulkan>), VulkanError> {
		profiling::function_scope!();
		unsafe {
			let (surface_ext, _) = Self::extensions(vulkan)?;
			let target = desc.surface.ok_or(VulkanError::MissingSurface)?;
			let surface =
				ash_window::create_surface(&vulkan.entry, &vulkan.instance, target.display, target.window, None)?;
			let supported = surface_ext
				.get_physical_device_surface_support(vulkan.physical_device, queue.family_index(), surface)
				.unwrap_or(false);
			if !supported {
				surface_ext.destroy_surface(surface, None);
				return Err(VulkanError::SurfaceUnsupported);
			}
			let acquire_fence = match vulkan.device.create_fence(&FenceCreateInfo::default(), None) {
				Ok(fence) => fence,
				Err(e) => {
					surface_ext.destroy_surface(surface, None);
					return Err(e.into());
				}
			};

			let mut swap_chain = Self {
				surface,
				swapchain: SwapchainKHR::null(),
				format: desc.color_format,
				present_mode: desc.present_mode,
				requested_image_count: desc.backbuffer_count,
				extent: Extent2D::default(),
				present_semaphores: SmallVec::new(),
				acquire_fence,
				current: 0,
			};
			match swap_chain.create_swapchain(vulkan, desc.width, desc.height) {
				Ok(images) => Ok((swap_chain, images)),
				Err(e) => {
					swap_chain.destroy(vulkan);
					Err(e)
				}
			}
		}
	}

	/// (Re)create the swapchain, retiring the previous one if present.
	unsafe fn create_swapchain(
		&mut self,
		vulkan: &Vulkan,
		width: u32,
		height: u32,
	) -> Result<SwapChainImages<Vulkan>, VulkanError> {
		unsafe {
			let (surface_ext, swapchain_ext) = Self::extensions(vulkan)?;
			let caps = surface_ext.get_physical_device_surface_capabilities(vulkan.physical_device, self.surface)?;

			let format = self.format.to_ash_format();
			let surface_format = surface_ext
				.get_physical_device_surface_formats(vulkan.physical_device, self.surface)?
				.into_iter()
				.find(|f| f.format == format && f.color_space == ColorSpaceKHR::SRGB_NONLINEAR)
				.ok_or(VulkanError::UnsupportedFormat(self.format))?;

			let requested_mode = self.present_mode.to_ash_present_mode();
			let present_mode = if surface_ext
				.get_physical_device_surface_present_modes(vulkan.physical_device, self.surface)?
				.contains(&requested_mode)
			{
				requested_mode
			} else {
				debug!("{:?} unsupported by surface, falling back to Fifo", self.present_mode);
				PresentModeKHR::FIFO
			};

			let max_image_count = if caps.max_image_count == 0 {
				u32::MAX
			} else {
				caps.max_image_count
			};
			let image_count = self.requested_image_count.clamp(caps.min_image_count, max_image_count);
			let extent = Extent2D {
				width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
				height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
			};

			let old_swapchain = self.swapchain;
			let swapchain = swapchain_ext.create_swapchain(
				&SwapchainCreateInfoKHR::default()
					.surface(self.surface)
					.min_image_count(image_count)
					.image_format(surface_format.format)
					.image_color_space(surface_format.color_space)
					.image_extent(extent)
					.image_array_layers(1)
					.image_usage(ImageUsageFlags::COLOR_ATTACHMENT | ImageUsageFlags::TRANSFER_DST)
					.image_sharing_mode(SharingMode::EXCLUSIVE)
					.pre_transform(caps.current_transform)
					.composite_alpha(CompositeAlphaFlagsKHR::OPAQUE)
					.present_mode(present_mode)
					.clipped(true)
					.old_swapchain(old_swapchain),
				None,
			)?;
			self.destroy_swapchain(vulkan);
			self.swapchain = swapchain;
			self.extent = extent;

			let images = swapchain_ext.get_swapchain_images(swapchain)?;
			for _ in 0..images.len() {
				self.present_semaphores
					.push(vulkan.device.create_semaphore(&SemaphoreCreateInfo::default(), None)?);
			}
			let mut textures = SmallVec::new();
			for image in images {
				textures.push(VulkanTexture::from_swapchain_image(
					vulkan,
					image,
					self.format,
					extent.width,
					extent.height,
				)?);
			}
			self.current = self.acquire(vulkan)?.unwrap_or(0);
			Ok(SwapChainImages {
				textures,
				current: self.current,
			})
		}
	}

	/// Blocks until the next image is available. Returns `None` if the swapchain is out of date.
	unsafe fn acquire(&mut self, vulkan: &Vulkan) -> Result<Option<u32>, VulkanError> {
		unsafe {
			let (_, swapchain_ext) = Self::extensions(vulkan)?;
			match swapchain_ext.acquire_next_image(self.swapchain, u64::MAX, Semaphore::null(), self.acquire_fence) {
				Ok((index, _suboptimal)) => {
					vulkan.device.wait_for_fences(&[self.acquire_fence], true, u64::MAX)?;
					vulkan.device.reset_fences(&[self.acquire_fence])?;
					Ok(Some(index))
				}
				Err(ash::vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
				Err(e) => Err(e.into()),
			}
		}
	}

	pub unsafe fn resize(
		&mut self,
		vulkan: &Vulkan,
		queue: &VulkanQueue,
		width: u32,
		height: u32,
	) -> Result<SwapChainImages<Vulkan>, VulkanError> {
		profiling::function_scope!();
		unsafe {
			// Presentation of images that are never acquired again may still wait on their present semaphores, which
			// are destroyed below. Vulkan offers no finer wait than the queue without VK_EXT_swapchain_maintenance1.
			vulkan.device.queue_wait_idle(*queue.shared.queue.lock())?;
			self.create_swapchain(vulkan, width, height)
		}
	}

	pub unsafe fn present(&mut self, vulkan: &Vulkan, queue: &VulkanQueue) -> Result<PlatformPresent, VulkanError> {
		profiling::function_scope!();
		unsafe {
			let (_, swapchain_ext) = Self::extensions(vulkan)?;
			let semaphore = self.present_semaphores[self.current as usize];
			let vk_queue = queue.shared.queue.lock();
			// signal operations wait for all work previously submitted to the queue
			vulkan.device.queue_submit2(
				*vk_queue,
				&[SubmitInfo2::default().signal_semaphore_infos(&[SemaphoreSubmitInfo::default().semaphore(semaphore)])],
				Fence::null(),
			)?;
			match swapchain_ext.queue_present(
				*vk_queue,
				&PresentInfoKHR::default()
					.wait_semaphores(&[semaphore])
					.swapchains(&[self.swapchain])
					.image_indices(&[self.current]),
			) {
				Ok(_suboptimal) => (),
				Err(ash::vk::Result::ERROR_OUT_OF_DATE_KHR) => return Ok(PlatformPresent::OutOfDate),
				Err(e) => return Err(e.into()),
			}
			drop(vk_queue);
			match self.acquire(vulkan)? {
				Some(index) => {
					self.current = index;
					Ok(PlatformPresent::Presented {
						next_backbuffer: Some(index),
					})
				}
				None => Ok(PlatformPresent::OutOfDate),
			}
		}
	}

	unsafe fn destroy_swapchain(&mut self, vulkan: &Vulkan) {
		unsafe {
			for semaphore in self.present_semaphores.drain(..) {
				vulkan.device.destroy_semaphore(semaphore, None);
			}
			if self.swapchain != SwapchainKHR::null() {
				if let Ok((_, swapchain_ext)) = Self::extensions(vulkan) {
					swapchain_ext.destroy_swapchain(self.swapchain, None);
				}
				self.swapchain = SwapchainKHR::null();
			}
		}
	}

	pub unsafe fn destroy(mut self, vulkan: &Vulkan) {
		unsafe {
			if let Err(e) = vulkan.device.device_wait_idle() {
				warn!("device_wait_idle failed before destroying swapchain: {}", e);
			}
			self.destroy_swapchain(vulkan);
			vulkan.device.destroy_fence(self.acquire_fence, None);
			if let Some(surface_ext) = vulkan.extensions().surface.as_ref() {
				surface_ext.destroy_surface(self.surface, None);
			}
		}
	}
}
