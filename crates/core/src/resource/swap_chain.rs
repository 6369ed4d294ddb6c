use crate::command::{CommandQueue, QueueType};
use crate::device::{GraphicsDevice, WeakGraphicsDevice};
use crate::error::{GraphicsError, Result};
use crate::format::PixelFormat;
use crate::platform::{Platform, PlatformPresent, SwapChainImages};
use crate::resource::{GraphicsResource, HeapType, Texture, TextureDesc, TextureInfo, TextureType, TextureUsage};
use log::{debug, error};
use parking_lot::Mutex;
use raw_window_handle::{HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use smallvec::SmallVec;
use std::fmt::{Debug, Formatter};
use std::mem::ManuallyDrop;

pub const MIN_BACKBUFFER_COUNT: u32 = 2;
pub const MAX_BACKBUFFER_COUNT: u32 = 3;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum PresentMode {
	Immediate,
	Mailbox,
	#[default]
	Fifo,
}

/// The native window and display a swap chain presents to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SurfaceTarget {
	pub window: RawWindowHandle,
	pub display: RawDisplayHandle,
}

impl SurfaceTarget {
	/// # Safety
	/// The window must outlive every [`SwapChain`] created with this target.
	pub unsafe fn from_window(window: &(impl HasWindowHandle + HasDisplayHandle)) -> Result<Self, HandleError> {
		Ok(Self {
			window: window.window_handle()?.as_raw(),
			display: window.display_handle()?.as_raw(),
		})
	}
}

#[derive(Copy, Clone, Debug)]
pub struct SwapChainDesc<'a> {
	pub name: &'a str,
	pub width: u32,
	pub height: u32,
	pub color_format: PixelFormat,
	/// [`PixelFormat::Undefined`] creates no depth stencil texture.
	pub depth_stencil_format: PixelFormat,
	pub present_mode: PresentMode,
	pub backbuffer_count: u32,
	/// Required by all backends except the null backend.
	pub surface: Option<SurfaceTarget>,
}

impl Default for SwapChainDesc<'_> {
	fn default() -> Self {
		Self {
			name: "SwapChain",
			width: 0,
			height: 0,
			color_format: PixelFormat::BGRA8Unorm,
			depth_stencil_format: PixelFormat::Undefined,
			present_mode: PresentMode::Fifo,
			backbuffer_count: MIN_BACKBUFFER_COUNT,
			surface: None,
		}
	}
}

impl SwapChainDesc<'_> {
	pub fn validate(&self) -> Result<()> {
		let creation = |reason: &str| Err(GraphicsError::resource_creation(self.name, reason));
		if self.width == 0 || self.height == 0 {
			return creation(format!("size must be non-zero, got {}x{}", self.width, self.height).as_str());
		}
		let color = self.color_format;
		if color.is_undefined() || color.is_depth_stencil() || color.is_compressed() {
			return creation(format!("{color:?} is not a presentable color format").as_str());
		}
		let depth = self.depth_stencil_format;
		if !depth.is_undefined() && !depth.is_depth_stencil() {
			return creation(format!("{depth:?} is not a depth stencil format").as_str());
		}
		if !(MIN_BACKBUFFER_COUNT..=MAX_BACKBUFFER_COUNT).contains(&self.backbuffer_count) {
			return creation(
				format!(
					"backbuffer_count must be within {MIN_BACKBUFFER_COUNT}..={MAX_BACKBUFFER_COUNT}, got {}",
					self.backbuffer_count
				)
				.as_str(),
			);
		}
		Ok(())
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PresentResult {
	Presented,
	/// The surface changed, [`SwapChain::recreate`] must be called before presenting again.
	OutOfDate,
}

/// A rotating set of backbuffer textures presented to a surface. Presentation happens on the device's graphics queue
/// and is ordered after all work previously submitted to it.
pub struct SwapChain<P: Platform> {
	device: WeakGraphicsDevice<P>,
	queue: CommandQueue<P>,
	native: ManuallyDrop<P::SwapChain>,
	name: Mutex<String>,
	width: u32,
	height: u32,
	color_format: PixelFormat,
	depth_stencil_format: PixelFormat,
	present_mode: PresentMode,
	backbuffers: SmallVec<[Texture<P>; 3]>,
	backbuffer_index: u32,
	depth_stencil: Option<Texture<P>>,
}

impl<P: Platform> SwapChain<P> {
	pub(crate) fn new(device: &GraphicsDevice<P>, desc: &SwapChainDesc) -> Result<Self> {
		desc.validate()?;
		let queue = device.try_get_queue(QueueType::Graphics).cloned().ok_or_else(|| {
			GraphicsError::invalid_usage(desc.name, "swap chains require the device to have a Graphics queue")
		})?;
		let (native, images) = queue
			.with_submission_lock(|queue| unsafe { device.platform.create_swap_chain(queue, desc) })
			.map_err(|e| GraphicsError::resource_creation(desc.name, e))?;

		device.resource_created();
		let mut swap_chain = Self {
			device: device.downgrade(),
			queue,
			native: ManuallyDrop::new(native),
			name: Mutex::new(desc.name.to_string()),
			width: desc.width,
			height: desc.height,
			color_format: desc.color_format,
			depth_stencil_format: desc.depth_stencil_format,
			present_mode: desc.present_mode,
			backbuffers: SmallVec::new(),
			backbuffer_index: 0,
			depth_stencil: None,
		};
		swap_chain.adopt_images(device, images)?;
		debug!(
			"Created swap chain {:?} {}x{} with {} backbuffers of {:?}",
			desc.name,
			swap_chain.width,
			swap_chain.height,
			swap_chain.backbuffers.len(),
			swap_chain.color_format
		);
		Ok(swap_chain)
	}

	fn adopt_images(&mut self, device: &GraphicsDevice<P>, images: SwapChainImages<P>) -> Result<()> {
		let name = self.name.lock().clone();
		let info = TextureInfo {
			texture_type: TextureType::Texture2D,
			format: self.color_format,
			usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::COPY_DST | TextureUsage::SWAPCHAIN,
			width: self.width,
			height: self.height,
			depth: 1,
			mip_levels: 1,
			array_layers: 1,
			sample_count: 1,
		};
		self.backbuffers = images
			.textures
			.into_iter()
			.enumerate()
			.map(|(i, native)| Texture::new(device, native, info, &format!("{name} Backbuffer {i}")))
			.collect();
		self.backbuffer_index = images.current;
		assert!(
			(self.backbuffer_index as usize) < self.backbuffers.len(),
			"backend reported backbuffer {} of {}",
			self.backbuffer_index,
			self.backbuffers.len()
		);

		self.depth_stencil = if self.depth_stencil_format.is_undefined() {
			None
		} else {
			Some(device.create_texture(&TextureDesc {
				name: &format!("{name} DepthStencil"),
				format: self.depth_stencil_format,
				usage: TextureUsage::DEPTH_STENCIL_ATTACHMENT,
				width: self.width,
				height: self.height,
				..TextureDesc::default()
			})?)
		};
		Ok(())
	}

	/// Recreate the backbuffers at the new size. Does nothing and returns false if the size did not change or either
	/// dimension is 0, like it happens when a window is minimized.
	///
	/// The caller must ensure the GPU no longer uses any of the backbuffers, for example by calling
	/// [`CommandQueue::wait_idle`], and must not hold on to any backbuffer [`Texture`].
	pub fn resize(&mut self, width: u32, height: u32) -> Result<bool> {
		if width == 0 || height == 0 || (width == self.width && height == self.height) {
			return Ok(false);
		}
		self.recreate_at(width, height)?;
		Ok(true)
	}

	/// Recreate the backbuffers at the current size, required after [`PresentResult::OutOfDate`]. Has the same
	/// requirements as [`Self::resize`].
	pub fn recreate(&mut self) -> Result<()> {
		self.recreate_at(self.width, self.height)
	}

	fn recreate_at(&mut self, width: u32, height: u32) -> Result<()> {
		profiling::function_scope!();
		let device = self.device.upgrade_for(&self.name())?;
		debug!(
			"Resizing swap chain {:?} from {}x{} to {}x{}",
			self.name.lock(),
			self.width,
			self.height,
			width,
			height
		);
		self.backbuffers.clear();
		self.depth_stencil = None;

		let images = self
			.queue
			.with_submission_lock(|queue| unsafe {
				device.platform.resize_swap_chain(queue, &mut self.native, width, height)
			})
			.map_err(|e| GraphicsError::resource_creation(&self.name(), e))?;
		self.width = width;
		self.height = height;
		self.adopt_images(&device, images)
	}

	/// Present the current backbuffer and advance to the next one.
	pub fn present(&mut self) -> Result<PresentResult> {
		profiling::function_scope!();
		let device = self.device.upgrade_for(&self.name())?;
		let result = self
			.queue
			.with_submission_lock(|queue| unsafe { device.platform.present(queue, &mut self.native) })
			.map_err(GraphicsError::device_lost)?;
		match result {
			PlatformPresent::Presented { next_backbuffer } => {
				let count = self.backbuffer_count();
				self.backbuffer_index = next_backbuffer.unwrap_or((self.backbuffer_index + 1) % count);
				Ok(PresentResult::Presented)
			}
			PlatformPresent::OutOfDate => Ok(PresentResult::OutOfDate),
		}
	}

	/// The texture to render the next frame into.
	pub fn get_backbuffer_texture(&self) -> &Texture<P> {
		match self.backbuffers.get(self.backbuffer_index as usize) {
			Some(texture) => texture,
			None => panic!("SwapChain {:?} has no backbuffers after a failed resize", self.name()),
		}
	}

	pub fn get_depth_stencil_texture(&self) -> Option<&Texture<P>> {
		self.depth_stencil.as_ref()
	}

	pub fn backbuffers(&self) -> &[Texture<P>] {
		&self.backbuffers
	}

	pub fn backbuffer_index(&self) -> u32 {
		self.backbuffer_index
	}

	pub fn backbuffer_count(&self) -> u32 {
		self.backbuffers.len() as u32
	}

	pub fn width(&self) -> u32 {
		self.width
	}

	pub fn height(&self) -> u32 {
		self.height
	}

	pub fn color_format(&self) -> PixelFormat {
		self.color_format
	}

	pub fn depth_stencil_format(&self) -> PixelFormat {
		self.depth_stencil_format
	}

	pub fn present_mode(&self) -> PresentMode {
		self.present_mode
	}

	pub fn queue(&self) -> &CommandQueue<P> {
		&self.queue
	}

	pub fn native(&self) -> &P::SwapChain {
		&self.native
	}
}

impl<P: Platform> GraphicsResource<P> for SwapChain<P> {
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
		*self.name.lock() = name.to_string();
	}
}

impl<P: Platform> Debug for SwapChain<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SwapChain")
			.field("name", &self.name())
			.field("width", &self.width)
			.field("height", &self.height)
			.field("color_format", &self.color_format)
			.field("backbuffer_index", &self.backbuffer_index)
			.field("backbuffer_count", &self.backbuffers.len())
			.finish()
	}
}

impl<P: Platform> Drop for SwapChain<P> {
	fn drop(&mut self) {
		let device = self.device.upgrade();
		if device.is_some() {
			if let Err(e) = self.queue.wait_idle() {
				error!("Failed to wait for {:?} before destroying swap chain: {}", self.queue.queue_type(), e);
			}
		}
		self.backbuffers.clear();
		self.depth_stencil = None;
		// without a device the native swap chain was released by its teardown
		if let Some(device) = device {
			unsafe {
				let native = ManuallyDrop::take(&mut self.native);
				device.platform.destroy_swap_chain(native);
			}
			device.resource_destroyed();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::GraphicsErrorKind;
	use crate::platform::null::{test_device, NullCreateInfo};

	fn desc(width: u32, height: u32) -> SwapChainDesc<'static> {
		SwapChainDesc {
			name: "window",
			width,
			height,
			..SwapChainDesc::default()
		}
	}

	#[test]
	fn test_desc_validation() -> anyhow::Result<()> {
		desc(800, 600).validate()?;
		let kind = |desc: SwapChainDesc| desc.validate().err().map(|e| e.kind());
		assert_eq!(kind(desc(0, 600)), Some(GraphicsErrorKind::ResourceCreation));
		assert_eq!(
			kind(SwapChainDesc {
				backbuffer_count: 4,
				..desc(800, 600)
			}),
			Some(GraphicsErrorKind::ResourceCreation)
		);
		assert_eq!(
			kind(SwapChainDesc {
				color_format: PixelFormat::Depth24UnormStencil8,
				..desc(800, 600)
			}),
			Some(GraphicsErrorKind::ResourceCreation)
		);
		assert_eq!(
			kind(SwapChainDesc {
				depth_stencil_format: PixelFormat::RGBA8Unorm,
				..desc(800, 600)
			}),
			Some(GraphicsErrorKind::ResourceCreation)
		);
		Ok(())
	}

	#[test]
	fn test_out_of_date_until_recreated() -> anyhow::Result<()> {
		let device = test_device(NullCreateInfo::default())?;
		let mut swap_chain = device.create_swap_chain(&desc(320, 240))?;
		assert_eq!(swap_chain.present()?, PresentResult::Presented);
		assert_eq!(swap_chain.backbuffer_index(), 1);

		swap_chain.native().invalidate();
		assert_eq!(swap_chain.present()?, PresentResult::OutOfDate);
		assert_eq!(swap_chain.backbuffer_index(), 1);

		swap_chain.recreate()?;
		assert_eq!(swap_chain.backbuffer_index(), 0);
		assert_eq!(swap_chain.present()?, PresentResult::Presented);
		assert_eq!(swap_chain.native().present_count(), 2);
		Ok(())
	}

	#[test]
	fn test_depth_stencil_follows_resize() -> anyhow::Result<()> {
		let device = test_device(NullCreateInfo::default())?;
		let mut swap_chain = device.create_swap_chain(&SwapChainDesc {
			depth_stencil_format: PixelFormat::Depth32Float,
			backbuffer_count: 3,
			..desc(640, 480)
		})?;
		assert_eq!(device.platform.live_objects().textures, 4);
		let depth = swap_chain.get_depth_stencil_texture().map(|d| (d.width(0), d.height(0)));
		assert_eq!(depth, Some((640, 480)));

		assert!(swap_chain.resize(1024, 768)?);
		let depth = swap_chain.get_depth_stencil_texture().map(|d| (d.width(0), d.height(0)));
		assert_eq!(depth, Some((1024, 768)));
		assert_eq!(swap_chain.get_backbuffer_texture().width(0), 1024);
		assert_eq!(device.platform.live_objects().textures, 4);

		drop(swap_chain);
		assert_eq!(device.platform.live_objects().textures, 0);
		assert_eq!(device.platform.live_objects().swap_chains, 0);
		Ok(())
	}

	#[test]
	fn test_resize_leaves_submitted_work_running() -> anyhow::Result<()> {
		let device = test_device(NullCreateInfo {
			deferred_completion: true,
			..NullCreateInfo::default()
		})?;
		let mut swap_chain = device.create_swap_chain(&desc(800, 600))?;
		let execution = device.get_queue(QueueType::Graphics).get_command_buffer()?.submit()?;
		assert!(swap_chain.resize(1024, 768)?);
		assert!(!execution.is_completed());
		swap_chain.recreate()?;
		assert!(!execution.is_completed());
		Ok(())
	}

	#[test]
	fn test_swap_chain_outliving_device() -> anyhow::Result<()> {
		let device = test_device(NullCreateInfo::default())?;
		let mut swap_chain = device.create_swap_chain(&desc(800, 600))?;
		let weak = device.downgrade();
		assert_eq!(device.live_resource_count(), 3);
		drop(device);
		assert!(weak.upgrade().is_none());
		assert!(swap_chain.device().is_none());

		let err = swap_chain.present().unwrap_err();
		assert_eq!(err.kind(), GraphicsErrorKind::DeviceLost);
		let err = swap_chain.resize(1024, 768).unwrap_err();
		assert_eq!(err.kind(), GraphicsErrorKind::DeviceLost);
		assert_eq!(swap_chain.width(), 800);
		drop(swap_chain);
		Ok(())
	}
}
