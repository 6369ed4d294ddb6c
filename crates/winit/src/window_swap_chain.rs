use log::debug;
use rhi::device::{GraphicsDevice, PlatformCreateInfo};
use rhi::error::{GraphicsError, Result};
use rhi::resource::{PresentResult, SurfaceTarget, SwapChain, SwapChainDesc};
use std::sync::Arc;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::raw_window_handle::HandleError;
use winit::window::Window;

/// The [`PlatformCreateInfo`] of a device that should be able to present to windows of this event loop.
#[cfg(feature = "vulkan")]
pub fn platform_create_info(event_loop: &ActiveEventLoop) -> Result<PlatformCreateInfo, HandleError> {
	use winit::raw_window_handle::HasDisplayHandle;
	Ok(rhi::platform::vulkan::VulkanCreateInfo {
		display: Some(event_loop.display_handle()?.as_raw()),
	})
}

/// The [`PlatformCreateInfo`] of a device that should be able to present to windows of this event loop.
#[cfg(not(feature = "vulkan"))]
pub fn platform_create_info(_event_loop: &ActiveEventLoop) -> Result<PlatformCreateInfo, HandleError> {
	Ok(PlatformCreateInfo::default())
}

/// A [`SwapChain`] bound to a winit [`Window`]. Owning the window guarantees it outlives the surface the swap chain
/// presents to, and window events are tracked to recreate the backbuffers lazily before the next frame.
pub struct WindowSwapChain {
	// drop order: the swap chain must be destroyed before its window
	swap_chain: SwapChain,
	window: Arc<Window>,
	should_recreate: bool,
}

impl WindowSwapChain {
	/// Create a swap chain presenting to `window`. The `width`, `height` and `surface` of `desc` are overwritten with
	/// the window's.
	pub fn new(device: &GraphicsDevice, window: Arc<Window>, desc: &SwapChainDesc) -> Result<Self> {
		profiling::function_scope!();
		let surface = unsafe { SurfaceTarget::from_window(&*window) }
			.map_err(|e| GraphicsError::resource_creation(desc.name, e))?;
		let size = window.inner_size();
		let swap_chain = device.create_swap_chain(&SwapChainDesc {
			width: size.width,
			height: size.height,
			surface: Some(surface),
			..*desc
		})?;
		Ok(Self {
			swap_chain,
			window,
			should_recreate: false,
		})
	}

	pub fn window(&self) -> &Arc<Window> {
		&self.window
	}

	pub fn swap_chain(&self) -> &SwapChain {
		&self.swap_chain
	}

	/// Mark the backbuffers for recreation on [`WindowEvent::Resized`] and [`WindowEvent::ScaleFactorChanged`].
	pub fn handle_window_event(&mut self, event: &WindowEvent) {
		if matches!(event, WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. }) {
			self.should_recreate = true;
		}
	}

	/// Apply a pending resize and return the swap chain to render into, or None while the window is minimized.
	pub fn acquire(&mut self) -> Result<Option<&mut SwapChain>> {
		profiling::function_scope!();
		let size = self.window.inner_size();
		if size.width == 0 || size.height == 0 {
			return Ok(None);
		}
		if self.should_recreate {
			self.should_recreate = false;
			let queue = self.swap_chain.queue().clone();
			queue.wait_idle()?;
			if !self.swap_chain.resize(size.width, size.height)? {
				// size unchanged, but the surface may still be out of date
				self.swap_chain.recreate()?;
			}
			debug!("Window resized to {}x{}", size.width, size.height);
		}
		Ok(Some(&mut self.swap_chain))
	}

	/// Present the current backbuffer. An out of date surface schedules recreation for the next [`Self::acquire`].
	pub fn present(&mut self) -> Result<PresentResult> {
		self.window.pre_present_notify();
		let result = self.swap_chain.present()?;
		if result == PresentResult::OutOfDate {
			self.should_recreate = true;
		}
		Ok(result)
	}
}
