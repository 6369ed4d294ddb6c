use crate::format::PixelFormat;
use crate::platform::null::{NullError, NullHandle};
use crate::platform::PlatformPresent;
use crate::resource::{PresentMode, SwapChainDesc};
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::Relaxed;

pub struct NullBuffer {
	handle: NullHandle,
	name: Mutex<String>,
	data: Mutex<Vec<u8>>,
}

impl NullBuffer {
	/// Fails if the host can not hold `size` bytes.
	pub(super) fn new(handle: NullHandle, size: u64) -> Result<Self, NullError> {
		let out_of_memory = || NullError::OutOfMemory {
			requested: size,
			max: isize::MAX as u64,
		};
		let len = usize::try_from(size).map_err(|_| out_of_memory())?;
		let mut data = Vec::new();
		data.try_reserve_exact(len).map_err(|_| out_of_memory())?;
		data.resize(len, 0);
		Ok(Self {
			handle,
			name: Mutex::new(String::new()),
			data: Mutex::new(data),
		})
	}

	pub fn handle(&self) -> NullHandle {
		self.handle
	}

	pub fn debug_name(&self) -> String {
		self.name.lock().clone()
	}

	pub(super) fn set_debug_name(&self, name: &str) {
		*self.name.lock() = name.to_string();
	}

	pub(super) fn write(&self, offset: u64, data: &[u8]) {
		let offset = offset as usize;
		self.data.lock()[offset..offset + data.len()].copy_from_slice(data);
	}

	pub(super) fn read(&self, offset: u64, out: &mut [u8]) {
		let offset = offset as usize;
		out.copy_from_slice(&self.data.lock()[offset..offset + out.len()]);
	}
}

pub struct NullTexture {
	handle: NullHandle,
	backbuffer: bool,
	name: Mutex<String>,
}

impl NullTexture {
	pub(super) fn new(handle: NullHandle, backbuffer: bool) -> Self {
		Self {
			handle,
			backbuffer,
			name: Mutex::new(String::new()),
		}
	}

	pub fn handle(&self) -> NullHandle {
		self.handle
	}

	/// Owned by a [`NullSwapChain`].
	pub fn is_backbuffer(&self) -> bool {
		self.backbuffer
	}

	pub fn debug_name(&self) -> String {
		self.name.lock().clone()
	}

	pub(super) fn set_debug_name(&self, name: &str) {
		*self.name.lock() = name.to_string();
	}
}

pub struct NullSwapChain {
	pub(super) backbuffer_count: u32,
	width: u32,
	height: u32,
	color_format: PixelFormat,
	present_mode: PresentMode,
	current: u32,
	present_count: u64,
	out_of_date: AtomicBool,
}

impl NullSwapChain {
	pub(super) fn new(desc: &SwapChainDesc) -> Self {
		Self {
			backbuffer_count: desc.backbuffer_count,
			width: desc.width,
			height: desc.height,
			color_format: desc.color_format,
			present_mode: desc.present_mode,
			current: 0,
			present_count: 0,
			out_of_date: AtomicBool::new(false),
		}
	}

	pub fn extent(&self) -> (u32, u32) {
		(self.width, self.height)
	}

	pub fn color_format(&self) -> PixelFormat {
		self.color_format
	}

	pub fn present_mode(&self) -> PresentMode {
		self.present_mode
	}

	pub fn present_count(&self) -> u64 {
		self.present_count
	}

	/// Simulate the surface changing underneath the swap chain, the next present reports
	/// [`PlatformPresent::OutOfDate`] until it is recreated.
	pub fn invalidate(&self) {
		self.out_of_date.store(true, Relaxed);
	}

	pub(super) fn resize(&mut self, width: u32, height: u32) {
		self.width = width;
		self.height = height;
		self.current = 0;
		self.out_of_date.store(false, Relaxed);
	}

	pub(super) fn present(&mut self) -> PlatformPresent {
		if self.out_of_date.load(Relaxed) {
			return PlatformPresent::OutOfDate;
		}
		self.present_count += 1;
		self.current = (self.current + 1) % self.backbuffer_count;
		PlatformPresent::Presented { next_backbuffer: None }
	}
}
