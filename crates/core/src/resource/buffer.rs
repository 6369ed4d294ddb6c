use crate::device::{GraphicsDevice, WeakGraphicsDevice};
use crate::error::{GraphicsError, Result};
use crate::platform::{DebugObject, Platform};
use crate::refcount::RefPtr;
use crate::resource::{GraphicsResource, HeapType};
use bytemuck::Pod;
use parking_lot::Mutex;
use static_assertions::assert_impl_all;
use std::fmt::{Debug, Formatter};
use std::mem::ManuallyDrop;
use std::ops::Deref;

bitflags::bitflags! {
	#[repr(transparent)]
	#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
	pub struct BufferUsage: u32 {
		/// Can be mapped for reading from the CPU, requires a [`HeapType::Readback`] heap.
		const MAP_READ = 0b1;
		/// Can be mapped for writing from the CPU, requires a [`HeapType::Upload`] heap.
		const MAP_WRITE = 0b10;
		const COPY_SRC = 0b100;
		const COPY_DST = 0b1000;
		const INDEX = 0b1_0000;
		const VERTEX = 0b10_0000;
		const UNIFORM = 0b100_0000;
		const STORAGE = 0b1000_0000;
		const INDIRECT = 0b1_0000_0000;
	}
}

impl BufferUsage {
	/// Usages where the GPU reads the buffer as part of a draw or dispatch.
	pub const GPU_INPUT: Self = Self::INDEX
		.union(Self::VERTEX)
		.union(Self::UNIFORM)
		.union(Self::STORAGE)
		.union(Self::INDIRECT);

	pub fn is_mappable(&self) -> bool {
		self.intersects(BufferUsage::MAP_READ | BufferUsage::MAP_WRITE)
	}

	/// The heap a buffer with these usages is placed in if the description does not name one.
	pub fn inferred_heap_type(&self) -> HeapType {
		if self.contains(BufferUsage::MAP_READ) {
			HeapType::Readback
		} else if self.contains(BufferUsage::MAP_WRITE) {
			HeapType::Upload
		} else {
			HeapType::Default
		}
	}
}

#[derive(Copy, Clone, Debug)]
pub struct BufferDesc<'a> {
	/// Name of the buffer, for tracking and debugging purposes
	pub name: &'a str,
	pub usage: BufferUsage,
	/// size in bytes
	pub size: u64,
	/// Heap to place the buffer in. Inferred from the usage if `None`.
	pub heap_type: Option<HeapType>,
}

impl Default for BufferDesc<'_> {
	fn default() -> Self {
		Self {
			name: "",
			usage: BufferUsage::empty(),
			size: 0,
			heap_type: None,
		}
	}
}

impl BufferDesc<'_> {
	pub fn heap_type(&self) -> HeapType {
		self.heap_type.unwrap_or_else(|| self.usage.inferred_heap_type())
	}

	pub fn validate(&self) -> Result<()> {
		let invalid = |reason: &str| Err(GraphicsError::invalid_usage(self.name, reason));
		if self.size == 0 {
			return Err(GraphicsError::resource_creation(self.name, "size must be greater than 0"));
		}
		if self.usage.is_empty() {
			return invalid("must declare at least one BufferUsage");
		}
		if self.usage.contains(BufferUsage::MAP_READ | BufferUsage::MAP_WRITE) {
			return invalid("MAP_READ and MAP_WRITE are mutually exclusive");
		}

		let heap_type = self.heap_type();
		if self.usage.contains(BufferUsage::MAP_READ) && heap_type != HeapType::Readback {
			return invalid("MAP_READ requires a Readback heap");
		}
		if self.usage.contains(BufferUsage::MAP_WRITE) && heap_type != HeapType::Upload {
			return invalid("MAP_WRITE requires an Upload heap");
		}
		match heap_type {
			HeapType::Default => (),
			HeapType::Upload => {
				if self.usage.intersects(BufferUsage::STORAGE | BufferUsage::COPY_DST) {
					return invalid("an Upload heap is only ever read by the GPU, STORAGE and COPY_DST are not allowed");
				}
			}
			HeapType::Readback => {
				if self.usage.intersects(BufferUsage::GPU_INPUT | BufferUsage::COPY_SRC) {
					let rejected = self.usage & (BufferUsage::GPU_INPUT | BufferUsage::COPY_SRC);
					return invalid(
						format!("a Readback heap can only be written to by copies, {rejected:?} are not allowed").as_str(),
					);
				}
			}
		}
		Ok(())
	}
}

pub struct GraphicsBuffer<P: Platform>(RefPtr<GraphicsBufferInner<P>>);
assert_impl_all!(GraphicsBuffer<crate::platform::null::Null>: Send, Sync);

pub struct GraphicsBufferInner<P: Platform> {
	device: WeakGraphicsDevice<P>,
	native: ManuallyDrop<P::Buffer>,
	usage: BufferUsage,
	size: u64,
	heap_type: HeapType,
	name: Mutex<String>,
}

impl<P: Platform> Clone for GraphicsBuffer<P> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<P: Platform> Deref for GraphicsBuffer<P> {
	type Target = GraphicsBufferInner<P>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<P: Platform> GraphicsBuffer<P> {
	pub(crate) fn new(device: &GraphicsDevice<P>, native: P::Buffer, desc: &BufferDesc) -> Self {
		device.resource_created();
		Self(RefPtr::new(GraphicsBufferInner {
			device: device.downgrade(),
			native: ManuallyDrop::new(native),
			usage: desc.usage,
			size: desc.size,
			heap_type: desc.heap_type(),
			name: Mutex::new(desc.name.to_string()),
		}))
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		RefPtr::ptr_eq(&self.0, &other.0)
	}

	/// Copy `data` into this buffer, starting at the byte offset `offset`. Requires [`BufferUsage::MAP_WRITE`].
	///
	/// The caller must ensure the GPU is not reading the written range concurrently.
	pub fn write_data<T: Pod>(&self, offset: u64, data: &[T]) -> Result<()> {
		let bytes: &[u8] = bytemuck::cast_slice(data);
		self.check_mapped_range(BufferUsage::MAP_WRITE, offset, bytes.len())?;
		let device = self.device.upgrade_for(&self.name())?;
		unsafe { device.platform.write_buffer(&self.native, offset, bytes) }.map_err(GraphicsError::device_lost)
	}

	/// Copy from this buffer, starting at the byte offset `offset`, into `out`. Requires [`BufferUsage::MAP_READ`].
	pub fn read_data<T: Pod>(&self, offset: u64, out: &mut [T]) -> Result<()> {
		let bytes: &mut [u8] = bytemuck::cast_slice_mut(out);
		self.check_mapped_range(BufferUsage::MAP_READ, offset, bytes.len())?;
		let device = self.device.upgrade_for(&self.name())?;
		unsafe { device.platform.read_buffer(&self.native, offset, bytes) }.map_err(GraphicsError::device_lost)
	}

	fn check_mapped_range(&self, usage: BufferUsage, offset: u64, len: usize) -> Result<()> {
		if !self.usage.contains(usage) {
			return Err(GraphicsError::invalid_usage(
				&self.name(),
				format_args!("buffer was not created with {usage:?}"),
			));
		}
		match offset.checked_add(len as u64) {
			Some(end) if end <= self.size => Ok(()),
			_ => Err(GraphicsError::invalid_usage(
				&self.name(),
				format_args!("range {offset}..+{len} exceeds buffer size {}", self.size),
			)),
		}
	}
}

impl<P: Platform> GraphicsBufferInner<P> {
	pub fn usage(&self) -> BufferUsage {
		self.usage
	}

	pub fn size(&self) -> u64 {
		self.size
	}

	pub fn native(&self) -> &P::Buffer {
		&self.native
	}

	pub fn handle(&self) -> P::BufferHandle {
		P::buffer_handle(&self.native)
	}
}

impl<P: Platform> GraphicsResource<P> for GraphicsBuffer<P> {
	fn device(&self) -> Option<GraphicsDevice<P>> {
		self.device.upgrade()
	}

	fn heap_type(&self) -> HeapType {
		self.heap_type
	}

	fn name(&self) -> String {
		self.name.lock().clone()
	}

	fn set_name(&self, name: &str) {
		let mut guard = self.name.lock();
		if let Some(device) = self.device.upgrade() {
			unsafe { device.platform.set_debug_name(DebugObject::Buffer(&*self.native), name) };
		}
		*guard = name.to_string();
	}
}

impl<P: Platform> Drop for GraphicsBufferInner<P> {
	fn drop(&mut self) {
		// without a device the native buffer was released by its teardown
		if let Some(device) = self.device.upgrade() {
			unsafe {
				let native = ManuallyDrop::take(&mut self.native);
				device.platform.destroy_buffer(native);
			}
			device.resource_destroyed();
		}
	}
}

impl<P: Platform> Debug for GraphicsBuffer<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GraphicsBuffer")
			.field("name", &self.name())
			.field("usage", &self.usage)
			.field("size", &self.size)
			.field("heap_type", &self.heap_type)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::GraphicsErrorKind;

	fn desc(usage: BufferUsage, heap_type: Option<HeapType>) -> BufferDesc<'static> {
		BufferDesc {
			name: "test",
			usage,
			size: 64,
			heap_type,
		}
	}

	fn kind(desc: BufferDesc) -> Option<GraphicsErrorKind> {
		desc.validate().err().map(|e| e.kind())
	}

	#[test]
	fn test_inferred_heap() -> anyhow::Result<()> {
		assert_eq!(desc(BufferUsage::MAP_READ | BufferUsage::COPY_DST, None).heap_type(), HeapType::Readback);
		assert_eq!(desc(BufferUsage::MAP_WRITE | BufferUsage::VERTEX, None).heap_type(), HeapType::Upload);
		assert_eq!(desc(BufferUsage::STORAGE, None).heap_type(), HeapType::Default);
		assert_eq!(
			desc(BufferUsage::STORAGE, Some(HeapType::Upload)).heap_type(),
			HeapType::Upload
		);
		Ok(())
	}

	#[test]
	fn test_valid_descriptions() -> anyhow::Result<()> {
		desc(BufferUsage::MAP_WRITE | BufferUsage::VERTEX | BufferUsage::INDEX, None).validate()?;
		desc(BufferUsage::MAP_READ | BufferUsage::COPY_DST, None).validate()?;
		desc(BufferUsage::STORAGE | BufferUsage::INDIRECT | BufferUsage::COPY_SRC, None).validate()?;
		desc(BufferUsage::UNIFORM, Some(HeapType::Upload)).validate()?;
		Ok(())
	}

	#[test]
	fn test_zero_size() -> anyhow::Result<()> {
		let zero = BufferDesc {
			size: 0,
			..desc(BufferUsage::VERTEX, None)
		};
		assert_eq!(kind(zero), Some(GraphicsErrorKind::ResourceCreation));
		Ok(())
	}

	#[test]
	fn test_map_requires_cpu_heap() -> anyhow::Result<()> {
		assert_eq!(
			kind(desc(BufferUsage::MAP_WRITE, Some(HeapType::Default))),
			Some(GraphicsErrorKind::InvalidUsage)
		);
		assert_eq!(
			kind(desc(BufferUsage::MAP_READ, Some(HeapType::Upload))),
			Some(GraphicsErrorKind::InvalidUsage)
		);
		assert_eq!(
			kind(desc(BufferUsage::MAP_READ | BufferUsage::MAP_WRITE, None)),
			Some(GraphicsErrorKind::InvalidUsage)
		);
		Ok(())
	}

	#[test]
	fn test_gpu_input_on_readback_heap() -> anyhow::Result<()> {
		assert_eq!(
			kind(desc(BufferUsage::VERTEX | BufferUsage::INDIRECT, Some(HeapType::Readback))),
			Some(GraphicsErrorKind::InvalidUsage)
		);
		assert_eq!(
			kind(desc(BufferUsage::MAP_READ | BufferUsage::INDEX, None)),
			Some(GraphicsErrorKind::InvalidUsage)
		);
		assert_eq!(
			kind(desc(BufferUsage::empty(), None)),
			Some(GraphicsErrorKind::InvalidUsage)
		);
		Ok(())
	}
}
