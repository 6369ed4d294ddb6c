use crate::command::{CommandQueue, QueueType};
use crate::device::{BackendType, DeviceConfig, GraphicsAdapter, GraphicsDeviceCaps, QueueTypes};
use crate::error::{GraphicsError, Result};
use crate::platform::{DebugObject, Platform};
use crate::refcount::{RefPtr, WeakRef};
use crate::resource::{BufferDesc, GraphicsBuffer, SwapChain, SwapChainDesc, Texture, TextureDesc};
use bytemuck::Pod;
use log::{debug, error, info, warn};
use static_assertions::assert_impl_all;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

/// The logical device on a selected [`GraphicsAdapter`], the factory of all queues and resources.
///
/// Created through [`GraphicsDevice::new`], which returns the owning [`DeviceInstance`]. `GraphicsDevice` itself is a
/// cheaply clonable reference to the same device.
pub struct GraphicsDevice<P: Platform>(RefPtr<GraphicsDeviceInner<P>>);
assert_impl_all!(GraphicsDevice<crate::platform::null::Null>: Send, Sync);

pub struct GraphicsDeviceInner<P: Platform> {
	queues: [Option<CommandQueue<P>>; QueueType::COUNT],
	adapter: GraphicsAdapter,
	caps: GraphicsDeviceCaps,
	live_resources: AtomicU64,
	pub platform: P,
}

impl<P: Platform> Clone for GraphicsDevice<P> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<P: Platform> Deref for GraphicsDevice<P> {
	type Target = GraphicsDeviceInner<P>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<P: Platform> Deref for GraphicsDeviceInner<P> {
	type Target = P;

	fn deref(&self) -> &Self::Target {
		&self.platform
	}
}

impl<P: Platform> GraphicsDevice<P> {
	/// Create the backend device and all queues requested by `config`.
	pub fn new(create_info: P::PlatformCreateInfo, config: &DeviceConfig) -> Result<DeviceInstance<P>> {
		profiling::function_scope!();
		let platform = unsafe { P::create_platform(create_info, config) }.map_err(GraphicsError::initialization)?;
		let adapter = GraphicsAdapter::new(P::BACKEND, platform.adapter_info());
		let caps = platform.caps();

		let mut natives: [Option<P::Queue>; QueueType::COUNT] = Default::default();
		for queue_type in QueueType::ALL {
			if config.queue_types.contains(QueueTypes::from(queue_type)) {
				match unsafe { platform.create_queue(queue_type, queue_type.initial_fence_value()) } {
					Ok(native) => natives[queue_type.index()] = Some(native),
					Err(e) => {
						for native in natives.iter().flatten() {
							unsafe { platform.destroy_queue(native) };
						}
						return Err(GraphicsError::Initialization(format!(
							"Failed to create {queue_type:?} queue: {e}"
						)));
					}
				}
			}
		}

		info!(
			"Created {} device on {:?} ({:?}, vendor {:#06x}, device {:#06x})",
			P::BACKEND,
			adapter.name(),
			adapter.adapter_type(),
			adapter.vendor_id(),
			adapter.device_id()
		);
		let inner = RefPtr::new_cyclic(|weak| GraphicsDeviceInner {
			queues: std::array::from_fn(|i| {
				natives[i]
					.take()
					.map(|native| CommandQueue::new(WeakGraphicsDevice(weak.clone()), QueueType::ALL[i], native))
			}),
			adapter,
			caps,
			live_resources: AtomicU64::new(0),
			platform,
		});
		Ok(DeviceInstance(Self(inner)))
	}

	pub fn downgrade(&self) -> WeakGraphicsDevice<P> {
		WeakGraphicsDevice(RefPtr::downgrade(&self.0))
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		RefPtr::ptr_eq(&self.0, &other.0)
	}

	pub fn create_buffer(&self, desc: &BufferDesc) -> Result<GraphicsBuffer<P>> {
		profiling::function_scope!();
		desc.validate()?;
		let native =
			unsafe { self.platform.create_buffer(desc) }.map_err(|e| GraphicsError::resource_creation(desc.name, e))?;
		if !desc.name.is_empty() {
			unsafe { self.platform.set_debug_name(DebugObject::Buffer(&native), desc.name) };
		}
		Ok(GraphicsBuffer::new(self, native, desc))
	}

	/// Create a buffer with [`BufferUsage::MAP_WRITE`] and fill it with `data`. `desc.size` is ignored, the buffer is
	/// exactly as large as `data`.
	///
	/// [`BufferUsage::MAP_WRITE`]: crate::resource::BufferUsage::MAP_WRITE
	pub fn create_buffer_with_data<T: Pod>(&self, desc: &BufferDesc, data: &[T]) -> Result<GraphicsBuffer<P>> {
		let desc = BufferDesc {
			size: std::mem::size_of_val(data) as u64,
			..*desc
		};
		let buffer = self.create_buffer(&desc)?;
		buffer.write_data(0, data)?;
		Ok(buffer)
	}

	pub fn create_texture(&self, desc: &TextureDesc) -> Result<Texture<P>> {
		profiling::function_scope!();
		desc.validate(&self.caps.limits)?;
		let info = desc.info();
		let desc = TextureDesc {
			mip_levels: info.mip_levels,
			..*desc
		};
		let native =
			unsafe { self.platform.create_texture(&desc) }.map_err(|e| GraphicsError::resource_creation(desc.name, e))?;
		if !desc.name.is_empty() {
			unsafe { self.platform.set_debug_name(DebugObject::Texture(&native), desc.name) };
		}
		Ok(Texture::new(self, native, info, desc.name))
	}

	/// Create a swap chain presenting on the [`QueueType::Graphics`] queue.
	pub fn create_swap_chain(&self, desc: &SwapChainDesc) -> Result<SwapChain<P>> {
		profiling::function_scope!();
		SwapChain::new(self, desc)
	}

	/// Block until all queues are idle.
	pub fn wait_idle(&self) -> Result<()> {
		for queue in self.queues.iter().flatten() {
			queue.wait_idle()?;
		}
		Ok(())
	}
}

impl<P: Platform> GraphicsDeviceInner<P> {
	pub fn adapter(&self) -> &GraphicsAdapter {
		&self.adapter
	}

	pub fn caps(&self) -> &GraphicsDeviceCaps {
		&self.caps
	}

	pub fn backend(&self) -> BackendType {
		P::BACKEND
	}

	/// The queue of `queue_type`, always the same instance.
	///
	/// # Panics
	/// If the device was created without this queue type in [`DeviceConfig::queue_types`].
	pub fn get_queue(&self, queue_type: QueueType) -> &CommandQueue<P> {
		match self.try_get_queue(queue_type) {
			Some(queue) => queue,
			None => panic!("{queue_type:?} queue was not enabled in DeviceConfig::queue_types"),
		}
	}

	pub fn try_get_queue(&self, queue_type: QueueType) -> Option<&CommandQueue<P>> {
		self.queues[queue_type.index()].as_ref()
	}

	pub fn queues(&self) -> impl Iterator<Item = &CommandQueue<P>> {
		self.queues.iter().flatten()
	}

	/// Number of buffers, textures and swap chains created by this device that have not been dropped yet.
	pub fn live_resource_count(&self) -> u64 {
		self.live_resources.load(Relaxed)
	}

	pub(crate) fn resource_created(&self) {
		self.live_resources.fetch_add(1, Relaxed);
	}

	pub(crate) fn resource_destroyed(&self) {
		self.live_resources.fetch_sub(1, Relaxed);
	}
}

impl<P: Platform> Drop for GraphicsDeviceInner<P> {
	fn drop(&mut self) {
		for queue in self.queues.iter().flatten() {
			queue.destroy(&self.platform);
		}
		let outliving = self.live_resources.load(Relaxed);
		if outliving > 0 {
			warn!(
				"{} resources outlive their {} device, their backend objects are released together with it",
				outliving,
				P::BACKEND
			);
		}
	}
}

impl<P: Platform> Debug for GraphicsDevice<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GraphicsDevice")
			.field("backend", &P::BACKEND)
			.field("adapter", &self.adapter)
			.finish()
	}
}

/// A non-owning link to a [`GraphicsDevice`].
pub struct WeakGraphicsDevice<P: Platform>(WeakRef<GraphicsDeviceInner<P>>);

impl<P: Platform> WeakGraphicsDevice<P> {
	pub fn upgrade(&self) -> Option<GraphicsDevice<P>> {
		self.0.upgrade().map(GraphicsDevice)
	}

	/// Upgrade on behalf of the resource `name`, which can no longer be used once its device was torn down.
	pub(crate) fn upgrade_for(&self, name: &str) -> Result<GraphicsDevice<P>> {
		self.upgrade()
			.ok_or_else(|| GraphicsError::DeviceLost(format!("{name:?} was used after its device was torn down")))
	}
}

impl<P: Platform> Clone for WeakGraphicsDevice<P> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

/// The owner of a [`GraphicsDevice`], held by the application root. Dropping it drains every queue with
/// [`CommandQueue::wait_idle`] and tears the device down, releasing every backend object.
///
/// Resources only hold a [`WeakGraphicsDevice`] and never keep the device alive. A resource dropped after teardown
/// releases nothing, its backend object went down with the device.
pub struct DeviceInstance<P: Platform>(GraphicsDevice<P>);

impl<P: Platform> DeviceInstance<P> {
	pub fn device(&self) -> &GraphicsDevice<P> {
		&self.0
	}
}

impl<P: Platform> Deref for DeviceInstance<P> {
	type Target = GraphicsDevice<P>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<P: Platform> Drop for DeviceInstance<P> {
	fn drop(&mut self) {
		profiling::function_scope!();
		if let Err(e) = self.0.wait_idle() {
			error!("Failed to drain queues during device shutdown: {}", e);
		}
		let refs = RefPtr::ref_count(&self.0 .0);
		if refs > 1 {
			debug!("Device shutdown with {} GraphicsDevice clones remaining, teardown is deferred until they are dropped", refs - 1);
		}
	}
}

impl<P: Platform> Debug for DeviceInstance<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Debug::fmt(&self.0, f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::device::{AdapterType, AppConfig};
	use crate::error::GraphicsErrorKind;
	use crate::platform::null::{test_device, Null, NullCreateInfo};
	use crate::command::{ColorAttachment, RenderPassDesc};
	use crate::format::PixelFormat;
	use crate::resource::{BufferUsage, GraphicsResource, TextureUsage};

	#[test]
	fn test_get_queue_is_singleton() -> anyhow::Result<()> {
		let device = test_device(NullCreateInfo::default())?;
		for queue_type in QueueType::ALL {
			let a = device.get_queue(queue_type);
			let b = device.get_queue(queue_type);
			assert!(a.ptr_eq(b));
			assert!(a.ptr_eq(&a.clone()));
			assert_eq!(a.queue_type(), queue_type);
		}
		assert!(!device
			.get_queue(QueueType::Graphics)
			.ptr_eq(device.get_queue(QueueType::Copy)));
		Ok(())
	}

	#[test]
	fn test_disabled_queue() -> anyhow::Result<()> {
		let device = GraphicsDevice::<Null>::new(
			NullCreateInfo::default(),
			&DeviceConfig {
				queue_types: QueueTypes::GRAPHICS,
				..DeviceConfig::default()
			},
		)?;
		assert!(device.try_get_queue(QueueType::Graphics).is_some());
		assert!(device.try_get_queue(QueueType::Compute).is_none());
		assert_eq!(device.queues().count(), 1);
		Ok(())
	}

	#[test]
	#[should_panic(expected = "Copy queue was not enabled")]
	fn test_get_disabled_queue_panics() {
		let device = GraphicsDevice::<Null>::new(
			NullCreateInfo::default(),
			&DeviceConfig {
				app: AppConfig::default(),
				queue_types: QueueTypes::GRAPHICS | QueueTypes::COMPUTE,
				..DeviceConfig::default()
			},
		)
		.unwrap();
		device.get_queue(QueueType::Copy);
	}

	#[test]
	fn test_adapter() -> anyhow::Result<()> {
		let device = test_device(NullCreateInfo::default())?;
		assert_eq!(device.backend(), BackendType::Null);
		assert_eq!(device.adapter().adapter_type(), AdapterType::Cpu);
		assert_eq!(device.adapter().name(), "Null Adapter");
		assert_eq!(device.caps().limits, crate::device::GraphicsDeviceLimits::MINIMUM);
		Ok(())
	}

	#[test]
	fn test_create_buffer_with_data() -> anyhow::Result<()> {
		let device = test_device(NullCreateInfo::default())?;
		let data = [1u32, 2, 3, 4];
		let buffer = device.create_buffer_with_data(
			&BufferDesc {
				name: "vertices",
				usage: BufferUsage::MAP_WRITE | BufferUsage::VERTEX,
				..BufferDesc::default()
			},
			&data,
		)?;
		assert_eq!(buffer.size(), 16);
		assert_eq!(buffer.native().debug_name(), "vertices");
		Ok(())
	}

	#[test]
	fn test_allocation_failure_is_resource_creation() -> anyhow::Result<()> {
		let device = test_device(NullCreateInfo {
			max_allocation_size: Some(1024),
			..NullCreateInfo::default()
		})?;
		let err = device
			.create_buffer(&BufferDesc {
				name: "huge",
				usage: BufferUsage::STORAGE,
				size: 4096,
				heap_type: None,
			})
			.unwrap_err();
		assert_eq!(err.kind(), GraphicsErrorKind::ResourceCreation);
		assert_eq!(device.platform.live_objects().buffers, 0);
		Ok(())
	}

	#[test]
	fn test_live_objects_released() -> anyhow::Result<()> {
		let device = test_device(NullCreateInfo::default())?;
		{
			let buffer = device.create_buffer(&BufferDesc {
				name: "uniforms",
				usage: BufferUsage::UNIFORM,
				size: 256,
				heap_type: None,
			})?;
			let texture = device.create_texture(&TextureDesc {
				name: "albedo",
				format: PixelFormat::RGBA8UnormSrgb,
				usage: TextureUsage::SAMPLED | TextureUsage::COPY_DST,
				width: 64,
				height: 64,
				mip_levels: 0,
				..TextureDesc::default()
			})?;
			assert_eq!(texture.mip_levels(), 7);
			let live = device.platform.live_objects();
			assert_eq!((live.buffers, live.textures), (1, 1));
			let clone = buffer.clone();
			drop(buffer);
			assert_eq!(device.platform.live_objects().buffers, 1);
			drop(clone);
			assert_eq!(device.platform.live_objects().buffers, 0);
		}
		assert_eq!(device.platform.live_objects().textures, 0);
		Ok(())
	}

	#[test]
	fn test_invalid_descriptions_do_not_allocate() -> anyhow::Result<()> {
		let device = test_device(NullCreateInfo::default())?;
		let err = device
			.create_texture(&TextureDesc {
				name: "no format",
				usage: TextureUsage::SAMPLED,
				..TextureDesc::default()
			})
			.unwrap_err();
		assert_eq!(err.kind(), GraphicsErrorKind::ResourceCreation);
		let err = device
			.create_buffer(&BufferDesc {
				name: "no usage",
				size: 4,
				..BufferDesc::default()
			})
			.unwrap_err();
		assert_eq!(err.kind(), GraphicsErrorKind::InvalidUsage);
		assert_eq!(device.platform.live_objects(), Default::default());
		Ok(())
	}

	#[test]
	fn test_buffer_outliving_device() -> anyhow::Result<()> {
		let device = test_device(NullCreateInfo::default())?;
		let weak = device.downgrade();
		let buffer = device.create_buffer(&BufferDesc {
			name: "staging",
			usage: BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC,
			size: 64,
			heap_type: None,
		})?;
		assert_eq!(device.live_resource_count(), 1);
		assert!(buffer.device().is_some_and(|d| d.ptr_eq(device.device())));

		drop(device);
		assert!(weak.upgrade().is_none());
		assert!(buffer.device().is_none());
		let err = buffer.write_data(0, &[1u32]).unwrap_err();
		assert_eq!(err.kind(), GraphicsErrorKind::DeviceLost);
		buffer.set_name("orphan");
		assert_eq!(buffer.name(), "orphan");
		drop(buffer);
		Ok(())
	}

	#[test]
	fn test_teardown_retires_in_flight_resources() -> anyhow::Result<()> {
		let device = test_device(NullCreateInfo {
			deferred_completion: true,
			..NullCreateInfo::default()
		})?;
		let clone = device.device().clone();
		{
			let texture = device.create_texture(&TextureDesc {
				name: "target",
				format: PixelFormat::RGBA8Unorm,
				usage: TextureUsage::COLOR_ATTACHMENT,
				width: 16,
				height: 16,
				..TextureDesc::default()
			})?;
			let mut cmd = device.get_queue(QueueType::Graphics).get_command_buffer()?;
			cmd.begin_render_pass(&RenderPassDesc {
				color_attachments: &[ColorAttachment::new(&texture)],
				depth_stencil_attachment: None,
				render_area: None,
			});
			cmd.end_render_pass();
			cmd.submit()?;
		}
		assert_eq!(device.live_resource_count(), 1);

		drop(device);
		assert_eq!(clone.live_resource_count(), 0);
		assert_eq!(clone.platform.live_objects().textures, 0);
		Ok(())
	}

	#[test]
	fn test_huge_buffer_is_resource_creation() -> anyhow::Result<()> {
		let device = test_device(NullCreateInfo::default())?;
		let err = device
			.create_buffer(&BufferDesc {
				name: "huge",
				usage: BufferUsage::STORAGE,
				size: u64::MAX,
				heap_type: None,
			})
			.unwrap_err();
		assert_eq!(err.kind(), GraphicsErrorKind::ResourceCreation);
		assert_eq!(device.platform.live_objects().buffers, 0);
		assert_eq!(device.live_resource_count(), 0);
		Ok(())
	}
}
