use crate::command::QueueType;
use crate::device::{
	AdapterInfo, BackendType, Debuggers, DeviceConfig, GraphicsDeviceCaps, GraphicsDeviceFeatures,
	GraphicsDeviceLimits, MemoryArchitecture, PowerPreference,
};
use crate::platform::vulkan::{SharedQueue, Vulkan, VulkanCreateInfo, VulkanError, VulkanExtensions};
use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::vk::{
	ApplicationInfo, Bool32, DebugUtilsMessageSeverityFlagsEXT, DebugUtilsMessageTypeFlagsEXT,
	DebugUtilsMessengerCallbackDataEXT, DebugUtilsMessengerCreateInfoEXT, DeviceCreateInfo, DeviceQueueCreateInfo,
	InstanceCreateInfo, PhysicalDevice, PhysicalDeviceFeatures, PhysicalDeviceFeatures2, PhysicalDeviceProperties,
	PhysicalDeviceType, PhysicalDeviceVulkan12Features, PhysicalDeviceVulkan13Features, QueueFamilyProperties,
	QueueFlags, ValidationFeatureEnableEXT, ValidationFeaturesEXT, API_VERSION_1_0, API_VERSION_1_3, FALSE, TRUE,
};
use ash::Entry;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use gpu_allocator::{AllocationSizes, AllocatorDebugSettings};
use log::{debug, error, info, log_enabled, trace, warn, Level};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::ffi::{c_char, c_void, CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::Arc;

pub const LAYER_VALIDATION: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Everything created after the instance, which must be destroyed again if a later step fails.
struct DeviceParts {
	physical_device: PhysicalDevice,
	device: ash::Device,
	queues: [Arc<SharedQueue>; QueueType::COUNT],
	memory_allocator: Allocator,
	extensions: VulkanExtensions,
	adapter: AdapterInfo,
	caps: GraphicsDeviceCaps,
}

impl Vulkan {
	/// Create an instance, pick the adapter best matching [`DeviceConfig::power_preference`] and create a device with
	/// one queue per distinct queue family used by the [`QueueType`]s.
	pub unsafe fn new(create_info: VulkanCreateInfo, config: &DeviceConfig) -> Result<Self, VulkanError> {
		profiling::function_scope!();
		unsafe {
			if matches!(config.debug, Debuggers::RenderDoc) {
				// renderdoc does not yet support wayland
				std::env::remove_var("WAYLAND_DISPLAY");
				std::env::set_var("ENABLE_VULKAN_RENDERDOC_CAPTURE", "1");
			}
			let entry = Entry::load()?;
			let instance_version = entry.try_enumerate_instance_version()?.unwrap_or(API_VERSION_1_0);
			if instance_version < API_VERSION_1_3 {
				return Err(VulkanError::NoSuitableAdapter);
			}

			let available_layers = entry.enumerate_instance_layer_properties()?;
			let available_extensions = entry.enumerate_instance_extension_properties(None)?;
			let has_layer = |name: &CStr| available_layers.iter().any(|l| l.layer_name_as_c_str() == Ok(name));
			let has_extension =
				|name: &CStr| available_extensions.iter().any(|e| e.extension_name_as_c_str() == Ok(name));

			let mut layers = SmallVec::<[*const c_char; 1]>::new();
			let mut validation_features = SmallVec::<[ValidationFeatureEnableEXT; 2]>::new();
			if config.debug.validation_enabled() {
				if has_layer(LAYER_VALIDATION) {
					layers.push(LAYER_VALIDATION.as_ptr());
					if config.debug == Debuggers::GpuAssistedValidation {
						validation_features.extend_from_slice(&[
							ValidationFeatureEnableEXT::GPU_ASSISTED,
							ValidationFeatureEnableEXT::GPU_ASSISTED_RESERVE_BINDING_SLOT,
						]);
					}
				} else {
					warn!("{:?} requested, but {:?} is not installed", config.debug, LAYER_VALIDATION);
				}
			}
			let debug_utils_enabled = config.debug != Debuggers::None && has_extension(debug_utils::NAME);

			let mut extensions = SmallVec::<[*const c_char; 4]>::new();
			if let Some(display) = create_info.display {
				extensions.extend_from_slice(ash_window::enumerate_required_extensions(display)?);
			}
			if debug_utils_enabled {
				extensions.push(debug_utils::NAME.as_ptr());
			}

			let app_name = CString::new(config.app.name).unwrap_or_default();
			let (major, minor, patch) = config.app.version;
			let instance = entry.create_instance(
				&InstanceCreateInfo::default()
					.application_info(
						&ApplicationInfo::default()
							.application_name(&app_name)
							.application_version(ash::vk::make_api_version(0, major, minor, patch))
							.engine_name(c"rhi")
							.engine_version(1)
							.api_version(API_VERSION_1_3),
					)
					.enabled_extension_names(&extensions)
					.enabled_layer_names(&layers)
					.push_next(&mut ValidationFeaturesEXT::default().enabled_validation_features(&validation_features)),
				None,
			)?;

			let debug_messenger = if debug_utils_enabled {
				let debug_instance = debug_utils::Instance::new(&entry, &instance);
				match debug_instance.create_debug_utils_messenger(&debug_messenger_create_info(), None) {
					Ok(messenger) => Some((debug_instance, messenger)),
					Err(e) => {
						instance.destroy_instance(None);
						return Err(e.into());
					}
				}
			} else {
				None
			};

			match create_device(&entry, &instance, &create_info, config, debug_utils_enabled) {
				Ok(parts) => {
					info!(
						"Vulkan device {:?} created with queue families {:?}",
						parts.adapter.name,
						parts.queues.each_ref().map(|q| q.family_index)
					);
					Ok(Self {
						entry,
						instance,
						physical_device: parts.physical_device,
						device: parts.device,
						extensions: parts.extensions,
						queues: parts.queues,
						memory_allocator: ManuallyDrop::new(Mutex::new(parts.memory_allocator)),
						debug_messenger,
						adapter: parts.adapter,
						caps: parts.caps,
					})
				}
				Err(e) => {
					if let Some((debug_instance, messenger)) = debug_messenger {
						debug_instance.destroy_debug_utils_messenger(messenger, None);
					}
					instance.destroy_instance(None);
					Err(e)
				}
			}
		}
	}
}

unsafe fn create_device(
	entry: &Entry,
	instance: &ash::Instance,
	create_info: &VulkanCreateInfo,
	config: &DeviceConfig,
	debug_utils_enabled: bool,
) -> Result<DeviceParts, VulkanError> {
	unsafe {
		let headless = create_info.display.is_none();
		let physical_device = instance
			.enumerate_physical_devices()?
			.into_iter()
			.filter(|phy| is_suitable(instance, *phy, headless))
			.min_by_key(|phy| {
				let device_type = instance.get_physical_device_properties(*phy).device_type;
				adapter_rank(config.power_preference, device_type)
			})
			.ok_or(VulkanError::NoSuitableAdapter)?;
		let properties = instance.get_physical_device_properties(physical_device);
		let families = select_queue_families(&instance.get_physical_device_queue_family_properties(physical_device))
			.ok_or(VulkanError::NoSuitableAdapter)?;

		let mut unique_families = SmallVec::<[u32; QueueType::COUNT]>::new();
		for family in families {
			if !unique_families.contains(&family) {
				unique_families.push(family);
			}
		}
		let queue_create_infos = unique_families
			.iter()
			.map(|family| {
				DeviceQueueCreateInfo::default()
					.queue_family_index(*family)
					.queue_priorities(&[1.])
			})
			.collect::<SmallVec<[_; QueueType::COUNT]>>();

		let supported = instance.get_physical_device_features(physical_device);
		let features = enabled_features(&supported);
		let mut features_vk12 = PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);
		let mut features_vk13 = PhysicalDeviceVulkan13Features::default()
			.synchronization2(true)
			.dynamic_rendering(true);
		let extensions = if headless {
			SmallVec::<[*const c_char; 1]>::new()
		} else {
			SmallVec::from_slice(&[swapchain::NAME.as_ptr()])
		};
		let device = instance.create_device(
			physical_device,
			&DeviceCreateInfo::default()
				.enabled_features(&features)
				.enabled_extension_names(&extensions)
				.push_next(&mut features_vk12)
				.push_next(&mut features_vk13)
				.queue_create_infos(&queue_create_infos),
			None,
		)?;

		let shared = unique_families
			.iter()
			.map(|family| {
				Arc::new(SharedQueue {
					family_index: *family,
					queue: Mutex::new(device.get_device_queue(*family, 0)),
				})
			})
			.collect::<SmallVec<[_; QueueType::COUNT]>>();
		let queues = families.map(|family| {
			let i = unique_families.iter().position(|f| *f == family).unwrap_or(0);
			shared[i].clone()
		});

		let memory_allocator = match Allocator::new(&AllocatorCreateDesc {
			instance: instance.clone(),
			device: device.clone(),
			physical_device,
			debug_settings: AllocatorDebugSettings::default(),
			buffer_device_address: false,
			allocation_sizes: AllocationSizes::default(),
		}) {
			Ok(allocator) => allocator,
			Err(e) => {
				device.destroy_device(None);
				return Err(e.into());
			}
		};

		let extensions = VulkanExtensions {
			debug_utils: debug_utils_enabled.then(|| debug_utils::Device::new(instance, &device)),
			surface: (!headless).then(|| surface::Instance::new(entry, instance)),
			swapchain: (!headless).then(|| swapchain::Device::new(instance, &device)),
		};

		Ok(DeviceParts {
			physical_device,
			device,
			queues,
			memory_allocator,
			extensions,
			adapter: adapter_info(&properties),
			caps: caps(&properties, &features),
		})
	}
}

unsafe fn is_suitable(instance: &ash::Instance, physical_device: PhysicalDevice, headless: bool) -> bool {
	unsafe {
		let properties = instance.get_physical_device_properties(physical_device);
		let name = properties.device_name_as_c_str().unwrap_or(c"unknown");
		if properties.api_version < API_VERSION_1_3 {
			debug!("Skipping {:?}: only supports Vulkan {:#x}", name, properties.api_version);
			return false;
		}

		let mut features_vk12 = PhysicalDeviceVulkan12Features::default();
		let mut features_vk13 = PhysicalDeviceVulkan13Features::default();
		let mut features2 = PhysicalDeviceFeatures2::default()
			.push_next(&mut features_vk12)
			.push_next(&mut features_vk13);
		instance.get_physical_device_features2(physical_device, &mut features2);
		if features_vk12.timeline_semaphore == FALSE
			|| features_vk13.synchronization2 == FALSE
			|| features_vk13.dynamic_rendering == FALSE
		{
			debug!("Skipping {:?}: missing required features", name);
			return false;
		}

		let families = instance.get_physical_device_queue_family_properties(physical_device);
		if select_queue_families(&families).is_none() {
			debug!("Skipping {:?}: no graphics queue family", name);
			return false;
		}

		if !headless {
			let has_swapchain = instance
				.enumerate_device_extension_properties(physical_device)
				.map(|extensions| {
					extensions
						.iter()
						.any(|e| e.extension_name_as_c_str() == Ok(swapchain::NAME))
				})
				.unwrap_or(false);
			if !has_swapchain {
				debug!("Skipping {:?}: no swapchain support", name);
				return false;
			}
		}
		true
	}
}

/// Lower is better.
pub fn adapter_rank(power_preference: PowerPreference, device_type: PhysicalDeviceType) -> u32 {
	let (discrete, integrated) = match power_preference {
		PowerPreference::LowPower => (2, 1),
		PowerPreference::Default | PowerPreference::HighPerformance => (1, 2),
	};
	match device_type {
		PhysicalDeviceType::DISCRETE_GPU => discrete,
		PhysicalDeviceType::INTEGRATED_GPU => integrated,
		PhysicalDeviceType::VIRTUAL_GPU => 3,
		PhysicalDeviceType::CPU => 4,
		_ => 5,
	}
}

/// Queue family indices of [`QueueType::Graphics`], [`QueueType::Compute`] and [`QueueType::Copy`]. Compute and copy
/// prefer dedicated families and fall back to the next more capable one.
pub fn select_queue_families(families: &[QueueFamilyProperties]) -> Option<[u32; QueueType::COUNT]> {
	let find = |required: QueueFlags, excluded: QueueFlags| {
		families
			.iter()
			.position(|f| f.queue_count > 0 && f.queue_flags.contains(required) && !f.queue_flags.intersects(excluded))
			.map(|i| i as u32)
	};
	let graphics = find(QueueFlags::GRAPHICS | QueueFlags::COMPUTE, QueueFlags::empty())?;
	let compute = find(QueueFlags::COMPUTE, QueueFlags::GRAPHICS).unwrap_or(graphics);
	let copy = find(QueueFlags::TRANSFER, QueueFlags::GRAPHICS | QueueFlags::COMPUTE).unwrap_or(compute);
	Some([graphics, compute, copy])
}

pub fn memory_architecture(device_type: PhysicalDeviceType) -> MemoryArchitecture {
	match device_type {
		PhysicalDeviceType::DISCRETE_GPU => MemoryArchitecture::Dedicated,
		PhysicalDeviceType::INTEGRATED_GPU | PhysicalDeviceType::CPU => MemoryArchitecture::Unified,
		_ => MemoryArchitecture::Unknown,
	}
}

fn adapter_info(properties: &PhysicalDeviceProperties) -> AdapterInfo {
	AdapterInfo {
		vendor_id: properties.vendor_id,
		device_id: properties.device_id,
		name: properties
			.device_name_as_c_str()
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_default(),
		software: properties.device_type == PhysicalDeviceType::CPU,
		memory_architecture: memory_architecture(properties.device_type),
	}
}

/// The optional core features backing [`GraphicsDeviceFeatures`], if supported.
fn enabled_features(supported: &PhysicalDeviceFeatures) -> PhysicalDeviceFeatures {
	PhysicalDeviceFeatures::default()
		.independent_blend(supported.independent_blend == TRUE)
		.geometry_shader(supported.geometry_shader == TRUE)
		.tessellation_shader(supported.tessellation_shader == TRUE)
		.multi_viewport(supported.multi_viewport == TRUE)
		.sampler_anisotropy(supported.sampler_anisotropy == TRUE)
		.texture_compression_bc(supported.texture_compression_bc == TRUE)
		.image_cube_array(supported.image_cube_array == TRUE)
}

fn caps(properties: &PhysicalDeviceProperties, features: &PhysicalDeviceFeatures) -> GraphicsDeviceCaps {
	let limits = &properties.limits;
	GraphicsDeviceCaps {
		backend: BackendType::Vulkan,
		features: GraphicsDeviceFeatures {
			independent_blend: features.independent_blend == TRUE,
			compute_shader: true,
			geometry_shader: features.geometry_shader == TRUE,
			tessellation_shader: features.tessellation_shader == TRUE,
			multi_viewport: features.multi_viewport == TRUE,
			sampler_anisotropy: features.sampler_anisotropy == TRUE,
			texture_compression_bc: features.texture_compression_bc == TRUE,
			texture_cube_array: features.image_cube_array == TRUE,
		},
		limits: GraphicsDeviceLimits {
			max_texture_dimension_1d: limits.max_image_dimension1_d,
			max_texture_dimension_2d: limits.max_image_dimension2_d,
			max_texture_dimension_3d: limits.max_image_dimension3_d,
			max_texture_dimension_cube: limits.max_image_dimension_cube,
			max_texture_array_layers: limits.max_image_array_layers,
			max_color_attachments: limits.max_color_attachments,
			max_uniform_buffer_range: limits.max_uniform_buffer_range,
			min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment,
			min_storage_buffer_offset_alignment: limits.min_storage_buffer_offset_alignment,
			max_compute_work_group_count: limits.max_compute_work_group_count,
			max_compute_work_group_size: limits.max_compute_work_group_size,
			max_compute_work_group_invocations: limits.max_compute_work_group_invocations,
		},
	}
}

fn debug_messenger_create_info() -> DebugUtilsMessengerCreateInfoEXT<'static> {
	let mut severity = DebugUtilsMessageSeverityFlagsEXT::ERROR | DebugUtilsMessageSeverityFlagsEXT::WARNING;
	if log_enabled!(Level::Debug) {
		severity |= DebugUtilsMessageSeverityFlagsEXT::INFO | DebugUtilsMessageSeverityFlagsEXT::VERBOSE;
	}
	DebugUtilsMessengerCreateInfoEXT::default()
		.message_severity(severity)
		.message_type(
			DebugUtilsMessageTypeFlagsEXT::GENERAL
				| DebugUtilsMessageTypeFlagsEXT::VALIDATION
				| DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
		)
		.pfn_user_callback(Some(debug_callback))
}

/// All child objects created on device must have been destroyed prior to destroying device
/// https://vulkan.lunarg.com/doc/view/1.3.296.0/linux/1.3-extensions/vkspec.html#VUID-vkDestroyDevice-device-05137
const VUID_VK_DESTROY_DEVICE_DEVICE_05137: i32 = 0x4872eaa0;

const IGNORED_MSG_IDS: &[i32] = &[VUID_VK_DESTROY_DEVICE_DEVICE_05137];

unsafe extern "system" fn debug_callback(
	message_severity: DebugUtilsMessageSeverityFlagsEXT,
	message_type: DebugUtilsMessageTypeFlagsEXT,
	callback_data: *const DebugUtilsMessengerCallbackDataEXT<'_>,
	_p_user_data: *mut c_void,
) -> Bool32 {
	unsafe {
		let callback_data = *callback_data;
		let message_id_number = callback_data.message_id_number;
		if IGNORED_MSG_IDS.contains(&message_id_number) {
			return FALSE;
		}
		let message_id_name = callback_data
			.message_id_name_as_c_str()
			.map_or(Cow::Borrowed(""), CStr::to_string_lossy);
		let message = callback_data
			.message_as_c_str()
			.map_or(Cow::Borrowed("No message"), CStr::to_string_lossy);

		if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::ERROR) {
			error!("{message_type:?} [{message_id_name} ({message_id_number:#x})]: {message}");
		} else if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::WARNING) {
			warn!("{message_type:?} [{message_id_name} ({message_id_number:#x})]: {message}");
		} else if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::INFO) {
			debug!("{message_type:?} [{message_id_name} ({message_id_number:#x})]: {message}");
		} else {
			trace!("{message_type:?} [{message_id_name} ({message_id_number:#x})]: {message}");
		}
		FALSE
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn family(queue_flags: QueueFlags) -> QueueFamilyProperties {
		QueueFamilyProperties {
			queue_flags,
			queue_count: 1,
			..QueueFamilyProperties::default()
		}
	}

	#[test]
	fn test_dedicated_queue_families() -> anyhow::Result<()> {
		let families = [
			family(QueueFlags::GRAPHICS | QueueFlags::COMPUTE | QueueFlags::TRANSFER),
			family(QueueFlags::COMPUTE | QueueFlags::TRANSFER),
			family(QueueFlags::TRANSFER),
		];
		assert_eq!(select_queue_families(&families), Some([0, 1, 2]));
		Ok(())
	}

	#[test]
	fn test_queue_family_fallback() -> anyhow::Result<()> {
		let single = [family(QueueFlags::GRAPHICS | QueueFlags::COMPUTE | QueueFlags::TRANSFER)];
		assert_eq!(select_queue_families(&single), Some([0, 0, 0]));

		let no_copy = [
			family(QueueFlags::GRAPHICS | QueueFlags::COMPUTE | QueueFlags::TRANSFER),
			family(QueueFlags::COMPUTE | QueueFlags::TRANSFER),
		];
		assert_eq!(select_queue_families(&no_copy), Some([0, 1, 1]));

		let compute_only = [family(QueueFlags::COMPUTE)];
		assert_eq!(select_queue_families(&compute_only), None);
		Ok(())
	}

	#[test]
	fn test_adapter_rank() -> anyhow::Result<()> {
		let best = |pref| {
			[
				PhysicalDeviceType::CPU,
				PhysicalDeviceType::INTEGRATED_GPU,
				PhysicalDeviceType::DISCRETE_GPU,
			]
			.into_iter()
			.min_by_key(|ty| adapter_rank(pref, *ty))
		};
		assert_eq!(best(PowerPreference::HighPerformance), Some(PhysicalDeviceType::DISCRETE_GPU));
		assert_eq!(best(PowerPreference::Default), Some(PhysicalDeviceType::DISCRETE_GPU));
		assert_eq!(best(PowerPreference::LowPower), Some(PhysicalDeviceType::INTEGRATED_GPU));
		assert_eq!(
			memory_architecture(PhysicalDeviceType::VIRTUAL_GPU),
			MemoryArchitecture::Unknown
		);
		Ok(())
	}
}
