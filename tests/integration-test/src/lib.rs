use log::warn;
use rhi_core::device::{Debuggers, DeviceConfig, DeviceInstance, GraphicsDevice};
use rhi_core::error::{GraphicsError, Result};
use rhi_core::platform::null::{Null, NullCreateInfo};
use rhi_core::platform::vulkan::{Vulkan, VulkanCreateInfo};

pub mod command;
pub mod device;
pub mod end_to_end;
pub mod resources;
pub mod swap_chain;

/// the global setting on which debugger to use for integration tests, overridable with `RHI_DEBUGGER`
pub fn debugger() -> Debuggers {
	Debuggers::from_env_or(Debuggers::Validation)
}

pub fn device_config() -> DeviceConfig<'static> {
	let _ = env_logger::builder().is_test(true).try_init();
	DeviceConfig {
		app: rhi_core::app_config_from_cargo!(),
		debug: debugger(),
		..DeviceConfig::default()
	}
}

pub fn null_device() -> Result<DeviceInstance<Null>> {
	null_device_with(NullCreateInfo::default())
}

pub fn null_device_with(create_info: NullCreateInfo) -> Result<DeviceInstance<Null>> {
	GraphicsDevice::new(create_info, &device_config())
}

/// A headless vulkan device, or `None` if this machine has no suitable vulkan driver.
pub fn vulkan_device() -> Result<Option<DeviceInstance<Vulkan>>> {
	match GraphicsDevice::new(VulkanCreateInfo::default(), &device_config()) {
		Ok(device) => Ok(Some(device)),
		Err(GraphicsError::Initialization(err)) => {
			warn!("Skipping vulkan test, no device available: {err}");
			Ok(None)
		}
		Err(err) => Err(err),
	}
}
