use crate::command::QueueType;
use log::warn;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum PowerPreference {
	#[default]
	Default,
	LowPower,
	HighPerformance,
}

/// Debugging layers to enable on device creation. Backends without support for a particular debugger fall back to
/// their plain validation layer, or to nothing.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Debuggers {
	#[default]
	None,
	RenderDoc,
	Validation,
	GpuAssistedValidation,
}

impl Debuggers {
	pub const ENV_VAR: &'static str = "RHI_DEBUGGER";

	/// Reads [`Self::ENV_VAR`], returning `default` if it is unset or unrecognized.
	pub fn from_env_or(default: Self) -> Self {
		match std::env::var(Self::ENV_VAR) {
			Ok(value) => Self::parse(&value).unwrap_or_else(|| {
				warn!("Unrecognized {}={:?}, using {:?}", Self::ENV_VAR, value, default);
				default
			}),
			Err(_) => default,
		}
	}

	pub fn from_env() -> Self {
		Self::from_env_or(Self::default())
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_ascii_lowercase().as_str() {
			"" | "none" => Some(Debuggers::None),
			"renderdoc" => Some(Debuggers::RenderDoc),
			"validation" => Some(Debuggers::Validation),
			"gpu-assisted" | "gpu_assisted" | "gpuassistedvalidation" => Some(Debuggers::GpuAssistedValidation),
			_ => None,
		}
	}

	pub fn validation_enabled(&self) -> bool {
		matches!(self, Debuggers::Validation | Debuggers::GpuAssistedValidation)
	}
}

bitflags::bitflags! {
	/// The set of [`QueueType`]s a device should create.
	#[repr(transparent)]
	#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
	pub struct QueueTypes: u8 {
		const GRAPHICS = 0b1;
		const COMPUTE = 0b10;
		const COPY = 0b100;
	}
}

impl Default for QueueTypes {
	fn default() -> Self {
		Self::all()
	}
}

impl From<QueueType> for QueueTypes {
	fn from(value: QueueType) -> Self {
		Self::from_bits_truncate(1 << u8::from(value))
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct AppConfig<'a> {
	pub name: &'a str,
	/// (major, minor, patch)
	pub version: (u32, u32, u32),
}

impl Default for AppConfig<'_> {
	fn default() -> Self {
		Self {
			name: "Unknown App",
			version: (0, 0, 0),
		}
	}
}

pub const fn compile_time_parse(input: &'static str) -> u32 {
	match konst::primitive::parse_u32(input) {
		Ok(e) => e,
		Err(_) => unreachable!(),
	}
}

/// An [`AppConfig`] of the crate invoking this macro, taken from its cargo metadata.
#[macro_export]
macro_rules! app_config_from_cargo {
	() => {
		$crate::device::AppConfig {
			name: env!("CARGO_PKG_NAME"),
			version: (
				$crate::device::compile_time_parse(env!("CARGO_PKG_VERSION_MAJOR")),
				$crate::device::compile_time_parse(env!("CARGO_PKG_VERSION_MINOR")),
				$crate::device::compile_time_parse(env!("CARGO_PKG_VERSION_PATCH")),
			),
		}
	};
}

/// Backend independent configuration of device creation.
#[derive(Copy, Clone, Debug, Default)]
pub struct DeviceConfig<'a> {
	pub app: AppConfig<'a>,
	pub power_preference: PowerPreference,
	pub debug: Debuggers,
	pub queue_types: QueueTypes,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_debuggers_parse() -> anyhow::Result<()> {
		assert_eq!(Debuggers::parse("Validation"), Some(Debuggers::Validation));
		assert_eq!(Debuggers::parse(" gpu-assisted "), Some(Debuggers::GpuAssistedValidation));
		assert_eq!(Debuggers::parse(""), Some(Debuggers::None));
		assert_eq!(Debuggers::parse("printf"), None);
		Ok(())
	}

	#[test]
	fn test_queue_types_from_queue_type() -> anyhow::Result<()> {
		assert_eq!(QueueTypes::from(QueueType::Graphics), QueueTypes::GRAPHICS);
		assert_eq!(QueueTypes::from(QueueType::Compute), QueueTypes::COMPUTE);
		assert_eq!(QueueTypes::from(QueueType::Copy), QueueTypes::COPY);
		assert_eq!(QueueTypes::default(), QueueTypes::GRAPHICS | QueueTypes::COMPUTE | QueueTypes::COPY);
		Ok(())
	}

	#[test]
	fn test_app_config_from_cargo() -> anyhow::Result<()> {
		let app = crate::app_config_from_cargo!();
		assert_eq!(app.name, "rhi-core");
		assert_eq!(app.version, (0, 1, 0));
		Ok(())
	}
}
