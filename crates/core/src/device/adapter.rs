use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt::{Display, Formatter};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BackendType {
	Null,
	Vulkan,
	Direct3D12,
	Direct3D11,
}

impl Display for BackendType {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			BackendType::Null => "Null",
			BackendType::Vulkan => "Vulkan",
			BackendType::Direct3D12 => "Direct3D 12",
			BackendType::Direct3D11 => "Direct3D 11",
		})
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AdapterType {
	Cpu,
	IntegratedGpu,
	DiscreteGpu,
	Unknown,
}

/// How the adapter's memory relates to system memory, if the backend can tell.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum MemoryArchitecture {
	#[default]
	Unknown,
	/// Memory is shared with the CPU (UMA).
	Unified,
	/// The adapter has its own memory.
	Dedicated,
}

#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum KnownVendor {
	Amd = 0x1002,
	ImgTec = 0x1010,
	Nvidia = 0x10DE,
	Arm = 0x13B5,
	Microsoft = 0x1414,
	Qualcomm = 0x5143,
	Intel = 0x8086,
}

/// Enumeration data reported by a backend about one of its adapters.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct AdapterInfo {
	pub vendor_id: u32,
	pub device_id: u32,
	pub name: String,
	/// Software rasterizer, like WARP or lavapipe
	pub software: bool,
	pub memory_architecture: MemoryArchitecture,
}

/// One physical or software GPU. Immutable after construction.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct GraphicsAdapter {
	backend: BackendType,
	vendor_id: u32,
	device_id: u32,
	name: String,
	adapter_type: AdapterType,
}

impl GraphicsAdapter {
	pub fn new(backend: BackendType, info: AdapterInfo) -> Self {
		Self {
			backend,
			vendor_id: info.vendor_id,
			device_id: info.device_id,
			adapter_type: Self::classify(&info),
			name: info.name,
		}
	}

	/// Software adapters are [`AdapterType::Cpu`]. Every other adapter is a GPU, which is only considered discrete if
	/// the backend reported dedicated memory, and integrated otherwise.
	pub fn classify(info: &AdapterInfo) -> AdapterType {
		if info.software {
			AdapterType::Cpu
		} else {
			match info.memory_architecture {
				MemoryArchitecture::Dedicated => AdapterType::DiscreteGpu,
				MemoryArchitecture::Unified | MemoryArchitecture::Unknown => AdapterType::IntegratedGpu,
			}
		}
	}

	pub fn backend(&self) -> BackendType {
		self.backend
	}

	pub fn vendor_id(&self) -> u32 {
		self.vendor_id
	}

	pub fn device_id(&self) -> u32 {
		self.device_id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn adapter_type(&self) -> AdapterType {
		self.adapter_type
	}

	pub fn vendor(&self) -> Option<KnownVendor> {
		KnownVendor::try_from(self.vendor_id).ok()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn info(software: bool, memory_architecture: MemoryArchitecture) -> AdapterInfo {
		AdapterInfo {
			vendor_id: 0x10DE,
			device_id: 0x2684,
			name: "Test Adapter".to_string(),
			software,
			memory_architecture,
		}
	}

	#[test]
	fn test_software_is_cpu() -> anyhow::Result<()> {
		for arch in [
			MemoryArchitecture::Unknown,
			MemoryArchitecture::Unified,
			MemoryArchitecture::Dedicated,
		] {
			assert_eq!(GraphicsAdapter::classify(&info(true, arch)), AdapterType::Cpu);
		}
		Ok(())
	}

	#[test]
	fn test_unknown_memory_defaults_to_integrated() -> anyhow::Result<()> {
		assert_eq!(
			GraphicsAdapter::classify(&info(false, MemoryArchitecture::Unknown)),
			AdapterType::IntegratedGpu
		);
		assert_eq!(
			GraphicsAdapter::classify(&info(false, MemoryArchitecture::Unified)),
			AdapterType::IntegratedGpu
		);
		assert_eq!(
			GraphicsAdapter::classify(&info(false, MemoryArchitecture::Dedicated)),
			AdapterType::DiscreteGpu
		);
		Ok(())
	}

	#[test]
	fn test_vendor_lookup() -> anyhow::Result<()> {
		let adapter = GraphicsAdapter::new(BackendType::Null, info(false, MemoryArchitecture::Dedicated));
		assert_eq!(adapter.vendor(), Some(KnownVendor::Nvidia));
		assert_eq!(adapter.name(), "Test Adapter");
		assert_eq!(adapter.backend(), BackendType::Null);
		let unknown = GraphicsAdapter::new(
			BackendType::Null,
			AdapterInfo {
				vendor_id: 0xBEEF,
				..AdapterInfo::default()
			},
		);
		assert_eq!(unknown.vendor(), None);
		Ok(())
	}
}
