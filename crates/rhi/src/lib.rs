//! The primary platform selected by exactly one of the features `vulkan`, `d3d12`, `d3d11` or `null`, with all
//! generic types of [`rhi_core`] instantiated for it.

#[cfg(all(feature = "vulkan", not(any(feature = "d3d12", feature = "d3d11", feature = "null"))))]
pub type P = rhi_core::platform::vulkan::Vulkan;
#[cfg(all(feature = "d3d12", not(any(feature = "vulkan", feature = "d3d11", feature = "null"))))]
pub type P = rhi_core::platform::d3d12::D3D12;
#[cfg(all(feature = "d3d11", not(any(feature = "vulkan", feature = "d3d12", feature = "null"))))]
pub type P = rhi_core::platform::d3d11::D3D11;
#[cfg(all(feature = "null", not(any(feature = "vulkan", feature = "d3d12", feature = "d3d11"))))]
pub type P = rhi_core::platform::null::Null;

#[cfg(not(any(feature = "vulkan", feature = "d3d12", feature = "d3d11", feature = "null")))]
compile_error!("Must select a primary platform by enabling one of the features \"vulkan\", \"d3d12\", \"d3d11\" or \"null\"");
#[cfg(any(
	all(feature = "vulkan", any(feature = "d3d12", feature = "d3d11", feature = "null")),
	all(feature = "d3d12", any(feature = "d3d11", feature = "null")),
	all(feature = "d3d11", feature = "null"),
))]
compile_error!("Only one primary platform may be selected, disable default features when selecting \"d3d12\", \"d3d11\" or \"null\"");
#[cfg(all(not(windows), any(feature = "d3d12", feature = "d3d11")))]
compile_error!("The \"d3d12\" and \"d3d11\" platforms are only available on windows");

/// Native handle of a [`resource::GraphicsBuffer`].
pub type BufferHandle = <P as rhi_core::platform::Platform>::BufferHandle;
/// Native handle of a [`resource::Texture`].
pub type TextureHandle = <P as rhi_core::platform::Platform>::TextureHandle;
/// The memory backing a buffer or texture. Only platforms with a separate memory allocator have one.
#[cfg(feature = "vulkan")]
pub type AllocationHandle = gpu_allocator::vulkan::Allocation;

pub use rhi_core::app_config_from_cargo;

pub mod command {
	pub type CommandQueue = rhi_core::command::CommandQueue<crate::P>;
	pub type CommandBuffer = rhi_core::command::CommandBuffer<crate::P>;
	pub type Execution = rhi_core::command::Execution<crate::P>;
	pub type RenderPassDesc<'a> = rhi_core::command::RenderPassDesc<'a, crate::P>;
	pub type ColorAttachment<'a> = rhi_core::command::ColorAttachment<'a, crate::P>;
	pub type DepthStencilAttachment<'a> = rhi_core::command::DepthStencilAttachment<'a, crate::P>;

	pub use rhi_core::command::*;
}

pub mod device {
	pub type GraphicsDevice = rhi_core::device::GraphicsDevice<crate::P>;
	pub type WeakGraphicsDevice = rhi_core::device::WeakGraphicsDevice<crate::P>;
	pub type DeviceInstance = rhi_core::device::DeviceInstance<crate::P>;
	pub type PlatformCreateInfo = <crate::P as rhi_core::platform::Platform>::PlatformCreateInfo;

	pub use rhi_core::device::*;
}

pub mod resource {
	pub type GraphicsBuffer = rhi_core::resource::GraphicsBuffer<crate::P>;
	pub type Texture = rhi_core::resource::Texture<crate::P>;
	pub type SwapChain = rhi_core::resource::SwapChain<crate::P>;

	pub use rhi_core::resource::*;
}

pub mod error {
	pub use rhi_core::error::*;
}

pub mod format {
	pub use rhi_core::format::*;
}

pub mod platform {
	pub use rhi_core::platform::*;
}

pub mod refcount {
	pub use rhi_core::refcount::*;
}

#[cfg(test)]
mod tests {
	use super::*;
	use rhi_core::platform::Platform;

	#[test]
	fn test_primary_platform() -> anyhow::Result<()> {
		let expected = if cfg!(feature = "null") {
			device::BackendType::Null
		} else if cfg!(feature = "d3d12") {
			device::BackendType::Direct3D12
		} else if cfg!(feature = "d3d11") {
			device::BackendType::Direct3D11
		} else {
			device::BackendType::Vulkan
		};
		assert_eq!(P::BACKEND, expected);
		Ok(())
	}

	/// Dependents pick the platform, which only works if the workspace entry does not force the default one on them.
	#[test]
	fn test_workspace_dependency_has_no_default_platform() -> anyhow::Result<()> {
		let manifest = include_str!("../../../Cargo.toml");
		let entry = manifest
			.lines()
			.find(|line| line.starts_with("rhi = "))
			.ok_or_else(|| anyhow::anyhow!("workspace does not declare rhi"))?;
		assert!(entry.contains("default-features = false"), "{entry}");
		Ok(())
	}
}
