use crate::device::GraphicsDevice;
use crate::platform::Platform;

/// Memory placement of a resource.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum HeapType {
	/// GPU local memory, not accessible by the CPU.
	#[default]
	Default,
	/// CPU writable memory the GPU reads from.
	Upload,
	/// CPU readable memory the GPU writes into.
	Readback,
}

impl HeapType {
	pub fn is_cpu_accessible(&self) -> bool {
		!matches!(self, HeapType::Default)
	}
}

/// Common interface of [`GraphicsBuffer`], [`Texture`] and [`SwapChain`].
///
/// [`GraphicsBuffer`]: crate::resource::GraphicsBuffer
/// [`Texture`]: crate::resource::Texture
/// [`SwapChain`]: crate::resource::SwapChain
pub trait GraphicsResource<P: Platform> {
	/// The device that created this resource, `None` once it was torn down.
	fn device(&self) -> Option<GraphicsDevice<P>>;

	fn heap_type(&self) -> HeapType;

	fn name(&self) -> String;

	/// Rename this resource, forwarding the name to the backend's debug naming if it has any.
	fn set_name(&self, name: &str);
}
