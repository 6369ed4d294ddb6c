use crate::device::BackendType;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct GraphicsDeviceFeatures {
	pub independent_blend: bool,
	pub compute_shader: bool,
	pub geometry_shader: bool,
	pub tessellation_shader: bool,
	pub multi_viewport: bool,
	pub sampler_anisotropy: bool,
	pub texture_compression_bc: bool,
	pub texture_cube_array: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct GraphicsDeviceLimits {
	pub max_texture_dimension_1d: u32,
	pub max_texture_dimension_2d: u32,
	pub max_texture_dimension_3d: u32,
	pub max_texture_dimension_cube: u32,
	pub max_texture_array_layers: u32,
	pub max_color_attachments: u32,
	pub max_uniform_buffer_range: u32,
	pub min_uniform_buffer_offset_alignment: u64,
	pub min_storage_buffer_offset_alignment: u64,
	pub max_compute_work_group_count: [u32; 3],
	pub max_compute_work_group_size: [u32; 3],
	pub max_compute_work_group_invocations: u32,
}

impl GraphicsDeviceLimits {
	/// Limits every supported backend guarantees, matching Direct3D 11 hardware.
	pub const MINIMUM: Self = Self {
		max_texture_dimension_1d: 16384,
		max_texture_dimension_2d: 16384,
		max_texture_dimension_3d: 2048,
		max_texture_dimension_cube: 16384,
		max_texture_array_layers: 2048,
		max_color_attachments: 8,
		max_uniform_buffer_range: 65536,
		min_uniform_buffer_offset_alignment: 256,
		min_storage_buffer_offset_alignment: 16,
		max_compute_work_group_count: [65535, 65535, 65535],
		max_compute_work_group_size: [1024, 1024, 64],
		max_compute_work_group_invocations: 1024,
	};
}

impl Default for GraphicsDeviceLimits {
	fn default() -> Self {
		Self::MINIMUM
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct GraphicsDeviceCaps {
	pub backend: BackendType,
	pub features: GraphicsDeviceFeatures,
	pub limits: GraphicsDeviceLimits,
}
