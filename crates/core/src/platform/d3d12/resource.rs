use crate::format::PixelFormat;
use crate::platform::d3d12::D3D12;
use crate::platform::dxgi::D3DError;
use crate::resource::{BufferDesc, BufferUsage, HeapType, TextureDesc, TextureType, TextureUsage};
use std::ffi::c_void;
use std::ptr::NonNull;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT, DXGI_FORMAT_UNKNOWN, DXGI_SAMPLE_DESC};

impl HeapType {
	pub fn to_d3d12_heap_type(&self) -> D3D12_HEAP_TYPE {
		match self {
			HeapType::Default => D3D12_HEAP_TYPE_DEFAULT,
			HeapType::Upload => D3D12_HEAP_TYPE_UPLOAD,
			HeapType::Readback => D3D12_HEAP_TYPE_READBACK,
		}
	}

	/// Upload and readback heaps can never leave these states.
	pub fn d3d12_initial_state(&self) -> D3D12_RESOURCE_STATES {
		match self {
			HeapType::Default => D3D12_RESOURCE_STATE_COMMON,
			HeapType::Upload => D3D12_RESOURCE_STATE_GENERIC_READ,
			HeapType::Readback => D3D12_RESOURCE_STATE_COPY_DEST,
		}
	}
}

impl TextureUsage {
	pub fn to_d3d12_resource_flags(&self) -> D3D12_RESOURCE_FLAGS {
		let mut out = D3D12_RESOURCE_FLAG_NONE;
		if self.contains(TextureUsage::COLOR_ATTACHMENT) {
			out |= D3D12_RESOURCE_FLAG_ALLOW_RENDER_TARGET;
		}
		if self.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT) {
			out |= D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL;
			if !self.contains(TextureUsage::SAMPLED) {
				out |= D3D12_RESOURCE_FLAG_DENY_SHADER_RESOURCE;
			}
		}
		if self.contains(TextureUsage::STORAGE) {
			out |= D3D12_RESOURCE_FLAG_ALLOW_UNORDERED_ACCESS;
		}
		out
	}
}

fn heap_properties(heap_type: HeapType) -> D3D12_HEAP_PROPERTIES {
	D3D12_HEAP_PROPERTIES {
		Type: heap_type.to_d3d12_heap_type(),
		..Default::default()
	}
}

pub struct D3D12Buffer {
	pub resource: ID3D12Resource,
	/// persistently mapped for upload and readback heaps
	mapped: Option<NonNull<u8>>,
}

unsafe impl Send for D3D12Buffer {}
unsafe impl Sync for D3D12Buffer {}

impl D3D12Buffer {
	pub unsafe fn new(d3d12: &D3D12, desc: &BufferDesc) -> Result<Self, D3DError> {
		unsafe {
			let heap_type = desc.heap_type();
			let flags = if desc.usage.contains(BufferUsage::STORAGE) {
				D3D12_RESOURCE_FLAG_ALLOW_UNORDERED_ACCESS
			} else {
				D3D12_RESOURCE_FLAG_NONE
			};
			let width = if desc.usage.contains(BufferUsage::UNIFORM) {
				desc.size.next_multiple_of(D3D12_CONSTANT_BUFFER_DATA_PLACEMENT_ALIGNMENT as u64)
			} else {
				desc.size
			};
			let mut resource: Option<ID3D12Resource> = None;
			d3d12.device.CreateCommittedResource(
				&heap_properties(heap_type),
				D3D12_HEAP_FLAG_NONE,
				&D3D12_RESOURCE_DESC {
					Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
					Alignment: 0,
					Width: width,
					Height: 1,
					DepthOrArraySize: 1,
					MipLevels: 1,
					Format: DXGI_FORMAT_UNKNOWN,
					SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
					Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
					Flags: flags,
				},
				heap_type.d3d12_initial_state(),
				None,
				&mut resource,
			)?;
			let resource = resource.ok_or(D3DError::NoObject("CreateCommittedResource"))?;

			let mapped = if heap_type.is_cpu_accessible() {
				let mut ptr: *mut c_void = std::ptr::null_mut();
				// the empty read range tells the driver the CPU won't read upload heaps
				let read_range = D3D12_RANGE { Begin: 0, End: 0 };
				let read_range = (heap_type == HeapType::Upload).then_some(&read_range as *const _);
				resource.Map(0, read_range, Some(&mut ptr))?;
				Some(NonNull::new(ptr.cast::<u8>()).ok_or(D3DError::MapFailed)?)
			} else {
				None
			};
			Ok(Self { resource, mapped })
		}
	}

	pub unsafe fn write(&self, offset: u64, data: &[u8]) -> Result<(), D3DError> {
		unsafe {
			let ptr = self.mapped.ok_or(D3DError::MapFailed)?;
			std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr().add(offset as usize), data.len());
			Ok(())
		}
	}

	pub unsafe fn read(&self, offset: u64, out: &mut [u8]) -> Result<(), D3DError> {
		unsafe {
			let ptr = self.mapped.ok_or(D3DError::MapFailed)?;
			std::ptr::copy_nonoverlapping(ptr.as_ptr().add(offset as usize).cast_const(), out.as_mut_ptr(), out.len());
			Ok(())
		}
	}
}

impl Drop for D3D12Buffer {
	fn drop(&mut self) {
		if self.mapped.is_some() {
			unsafe { self.resource.Unmap(0, None) };
		}
	}
}

pub struct D3D12Texture {
	pub resource: ID3D12Resource,
	pub mip_levels: u32,
	pub array_layers: u32,
	/// One RTV or DSV per subresource if the texture is an attachment
	descriptor_heap: Option<ID3D12DescriptorHeap>,
	descriptor_size: u32,
}

unsafe impl Send for D3D12Texture {}
unsafe impl Sync for D3D12Texture {}

impl D3D12Texture {
	pub unsafe fn new(d3d12: &D3D12, desc: &TextureDesc) -> Result<Self, D3DError> {
		unsafe {
			let info = desc.info();
			let format = info.format.to_dxgi_format();
			let (dimension, depth_or_array_size) = match info.texture_type {
				TextureType::Texture1D => (D3D12_RESOURCE_DIMENSION_TEXTURE1D, info.array_layers),
				TextureType::Texture2D | TextureType::TextureCube => {
					(D3D12_RESOURCE_DIMENSION_TEXTURE2D, info.array_layers)
				}
				TextureType::Texture3D => (D3D12_RESOURCE_DIMENSION_TEXTURE3D, info.depth),
			};
			let mut resource: Option<ID3D12Resource> = None;
			let created = d3d12.device.CreateCommittedResource(
				&heap_properties(HeapType::Default),
				D3D12_HEAP_FLAG_NONE,
				&D3D12_RESOURCE_DESC {
					Dimension: dimension,
					Alignment: 0,
					Width: info.width as u64,
					Height: info.height,
					DepthOrArraySize: depth_or_array_size as u16,
					MipLevels: info.mip_levels as u16,
					Format: format,
					SampleDesc: DXGI_SAMPLE_DESC {
						Count: info.sample_count,
						Quality: 0,
					},
					Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
					Flags: info.usage.to_d3d12_resource_flags(),
				},
				D3D12_RESOURCE_STATE_COMMON,
				None,
				&mut resource,
			);
			if let Err(e) = created {
				return Err(match e.code() {
					windows::Win32::Foundation::E_INVALIDARG => D3DError::UnsupportedFormat(info.format),
					_ => e.into(),
				});
			}
			let resource = resource.ok_or(D3DError::NoObject("CreateCommittedResource"))?;

			let mut texture = Self {
				resource,
				mip_levels: info.mip_levels,
				array_layers: info.array_layers,
				descriptor_heap: None,
				descriptor_size: 0,
			};
			if info.usage.is_attachment() {
				texture.create_attachment_views(d3d12, info.format, info.texture_type, info.sample_count > 1)?;
			}
			Ok(texture)
		}
	}

	/// Wrap a swap chain buffer, viewed as `format` which may be the srgb variant of the buffer's format.
	pub unsafe fn from_backbuffer(
		d3d12: &D3D12,
		resource: ID3D12Resource,
		format: PixelFormat,
	) -> Result<Self, D3DError> {
		unsafe {
			let mut texture = Self {
				resource,
				mip_levels: 1,
				array_layers: 1,
				descriptor_heap: None,
				descriptor_size: 0,
			};
			texture.create_attachment_views(d3d12, format, TextureType::Texture2D, false)?;
			Ok(texture)
		}
	}

	unsafe fn create_attachment_views(
		&mut self,
		d3d12: &D3D12,
		format: PixelFormat,
		texture_type: TextureType,
		multisampled: bool,
	) -> Result<(), D3DError> {
		unsafe {
			let depth_stencil = format.is_depth_stencil();
			let heap_type = if depth_stencil {
				D3D12_DESCRIPTOR_HEAP_TYPE_DSV
			} else {
				D3D12_DESCRIPTOR_HEAP_TYPE_RTV
			};
			let heap: ID3D12DescriptorHeap = d3d12.device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
				Type: heap_type,
				NumDescriptors: self.mip_levels * self.array_layers,
				Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
				NodeMask: 0,
			})?;
			self.descriptor_size = d3d12.device.GetDescriptorHandleIncrementSize(heap_type);
			self.descriptor_heap = Some(heap);

			let dxgi_format = format.to_dxgi_format();
			for array_layer in 0..self.array_layers {
				for mip_level in 0..self.mip_levels {
					let handle = self.attachment_view(mip_level, array_layer);
					if depth_stencil {
						let desc = dsv_desc(dxgi_format, texture_type, multisampled, mip_level, array_layer);
						d3d12.device.CreateDepthStencilView(&self.resource, Some(&desc), handle);
					} else {
						let desc = rtv_desc(dxgi_format, texture_type, multisampled, mip_level, array_layer);
						d3d12.device.CreateRenderTargetView(&self.resource, Some(&desc), handle);
					}
				}
			}
			Ok(())
		}
	}

	pub fn subresource_index(&self, mip_level: u32, array_layer: u32) -> u32 {
		mip_level + array_layer * self.mip_levels
	}

	/// The RTV or DSV of a subresource. Only valid on textures with attachment usage.
	pub fn attachment_view(&self, mip_level: u32, array_layer: u32) -> D3D12_CPU_DESCRIPTOR_HANDLE {
		let start = self
			.descriptor_heap
			.as_ref()
			.map_or(D3D12_CPU_DESCRIPTOR_HANDLE::default(), |heap| unsafe {
				heap.GetCPUDescriptorHandleForHeapStart()
			});
		let index = self.subresource_index(mip_level, array_layer) as usize;
		D3D12_CPU_DESCRIPTOR_HANDLE {
			ptr: start.ptr + index * self.descriptor_size as usize,
		}
	}
}

fn rtv_desc(
	format: DXGI_FORMAT,
	texture_type: TextureType,
	multisampled: bool,
	mip_level: u32,
	array_layer: u32,
) -> D3D12_RENDER_TARGET_VIEW_DESC {
	let (dimension, anonymous) = match (texture_type, multisampled) {
		(TextureType::Texture1D, _) => (
			D3D12_RTV_DIMENSION_TEXTURE1DARRAY,
			D3D12_RENDER_TARGET_VIEW_DESC_0 {
				Texture1DArray: D3D12_TEX1D_ARRAY_RTV {
					MipSlice: mip_level,
					FirstArraySlice: array_layer,
					ArraySize: 1,
				},
			},
		),
		(TextureType::Texture3D, _) => (
			D3D12_RTV_DIMENSION_TEXTURE3D,
			D3D12_RENDER_TARGET_VIEW_DESC_0 {
				Texture3D: D3D12_TEX3D_RTV {
					MipSlice: mip_level,
					FirstWSlice: 0,
					WSize: u32::MAX,
				},
			},
		),
		(_, true) => (
			D3D12_RTV_DIMENSION_TEXTURE2DMSARRAY,
			D3D12_RENDER_TARGET_VIEW_DESC_0 {
				Texture2DMSArray: D3D12_TEX2DMS_ARRAY_RTV {
					FirstArraySlice: array_layer,
					ArraySize: 1,
				},
			},
		),
		(_, false) => (
			D3D12_RTV_DIMENSION_TEXTURE2DARRAY,
			D3D12_RENDER_TARGET_VIEW_DESC_0 {
				Texture2DArray: D3D12_TEX2D_ARRAY_RTV {
					MipSlice: mip_level,
					FirstArraySlice: array_layer,
					ArraySize: 1,
					PlaneSlice: 0,
				},
			},
		),
	};
	D3D12_RENDER_TARGET_VIEW_DESC {
		Format: format,
		ViewDimension: dimension,
		Anonymous: anonymous,
	}
}

fn dsv_desc(
	format: DXGI_FORMAT,
	texture_type: TextureType,
	multisampled: bool,
	mip_level: u32,
	array_layer: u32,
) -> D3D12_DEPTH_STENCIL_VIEW_DESC {
	let (dimension, anonymous) = match (texture_type, multisampled) {
		(TextureType::Texture1D, _) => (
			D3D12_DSV_DIMENSION_TEXTURE1DARRAY,
			D3D12_DEPTH_STENCIL_VIEW_DESC_0 {
				Texture1DArray: D3D12_TEX1D_ARRAY_DSV {
					MipSlice: mip_level,
					FirstArraySlice: array_layer,
					ArraySize: 1,
				},
			},
		),
		(_, true) => (
			D3D12_DSV_DIMENSION_TEXTURE2DMSARRAY,
			D3D12_DEPTH_STENCIL_VIEW_DESC_0 {
				Texture2DMSArray: D3D12_TEX2DMS_ARRAY_DSV {
					FirstArraySlice: array_layer,
					ArraySize: 1,
				},
			},
		),
		(_, false) => (
			D3D12_DSV_DIMENSION_TEXTURE2DARRAY,
			D3D12_DEPTH_STENCIL_VIEW_DESC_0 {
				Texture2DArray: D3D12_TEX2D_ARRAY_DSV {
					MipSlice: mip_level,
					FirstArraySlice: array_layer,
					ArraySize: 1,
				},
			},
		),
	};
	D3D12_DEPTH_STENCIL_VIEW_DESC {
		Format: format,
		ViewDimension: dimension,
		Flags: D3D12_DSV_FLAG_NONE,
		Anonymous: anonymous,
	}
}
