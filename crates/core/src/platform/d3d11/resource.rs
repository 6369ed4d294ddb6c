use crate::format::PixelFormat;
use crate::platform::d3d11::D3D11;
use crate::platform::dxgi::D3DError;
use crate::resource::{BufferDesc, BufferUsage, HeapType, TextureDesc, TextureType, TextureUsage};
use parking_lot::Mutex;
use smallvec::SmallVec;
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT, DXGI_SAMPLE_DESC};

impl BufferUsage {
	pub fn to_d3d11_bind_flags(&self) -> u32 {
		let mut out = D3D11_BIND_FLAG(0);
		if self.contains(BufferUsage::VERTEX) {
			out |= D3D11_BIND_VERTEX_BUFFER;
		}
		if self.contains(BufferUsage::INDEX) {
			out |= D3D11_BIND_INDEX_BUFFER;
		}
		if self.contains(BufferUsage::UNIFORM) {
			out |= D3D11_BIND_CONSTANT_BUFFER;
		}
		if self.contains(BufferUsage::STORAGE) {
			out |= D3D11_BIND_SHADER_RESOURCE | D3D11_BIND_UNORDERED_ACCESS;
		}
		out.0 as u32
	}
}

impl TextureUsage {
	pub fn to_d3d11_bind_flags(&self) -> u32 {
		let mut out = D3D11_BIND_FLAG(0);
		if self.contains(TextureUsage::SAMPLED) {
			out |= D3D11_BIND_SHADER_RESOURCE;
		}
		if self.contains(TextureUsage::STORAGE) {
			out |= D3D11_BIND_UNORDERED_ACCESS;
		}
		if self.contains(TextureUsage::COLOR_ATTACHMENT) {
			out |= D3D11_BIND_RENDER_TARGET;
		}
		if self.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT) {
			out |= D3D11_BIND_DEPTH_STENCIL;
		}
		out.0 as u32
	}
}

/// How the CPU reaches a buffer's memory.
enum BufferMapping {
	None,
	/// Dynamic buffers can only be mapped with discard, so writes go through a shadow copy that is uploaded whole.
	Dynamic(Mutex<Vec<u8>>),
	Staging,
}

pub struct D3D11Buffer {
	pub resource: ID3D11Resource,
	buffer: ID3D11Buffer,
	mapping: BufferMapping,
}

unsafe impl Send for D3D11Buffer {}
unsafe impl Sync for D3D11Buffer {}

impl D3D11Buffer {
	pub unsafe fn new(d3d11: &D3D11, desc: &BufferDesc) -> Result<Self, D3DError> {
		unsafe {
			let mut bind_flags = desc.usage.to_d3d11_bind_flags();
			let mut misc_flags = 0;
			if desc.usage.contains(BufferUsage::STORAGE) {
				misc_flags |= D3D11_RESOURCE_MISC_BUFFER_ALLOW_RAW_VIEWS.0 as u32;
			}
			if desc.usage.contains(BufferUsage::INDIRECT) {
				misc_flags |= D3D11_RESOURCE_MISC_DRAWINDIRECT_ARGS.0 as u32;
			}
			let mut size = desc.size;
			if desc.usage.contains(BufferUsage::UNIFORM) {
				size = size.next_multiple_of(16);
			}

			let (usage, cpu_access, mapping) = match desc.heap_type() {
				HeapType::Default => (D3D11_USAGE_DEFAULT, 0, BufferMapping::None),
				HeapType::Upload if bind_flags != 0 => (
					D3D11_USAGE_DYNAMIC,
					D3D11_CPU_ACCESS_WRITE.0 as u32,
					BufferMapping::Dynamic(Mutex::new(vec![0; size as usize])),
				),
				HeapType::Upload => (D3D11_USAGE_STAGING, D3D11_CPU_ACCESS_WRITE.0 as u32, BufferMapping::Staging),
				HeapType::Readback => (D3D11_USAGE_STAGING, D3D11_CPU_ACCESS_READ.0 as u32, BufferMapping::Staging),
			};
			if usage == D3D11_USAGE_STAGING {
				bind_flags = 0;
				misc_flags = 0;
			}

			let mut buffer = None;
			d3d11.device.CreateBuffer(
				&D3D11_BUFFER_DESC {
					ByteWidth: size as u32,
					Usage: usage,
					BindFlags: bind_flags,
					CPUAccessFlags: cpu_access,
					MiscFlags: misc_flags,
					StructureByteStride: 0,
				},
				None,
				Some(&mut buffer),
			)?;
			let buffer: ID3D11Buffer = buffer.ok_or(D3DError::NoObject("CreateBuffer"))?;
			Ok(Self {
				resource: buffer.cast()?,
				buffer,
				mapping,
			})
		}
	}

	unsafe fn map<R>(&self, d3d11: &D3D11, map_type: D3D11_MAP, f: impl FnOnce(*mut u8) -> R) -> Result<R, D3DError> {
		unsafe {
			let immediate = d3d11.immediate_context();
			let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
			immediate.Map(&self.buffer, 0, map_type, 0, Some(&mut mapped))?;
			let result = f(mapped.pData.cast::<u8>());
			immediate.Unmap(&self.buffer, 0);
			Ok(result)
		}
	}

	pub unsafe fn write(&self, d3d11: &D3D11, offset: u64, data: &[u8]) -> Result<(), D3DError> {
		unsafe {
			match &self.mapping {
				BufferMapping::Dynamic(shadow) => {
					let mut shadow = shadow.lock();
					shadow[offset as usize..offset as usize + data.len()].copy_from_slice(data);
					self.map(d3d11, D3D11_MAP_WRITE_DISCARD, |ptr| {
						std::ptr::copy_nonoverlapping(shadow.as_ptr(), ptr, shadow.len())
					})
				}
				BufferMapping::Staging => self.map(d3d11, D3D11_MAP_WRITE, |ptr| {
					std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset as usize), data.len())
				}),
				BufferMapping::None => Err(D3DError::MapFailed),
			}
		}
	}

	pub unsafe fn read(&self, d3d11: &D3D11, offset: u64, out: &mut [u8]) -> Result<(), D3DError> {
		unsafe {
			match &self.mapping {
				BufferMapping::Staging => self.map(d3d11, D3D11_MAP_READ, |ptr| {
					std::ptr::copy_nonoverlapping(ptr.add(offset as usize).cast_const(), out.as_mut_ptr(), out.len())
				}),
				BufferMapping::Dynamic(_) | BufferMapping::None => Err(D3DError::MapFailed),
			}
		}
	}
}

/// Views of a single subresource, indexed by [`D3D11Texture::subresource_index`].
enum AttachmentViews {
	None,
	RenderTarget(SmallVec<[ID3D11RenderTargetView; 1]>),
	DepthStencil(SmallVec<[ID3D11DepthStencilView; 1]>),
}

pub struct D3D11Texture {
	pub resource: ID3D11Resource,
	pub mip_levels: u32,
	views: AttachmentViews,
}

unsafe impl Send for D3D11Texture {}
unsafe impl Sync for D3D11Texture {}

impl D3D11Texture {
	pub unsafe fn new(d3d11: &D3D11, desc: &TextureDesc) -> Result<Self, D3DError> {
		unsafe {
			let info = desc.info();
			let format = info.format.to_dxgi_format();
			let bind_flags = info.usage.to_d3d11_bind_flags();
			let unsupported = |e: windows::core::Error| match e.code() {
				windows::Win32::Foundation::E_INVALIDARG => D3DError::UnsupportedFormat(info.format),
				_ => e.into(),
			};
			let resource: ID3D11Resource = match info.texture_type {
				TextureType::Texture1D => {
					let mut texture = None;
					d3d11
						.device
						.CreateTexture1D(
							&D3D11_TEXTURE1D_DESC {
								Width: info.width,
								MipLevels: info.mip_levels,
								ArraySize: info.array_layers,
								Format: format,
								Usage: D3D11_USAGE_DEFAULT,
								BindFlags: bind_flags,
								CPUAccessFlags: 0,
								MiscFlags: 0,
							},
							None,
							Some(&mut texture),
						)
						.map_err(unsupported)?;
					texture.ok_or(D3DError::NoObject("CreateTexture1D"))?.cast()?
				}
				TextureType::Texture2D | TextureType::TextureCube => {
					let misc_flags = if info.texture_type == TextureType::TextureCube {
						D3D11_RESOURCE_MISC_TEXTURECUBE.0 as u32
					} else {
						0
					};
					let mut texture = None;
					d3d11
						.device
						.CreateTexture2D(
							&D3D11_TEXTURE2D_DESC {
								Width: info.width,
								Height: info.height,
								MipLevels: info.mip_levels,
								ArraySize: info.array_layers,
								Format: format,
								SampleDesc: DXGI_SAMPLE_DESC {
									Count: info.sample_count,
									Quality: 0,
								},
								Usage: D3D11_USAGE_DEFAULT,
								BindFlags: bind_flags,
								CPUAccessFlags: 0,
								MiscFlags: misc_flags,
							},
							None,
							Some(&mut texture),
						)
						.map_err(unsupported)?;
					texture.ok_or(D3DError::NoObject("CreateTexture2D"))?.cast()?
				}
				TextureType::Texture3D => {
					let mut texture = None;
					d3d11
						.device
						.CreateTexture3D(
							&D3D11_TEXTURE3D_DESC {
								Width: info.width,
								Height: info.height,
								Depth: info.depth,
								MipLevels: info.mip_levels,
								Format: format,
								Usage: D3D11_USAGE_DEFAULT,
								BindFlags: bind_flags,
								CPUAccessFlags: 0,
								MiscFlags: 0,
							},
							None,
							Some(&mut texture),
						)
						.map_err(unsupported)?;
					texture.ok_or(D3DError::NoObject("CreateTexture3D"))?.cast()?
				}
			};

			let mut texture = Self {
				resource,
				mip_levels: info.mip_levels,
				views: AttachmentViews::None,
			};
			if info.usage.is_attachment() {
				texture.create_attachment_views(
					d3d11,
					info.format,
					info.texture_type,
					info.sample_count > 1,
					info.array_layers,
				)?;
			}
			Ok(texture)
		}
	}

	pub unsafe fn from_backbuffer(d3d11: &D3D11, buffer: ID3D11Texture2D, format: PixelFormat) -> Result<Self, D3DError> {
		unsafe {
			let mut texture = Self {
				resource: buffer.cast()?,
				mip_levels: 1,
				views: AttachmentViews::None,
			};
			texture.create_attachment_views(d3d11, format, TextureType::Texture2D, false, 1)?;
			Ok(texture)
		}
	}

	unsafe fn create_attachment_views(
		&mut self,
		d3d11: &D3D11,
		format: PixelFormat,
		texture_type: TextureType,
		multisampled: bool,
		array_layers: u32,
	) -> Result<(), D3DError> {
		unsafe {
			let dxgi_format = format.to_dxgi_format();
			if format.is_depth_stencil() {
				let mut views = SmallVec::new();
				for array_layer in 0..array_layers {
					for mip_level in 0..self.mip_levels {
						let desc = dsv_desc(dxgi_format, texture_type, multisampled, mip_level, array_layer);
						let mut view = None;
						d3d11
							.device
							.CreateDepthStencilView(&self.resource, Some(&desc), Some(&mut view))?;
						views.push(view.ok_or(D3DError::NoObject("CreateDepthStencilView"))?);
					}
				}
				self.views = AttachmentViews::DepthStencil(views);
			} else {
				let mut views = SmallVec::new();
				for array_layer in 0..array_layers {
					for mip_level in 0..self.mip_levels {
						let desc = rtv_desc(dxgi_format, texture_type, multisampled, mip_level, array_layer);
						let mut view = None;
						d3d11
							.device
							.CreateRenderTargetView(&self.resource, Some(&desc), Some(&mut view))?;
						views.push(view.ok_or(D3DError::NoObject("CreateRenderTargetView"))?);
					}
				}
				self.views = AttachmentViews::RenderTarget(views);
			}
			Ok(())
		}
	}

	pub fn subresource_index(&self, mip_level: u32, array_layer: u32) -> usize {
		(mip_level + array_layer * self.mip_levels) as usize
	}

	pub fn render_target_view(&self, mip_level: u32, array_layer: u32) -> Option<ID3D11RenderTargetView> {
		match &self.views {
			AttachmentViews::RenderTarget(views) => views.get(self.subresource_index(mip_level, array_layer)).cloned(),
			_ => None,
		}
	}

	pub fn depth_stencil_view(&self, mip_level: u32, array_layer: u32) -> Option<ID3D11DepthStencilView> {
		match &self.views {
			AttachmentViews::DepthStencil(views) => views.get(self.subresource_index(mip_level, array_layer)).cloned(),
			_ => None,
		}
	}
}

fn rtv_desc(
	format: DXGI_FORMAT,
	texture_type: TextureType,
	multisampled: bool,
	mip_level: u32,
	array_layer: u32,
) -> D3D11_RENDER_TARGET_VIEW_DESC {
	let (dimension, anonymous) = match (texture_type, multisampled) {
		(TextureType::Texture1D, _) => (
			D3D11_RTV_DIMENSION_TEXTURE1DARRAY,
			D3D11_RENDER_TARGET_VIEW_DESC_0 {
				Texture1DArray: D3D11_TEX1D_ARRAY_RTV {
					MipSlice: mip_level,
					FirstArraySlice: array_layer,
					ArraySize: 1,
				},
			},
		),
		(TextureType::Texture3D, _) => (
			D3D11_RTV_DIMENSION_TEXTURE3D,
			D3D11_RENDER_TARGET_VIEW_DESC_0 {
				Texture3D: D3D11_TEX3D_RTV {
					MipSlice: mip_level,
					FirstWSlice: 0,
					WSize: u32::MAX,
				},
			},
		),
		(_, true) => (
			D3D11_RTV_DIMENSION_TEXTURE2DMSARRAY,
			D3D11_RENDER_TARGET_VIEW_DESC_0 {
				Texture2DMSArray: D3D11_TEX2DMS_ARRAY_RTV {
					FirstArraySlice: array_layer,
					ArraySize: 1,
				},
			},
		),
		(_, false) => (
			D3D11_RTV_DIMENSION_TEXTURE2DARRAY,
			D3D11_RENDER_TARGET_VIEW_DESC_0 {
				Texture2DArray: D3D11_TEX2D_ARRAY_RTV {
					MipSlice: mip_level,
					FirstArraySlice: array_layer,
					ArraySize: 1,
				},
			},
		),
	};
	D3D11_RENDER_TARGET_VIEW_DESC {
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
) -> D3D11_DEPTH_STENCIL_VIEW_DESC {
	let (dimension, anonymous) = match (texture_type, multisampled) {
		(TextureType::Texture1D, _) => (
			D3D11_DSV_DIMENSION_TEXTURE1DARRAY,
			D3D11_DEPTH_STENCIL_VIEW_DESC_0 {
				Texture1DArray: D3D11_TEX1D_ARRAY_DSV {
					MipSlice: mip_level,
					FirstArraySlice: array_layer,
					ArraySize: 1,
				},
			},
		),
		(_, true) => (
			D3D11_DSV_DIMENSION_TEXTURE2DMSARRAY,
			D3D11_DEPTH_STENCIL_VIEW_DESC_0 {
				Texture2DMSArray: D3D11_TEX2DMS_ARRAY_DSV {
					FirstArraySlice: array_layer,
					ArraySize: 1,
				},
			},
		),
		(_, false) => (
			D3D11_DSV_DIMENSION_TEXTURE2DARRAY,
			D3D11_DEPTH_STENCIL_VIEW_DESC_0 {
				Texture2DArray: D3D11_TEX2D_ARRAY_DSV {
					MipSlice: mip_level,
					FirstArraySlice: array_layer,
					ArraySize: 1,
				},
			},
		),
	};
	D3D11_DEPTH_STENCIL_VIEW_DESC {
		Format: format,
		ViewDimension: dimension,
		Flags: 0,
		Anonymous: anonymous,
	}
}
