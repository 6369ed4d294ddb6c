use crate::command::{LoadAction, QueueType, RenderArea, RenderPassDesc};
use crate::platform::d3d12::{D3D12Texture, D3D12};
use crate::platform::dxgi::D3DError;
use smallvec::SmallVec;
use std::mem::ManuallyDrop;
use windows::core::Interface;
use windows::Win32::Foundation::{HANDLE, RECT};
use windows::Win32::Graphics::Direct3D12::*;

pub fn command_list_type(queue_type: QueueType) -> D3D12_COMMAND_LIST_TYPE {
	match queue_type {
		QueueType::Graphics => D3D12_COMMAND_LIST_TYPE_DIRECT,
		QueueType::Compute => D3D12_COMMAND_LIST_TYPE_COMPUTE,
		QueueType::Copy => D3D12_COMMAND_LIST_TYPE_COPY,
	}
}

pub struct D3D12Queue {
	queue_type: QueueType,
	pub queue: ID3D12CommandQueue,
	pub fence: ID3D12Fence,
}

unsafe impl Send for D3D12Queue {}
unsafe impl Sync for D3D12Queue {}

impl D3D12Queue {
	pub unsafe fn new(d3d12: &D3D12, queue_type: QueueType, initial_fence_value: u64) -> Result<Self, D3DError> {
		unsafe {
			let queue: ID3D12CommandQueue = d3d12.device.CreateCommandQueue(&D3D12_COMMAND_QUEUE_DESC {
				Type: command_list_type(queue_type),
				..Default::default()
			})?;
			let fence = d3d12
				.device
				.CreateFence(initial_fence_value - 1, D3D12_FENCE_FLAG_NONE)?;
			Ok(Self {
				queue_type,
				queue,
				fence,
			})
		}
	}

	pub fn queue_type(&self) -> QueueType {
		self.queue_type
	}

	pub unsafe fn submit(&self, cmd: &mut D3D12CommandBuffer, fence_value: u64) -> Result<(), D3DError> {
		profiling::function_scope!();
		unsafe {
			cmd.list.Close()?;
			self.queue.ExecuteCommandLists(&[Some(cmd.list.cast::<ID3D12CommandList>()?)]);
			self.queue.Signal(&self.fence, fence_value)?;
			Ok(())
		}
	}

	pub unsafe fn completed_fence_value(&self) -> u64 {
		unsafe { self.fence.GetCompletedValue() }
	}

	pub unsafe fn wait_for_fence_value(&self, fence_value: u64) -> Result<(), D3DError> {
		profiling::function_scope!();
		unsafe {
			if self.fence.GetCompletedValue() < fence_value {
				// a null event blocks until the fence is reached
				self.fence.SetEventOnCompletion(fence_value, HANDLE::default())?;
			}
			Ok(())
		}
	}
}

/// A transition barrier that does not hold a reference to the resource, the resource must outlive the barrier.
pub fn transition_barrier(
	resource: &ID3D12Resource,
	subresource: u32,
	before: D3D12_RESOURCE_STATES,
	after: D3D12_RESOURCE_STATES,
) -> D3D12_RESOURCE_BARRIER {
	D3D12_RESOURCE_BARRIER {
		Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
		Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
		Anonymous: D3D12_RESOURCE_BARRIER_0 {
			Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
				pResource: unsafe { std::mem::transmute_copy(resource) },
				Subresource: subresource,
				StateBefore: before,
				StateAfter: after,
			}),
		},
	}
}

struct OpenAttachment {
	resource: ID3D12Resource,
	subresource: u32,
	state: D3D12_RESOURCE_STATES,
}

pub struct D3D12CommandBuffer {
	allocator: ID3D12CommandAllocator,
	pub list: ID3D12GraphicsCommandList,
	open_attachments: SmallVec<[OpenAttachment; 2]>,
}

unsafe impl Send for D3D12CommandBuffer {}
unsafe impl Sync for D3D12CommandBuffer {}

impl D3D12CommandBuffer {
	pub unsafe fn new(d3d12: &D3D12, queue: &D3D12Queue) -> Result<Self, D3DError> {
		unsafe {
			let list_type = command_list_type(queue.queue_type());
			let allocator: ID3D12CommandAllocator = d3d12.device.CreateCommandAllocator(list_type)?;
			// created closed, unlike CreateCommandList
			let list: ID3D12GraphicsCommandList = d3d12.device.cast::<ID3D12Device4>()?.CreateCommandList1(
				0,
				list_type,
				D3D12_COMMAND_LIST_FLAG_NONE,
			)?;
			Ok(Self {
				allocator,
				list,
				open_attachments: SmallVec::new(),
			})
		}
	}

	pub unsafe fn begin(&mut self) -> Result<(), D3DError> {
		unsafe {
			self.list.Reset(&self.allocator, None)?;
			Ok(())
		}
	}

	pub unsafe fn reset(&mut self) -> Result<(), D3DError> {
		unsafe {
			self.open_attachments.clear();
			self.allocator.Reset()?;
			Ok(())
		}
	}

	fn barriers(&self, into_pass: bool) -> SmallVec<[D3D12_RESOURCE_BARRIER; 2]> {
		self.open_attachments
			.iter()
			.map(|open| {
				let (before, after) = if into_pass {
					(D3D12_RESOURCE_STATE_COMMON, open.state)
				} else {
					(open.state, D3D12_RESOURCE_STATE_COMMON)
				};
				transition_barrier(&open.resource, open.subresource, before, after)
			})
			.collect()
	}

	pub unsafe fn begin_render_pass(&mut self, desc: &RenderPassDesc<D3D12>, area: RenderArea) {
		unsafe {
			debug_assert!(self.open_attachments.is_empty());
			let mut rtvs = SmallVec::<[D3D12_CPU_DESCRIPTOR_HANDLE; 1]>::new();
			for attachment in desc.color_attachments {
				let texture: &D3D12Texture = attachment.texture.native();
				rtvs.push(texture.attachment_view(attachment.mip_level, attachment.array_layer));
				self.open_attachments.push(OpenAttachment {
					resource: texture.resource.clone(),
					subresource: texture.subresource_index(attachment.mip_level, attachment.array_layer),
					state: D3D12_RESOURCE_STATE_RENDER_TARGET,
				});
			}
			let dsv = desc.depth_stencil_attachment.as_ref().map(|attachment| {
				let texture: &D3D12Texture = attachment.texture.native();
				self.open_attachments.push(OpenAttachment {
					resource: texture.resource.clone(),
					subresource: texture.subresource_index(attachment.mip_level, attachment.array_layer),
					state: D3D12_RESOURCE_STATE_DEPTH_WRITE,
				});
				texture.attachment_view(attachment.mip_level, attachment.array_layer)
			});

			let barriers = self.barriers(true);
			self.list.ResourceBarrier(&barriers);
			self.list.OMSetRenderTargets(
				rtvs.len() as u32,
				Some(rtvs.as_ptr()),
				false,
				dsv.as_ref().map(|dsv| dsv as *const _),
			);

			let rect = RECT {
				left: area.offset.x as i32,
				top: area.offset.y as i32,
				right: (area.offset.x + area.extent.x) as i32,
				bottom: (area.offset.y + area.extent.y) as i32,
			};
			for (attachment, rtv) in desc.color_attachments.iter().zip(&rtvs) {
				if attachment.load_action == LoadAction::Clear {
					let color = attachment.clear_color.to_array();
					self.list.ClearRenderTargetView(*rtv, color.as_ptr(), Some(&[rect]));
				}
			}
			if let (Some(attachment), Some(dsv)) = (desc.depth_stencil_attachment.as_ref(), dsv) {
				let mut flags = D3D12_CLEAR_FLAGS(0);
				if attachment.depth_load_action == LoadAction::Clear {
					flags |= D3D12_CLEAR_FLAG_DEPTH;
				}
				if attachment.texture.format().is_stencil() && attachment.stencil_load_action == LoadAction::Clear {
					flags |= D3D12_CLEAR_FLAG_STENCIL;
				}
				if flags.0 != 0 {
					self.list
						.ClearDepthStencilView(dsv, flags, attachment.clear_depth, attachment.clear_stencil, &[rect]);
				}
			}

			self.list.RSSetViewports(&[D3D12_VIEWPORT {
				TopLeftX: area.offset.x as f32,
				TopLeftY: area.offset.y as f32,
				Width: area.extent.x as f32,
				Height: area.extent.y as f32,
				MinDepth: 0.,
				MaxDepth: 1.,
			}]);
			self.list.RSSetScissorRects(&[rect]);
		}
	}

	pub unsafe fn end_render_pass(&mut self) {
		unsafe {
			let barriers = self.barriers(false);
			self.list.ResourceBarrier(&barriers);
			self.open_attachments.clear();
		}
	}
}
