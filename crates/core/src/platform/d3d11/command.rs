use crate::command::{Color, LoadAction, QueueType, RenderArea, RenderPassDesc};
use crate::platform::d3d11::D3D11;
use crate::platform::dxgi::D3DError;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, Ordering};
use windows::Win32::Foundation::{BOOL, RECT};
use windows::Win32::Graphics::Direct3D11::*;

/// Emulates a fence with one event query per submission, completed in submission order.
pub struct D3D11Queue {
	queue_type: QueueType,
	pending: Mutex<VecDeque<(u64, ID3D11Query)>>,
	completed: AtomicU64,
}

unsafe impl Send for D3D11Queue {}
unsafe impl Sync for D3D11Queue {}

impl D3D11Queue {
	pub fn new(queue_type: QueueType, initial_fence_value: u64) -> Self {
		Self {
			queue_type,
			pending: Mutex::new(VecDeque::new()),
			completed: AtomicU64::new(initial_fence_value - 1),
		}
	}

	pub fn queue_type(&self) -> QueueType {
		self.queue_type
	}

	pub unsafe fn submit(&self, d3d11: &D3D11, cmd: &mut D3D11CommandBuffer, fence_value: u64) -> Result<(), D3DError> {
		profiling::function_scope!();
		unsafe {
			let list = cmd.finish()?;
			let mut query = None;
			d3d11.device.CreateQuery(
				&D3D11_QUERY_DESC {
					Query: D3D11_QUERY_EVENT,
					MiscFlags: 0,
				},
				Some(&mut query),
			)?;
			let query = query.ok_or(D3DError::NoObject("CreateQuery"))?;
			let immediate = d3d11.immediate_context();
			immediate.ExecuteCommandList(&list, false);
			immediate.End(&query);
			self.pending.lock().push_back((fence_value, query));
			Ok(())
		}
	}

	/// Poll the queries of all pending submissions.
	pub unsafe fn completed_fence_value(&self, d3d11: &D3D11) -> u64 {
		unsafe {
			let mut pending = self.pending.lock();
			let immediate = d3d11.immediate_context();
			while let Some((fence_value, query)) = pending.front() {
				let mut done = BOOL::default();
				let polled = immediate.GetData(
					query,
					Some(&mut done as *mut BOOL as *mut c_void),
					std::mem::size_of::<BOOL>() as u32,
					D3D11_ASYNC_GETDATA_DONOTFLUSH.0 as u32,
				);
				if polled.is_err() || !done.as_bool() {
					break;
				}
				self.completed.store(*fence_value, Ordering::Relaxed);
				pending.pop_front();
			}
			self.completed.load(Ordering::Relaxed)
		}
	}

	pub unsafe fn wait_for_fence_value(&self, d3d11: &D3D11, fence_value: u64) -> Result<(), D3DError> {
		profiling::function_scope!();
		unsafe {
			d3d11.immediate_context().Flush();
			while self.completed_fence_value(d3d11) < fence_value {
				if self.pending.lock().is_empty() {
					break;
				}
				std::thread::yield_now();
			}
			Ok(())
		}
	}
}

pub struct D3D11CommandBuffer {
	pub context: ID3D11DeviceContext,
}

unsafe impl Send for D3D11CommandBuffer {}
unsafe impl Sync for D3D11CommandBuffer {}

impl D3D11CommandBuffer {
	pub unsafe fn new(d3d11: &D3D11) -> Result<Self, D3DError> {
		unsafe {
			let mut context = None;
			d3d11.device.CreateDeferredContext(0, Some(&mut context))?;
			Ok(Self {
				context: context.ok_or(D3DError::NoObject("CreateDeferredContext"))?,
			})
		}
	}

	pub unsafe fn finish(&mut self) -> Result<ID3D11CommandList, D3DError> {
		unsafe {
			let mut list = None;
			self.context.FinishCommandList(false, Some(&mut list))?;
			list.ok_or(D3DError::NoObject("FinishCommandList"))
		}
	}

	/// Deferred contexts can not discard what they recorded, finish it into a list that is dropped.
	pub unsafe fn reset(&mut self) -> Result<(), D3DError> {
		unsafe {
			self.finish()?;
			Ok(())
		}
	}

	pub unsafe fn begin_render_pass(&mut self, desc: &RenderPassDesc<D3D11>, area: RenderArea) {
		unsafe {
			let rtvs = desc
				.color_attachments
				.iter()
				.map(|attachment| {
					attachment
						.texture
						.native()
						.render_target_view(attachment.mip_level, attachment.array_layer)
				})
				.collect::<SmallVec<[_; 1]>>();
			let dsv = desc.depth_stencil_attachment.as_ref().and_then(|attachment| {
				attachment
					.texture
					.native()
					.depth_stencil_view(attachment.mip_level, attachment.array_layer)
			});
			self.context.OMSetRenderTargets(Some(&rtvs), dsv.as_ref());

			for (attachment, rtv) in desc.color_attachments.iter().zip(&rtvs) {
				if let (LoadAction::Clear, Some(rtv)) = (attachment.load_action, rtv) {
					self.context.ClearRenderTargetView(rtv, &attachment.clear_color.to_array());
				}
			}
			if let (Some(attachment), Some(dsv)) = (desc.depth_stencil_attachment.as_ref(), dsv.as_ref()) {
				let mut flags = 0;
				if attachment.depth_load_action == LoadAction::Clear {
					flags |= D3D11_CLEAR_DEPTH.0 as u32;
				}
				if attachment.texture.format().is_stencil() && attachment.stencil_load_action == LoadAction::Clear {
					flags |= D3D11_CLEAR_STENCIL.0 as u32;
				}
				if flags != 0 {
					self.context
						.ClearDepthStencilView(dsv, flags, attachment.clear_depth, attachment.clear_stencil);
				}
			}

			self.context.RSSetViewports(Some(&[D3D11_VIEWPORT {
				TopLeftX: area.offset.x as f32,
				TopLeftY: area.offset.y as f32,
				Width: area.extent.x as f32,
				Height: area.extent.y as f32,
				MinDepth: 0.,
				MaxDepth: 1.,
			}]));
			self.context.RSSetScissorRects(Some(&[RECT {
				left: area.offset.x as i32,
				top: area.offset.y as i32,
				right: (area.offset.x + area.extent.x) as i32,
				bottom: (area.offset.y + area.extent.y) as i32,
			}]));
		}
	}

	pub unsafe fn end_render_pass(&mut self) {
		unsafe {
			self.context.OMSetRenderTargets(None, None);
		}
	}

	pub unsafe fn set_blend_color(&mut self, color: Color) {
		unsafe {
			self.context.OMSetBlendState(None, Some(&color.to_array()), u32::MAX);
		}
	}
}
