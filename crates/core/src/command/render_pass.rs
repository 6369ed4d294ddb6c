use crate::platform::Platform;
use crate::resource::{Texture, TextureUsage};
use glam::{UVec2, Vec4};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Color {
	pub r: f32,
	pub g: f32,
	pub b: f32,
	pub a: f32,
}

impl Color {
	pub const TRANSPARENT: Self = Self::new(0., 0., 0., 0.);
	pub const BLACK: Self = Self::new(0., 0., 0., 1.);
	pub const WHITE: Self = Self::new(1., 1., 1., 1.);
	pub const CORNFLOWER_BLUE: Self = Self::new(100. / 255., 149. / 255., 237. / 255., 1.);

	pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
		Self { r, g, b, a }
	}

	pub const fn to_array(self) -> [f32; 4] {
		[self.r, self.g, self.b, self.a]
	}
}

impl From<Vec4> for Color {
	fn from(value: Vec4) -> Self {
		Self::new(value.x, value.y, value.z, value.w)
	}
}

impl From<Color> for Vec4 {
	fn from(value: Color) -> Self {
		Vec4::from_array(value.to_array())
	}
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum LoadAction {
	#[default]
	Clear,
	Load,
	/// Previous contents are undefined.
	Discard,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum StoreAction {
	#[default]
	Store,
	Discard,
}

pub struct ColorAttachment<'a, P: Platform> {
	pub texture: &'a Texture<P>,
	pub mip_level: u32,
	pub array_layer: u32,
	pub load_action: LoadAction,
	pub store_action: StoreAction,
	pub clear_color: Color,
}

impl<'a, P: Platform> ColorAttachment<'a, P> {
	/// Clear to black and store.
	pub fn new(texture: &'a Texture<P>) -> Self {
		Self {
			texture,
			mip_level: 0,
			array_layer: 0,
			load_action: LoadAction::Clear,
			store_action: StoreAction::Store,
			clear_color: Color::BLACK,
		}
	}
}

pub struct DepthStencilAttachment<'a, P: Platform> {
	pub texture: &'a Texture<P>,
	pub mip_level: u32,
	pub array_layer: u32,
	pub depth_load_action: LoadAction,
	pub depth_store_action: StoreAction,
	pub stencil_load_action: LoadAction,
	pub stencil_store_action: StoreAction,
	pub clear_depth: f32,
	pub clear_stencil: u8,
}

impl<'a, P: Platform> DepthStencilAttachment<'a, P> {
	/// Clear depth to 1.0 and discard stencil.
	pub fn new(texture: &'a Texture<P>) -> Self {
		Self {
			texture,
			mip_level: 0,
			array_layer: 0,
			depth_load_action: LoadAction::Clear,
			depth_store_action: StoreAction::Store,
			stencil_load_action: LoadAction::Discard,
			stencil_store_action: StoreAction::Discard,
			clear_depth: 1.,
			clear_stencil: 0,
		}
	}
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct RenderArea {
	pub offset: UVec2,
	pub extent: UVec2,
}

pub struct RenderPassDesc<'a, P: Platform> {
	pub color_attachments: &'a [ColorAttachment<'a, P>],
	pub depth_stencil_attachment: Option<DepthStencilAttachment<'a, P>>,
	/// Defaults to the entire area shared by all attachments.
	pub render_area: Option<RenderArea>,
}

impl<'a, P: Platform> RenderPassDesc<'a, P> {
	pub fn textures(&self) -> impl Iterator<Item = &'a Texture<P>> + '_ {
		self.color_attachments
			.iter()
			.map(|a| a.texture)
			.chain(self.depth_stencil_attachment.as_ref().map(|a| a.texture))
	}

	/// Validates all attachments and returns the area to render into. Panics on any misuse.
	pub(crate) fn resolve_render_area(&self, max_color_attachments: u32) -> RenderArea {
		assert!(
			!self.color_attachments.is_empty() || self.depth_stencil_attachment.is_some(),
			"RenderPassDesc must have at least one attachment"
		);
		assert!(
			self.color_attachments.len() <= max_color_attachments as usize,
			"RenderPassDesc has {} color attachments, device supports at most {}",
			self.color_attachments.len(),
			max_color_attachments
		);

		let mut extent = UVec2::MAX;
		let mut include = |texture: &Texture<P>, mip_level: u32, array_layer: u32| {
			assert!(
				mip_level < texture.mip_levels() && array_layer < texture.array_layers(),
				"attachment mip {} layer {} out of range for {:?}",
				mip_level,
				array_layer,
				texture
			);
			extent = extent.min(UVec2::new(texture.width(mip_level), texture.height(mip_level)));
		};
		for attachment in self.color_attachments {
			assert!(
				attachment.texture.usage().contains(TextureUsage::COLOR_ATTACHMENT),
				"color attachment {:?} was not created with COLOR_ATTACHMENT usage",
				attachment.texture
			);
			include(attachment.texture, attachment.mip_level, attachment.array_layer);
		}
		if let Some(attachment) = &self.depth_stencil_attachment {
			assert!(
				attachment.texture.usage().contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT),
				"depth stencil attachment {:?} was not created with DEPTH_STENCIL_ATTACHMENT usage",
				attachment.texture
			);
			include(attachment.texture, attachment.mip_level, attachment.array_layer);
		}

		match self.render_area {
			None => RenderArea {
				offset: UVec2::ZERO,
				extent,
			},
			Some(area) => {
				assert!(
					area.offset.saturating_add(area.extent).cmple(extent).all(),
					"render area {:?} exceeds the attachments' extent {}",
					area,
					extent
				);
				area
			}
		}
	}
}
