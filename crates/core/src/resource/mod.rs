mod buffer;
mod graphics_resource;
mod swap_chain;
mod texture;

pub use buffer::*;
pub use graphics_resource::*;
pub use swap_chain::*;
pub use texture::*;
