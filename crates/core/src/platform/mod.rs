mod backend;
#[cfg(all(windows, feature = "d3d11"))]
pub mod d3d11;
#[cfg(all(windows, feature = "d3d12"))]
pub mod d3d12;
#[cfg(all(windows, any(feature = "d3d11", feature = "d3d12")))]
pub mod dxgi;
pub mod null;
pub mod vulkan;

pub use backend::*;
