mod adapter;
mod caps;
mod config;
mod device;

pub use adapter::*;
pub use caps::*;
pub use config::*;
pub use device::*;
