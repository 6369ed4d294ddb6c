pub mod command;
pub mod device;
pub mod error;
pub mod format;
pub mod platform;
pub mod refcount;
pub mod resource;
