mod pixel_format;

pub use pixel_format::*;
