mod ref_ptr;

pub use ref_ptr::*;
