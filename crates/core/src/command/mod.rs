mod command_buffer;
mod execution;
mod queue;
mod render_pass;

pub use command_buffer::*;
pub use execution::*;
pub use queue::*;
pub use render_pass::*;
