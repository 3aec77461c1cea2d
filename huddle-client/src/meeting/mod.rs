mod meeting;
mod meeting_event;
mod meeting_handle;

pub use meeting::*;
pub use meeting_event::*;
pub use meeting_handle::*;
