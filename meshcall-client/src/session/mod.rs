mod call_event;
mod call_handle;
mod call_session;
mod session_command;

pub use call_event::*;
pub use call_handle::*;
pub use call_session::*;
pub use session_command::*;
