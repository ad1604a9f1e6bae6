mod connector;
mod signaling_channel;
mod signaling_output;

pub use connector::*;
pub use signaling_channel::*;
pub use signaling_output::*;
