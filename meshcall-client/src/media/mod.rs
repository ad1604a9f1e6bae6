mod devices;
mod local_track;
mod media_controller;

pub use devices::*;
pub use local_track::*;
pub use media_controller::*;
