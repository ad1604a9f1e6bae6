mod admission;
mod config;
mod error;
mod media;
mod negotiation;
mod registry;
mod session;
mod signaling;
mod transport;

pub use admission::*;
pub use config::*;
pub use error::*;
pub use media::*;
pub use negotiation::*;
pub use registry::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;
