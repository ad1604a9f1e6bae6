mod connection_entry;
mod peer_registry;

pub use connection_entry::*;
pub use peer_registry::*;
