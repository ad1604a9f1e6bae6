mod negotiation_context;
mod negotiation_state;
mod state_machine;

pub use negotiation_context::*;
pub use negotiation_state::*;
pub use state_machine::*;
