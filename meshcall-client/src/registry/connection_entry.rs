use crate::negotiation::{NegotiationState, NegotiationStateMachine};

/// Registry slot for one remote participant.
pub struct ConnectionEntry {
    pub machine: NegotiationStateMachine,
    /// True when we sent (or will send) the first offer.
    pub initiator: bool,
    pub display_name: Option<String>,
}

impl ConnectionEntry {
    pub fn new(
        machine: NegotiationStateMachine,
        initiator: bool,
        display_name: Option<String>,
    ) -> Self {
        Self {
            machine,
            initiator,
            display_name,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.machine.state()
    }

    /// Entries that still take part in track fan-out.
    pub fn is_live(&self) -> bool {
        !self.machine.state().is_terminal()
    }
}
