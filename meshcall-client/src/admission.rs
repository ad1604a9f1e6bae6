use meshcall_core::{InitContent, WaitingParticipant, WaitingRoomUpdate};
use std::fmt;
use tracing::{debug, info};

/// Where the local participant stands with respect to the meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionState {
    Unknown,
    Waiting,
    Admitted,
    Host,
}

impl AdmissionState {
    pub fn in_meeting(&self) -> bool {
        matches!(self, AdmissionState::Admitted | AdmissionState::Host)
    }
}

impl fmt::Display for AdmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdmissionState::Unknown => "unknown",
            AdmissionState::Waiting => "waiting",
            AdmissionState::Admitted => "admitted",
            AdmissionState::Host => "host",
        };
        f.write_str(name)
    }
}

/// What the caller has to do after an admission input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionEffect {
    ShowWaitingRoom,
    /// Emitted at most once per controller.
    StartMedia,
    UpdateRoster(Vec<WaitingParticipant>),
}

/// Tracks the waiting-room handshake. Pure: no I/O, only effects.
#[derive(Debug)]
pub struct AdmissionController {
    state: AdmissionState,
    media_requested: bool,
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionController {
    pub fn new() -> Self {
        Self {
            state: AdmissionState::Unknown,
            media_requested: false,
        }
    }

    pub fn state(&self) -> AdmissionState {
        self.state
    }

    /// `init` is resent by the server after every reconnect; once the
    /// participant is in the meeting repeats are ignored.
    pub fn on_init(&mut self, init: &InitContent) -> Vec<AdmissionEffect> {
        match self.state {
            AdmissionState::Unknown | AdmissionState::Waiting => {
                if init.is_waiting {
                    self.enter_waiting()
                } else if init.is_host {
                    self.enter_meeting(AdmissionState::Host)
                } else if init.is_admitted {
                    self.enter_meeting(AdmissionState::Admitted)
                } else {
                    debug!("Init carries no admission decision yet");
                    Vec::new()
                }
            }
            state => {
                debug!("Ignoring repeated init while {}", state);
                Vec::new()
            }
        }
    }

    pub fn on_admitted(&mut self) -> Vec<AdmissionEffect> {
        match self.state {
            AdmissionState::Unknown | AdmissionState::Waiting => {
                self.enter_meeting(AdmissionState::Admitted)
            }
            state => {
                debug!("Ignoring admitted while {}", state);
                Vec::new()
            }
        }
    }

    /// Roster changes never move the state. Admitted guests ignore them.
    pub fn on_waiting_room_update(&mut self, update: WaitingRoomUpdate) -> Vec<AdmissionEffect> {
        if !matches!(self.state, AdmissionState::Waiting | AdmissionState::Host) {
            debug!("Ignoring waiting room roster while {}", self.state);
            return Vec::new();
        }
        vec![AdmissionEffect::UpdateRoster(update.waiting_participants)]
    }

    fn enter_waiting(&mut self) -> Vec<AdmissionEffect> {
        if self.state == AdmissionState::Waiting {
            return Vec::new();
        }
        info!("Placed in waiting room");
        self.state = AdmissionState::Waiting;
        vec![AdmissionEffect::ShowWaitingRoom]
    }

    fn enter_meeting(&mut self, state: AdmissionState) -> Vec<AdmissionEffect> {
        info!("Admission state: {} -> {}", self.state, state);
        self.state = state;

        if self.media_requested {
            return Vec::new();
        }
        self.media_requested = true;
        vec![AdmissionEffect::StartMedia]
    }
}
