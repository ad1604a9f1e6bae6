use crate::admission::AdmissionState;
use crate::error::DeviceError;
use crate::media::VideoSource;
use meshcall_core::{ChatContent, ParticipantId, WaitingParticipant};
use std::sync::Arc;
use webrtc::track::track_remote::TrackRemote;

/// Everything the presentation layer needs to know about the call.
pub enum CallEvent {
    AdmissionChanged(AdmissionState),
    ShowWaitingRoom,
    WaitingRoomUpdated(Vec<WaitingParticipant>),
    MediaStarted,
    /// Capture failed; the user has to retry with [`crate::CallHandle::start_media`].
    DeviceError(DeviceError),
    ParticipantJoined {
        participant_id: ParticipantId,
        name: String,
    },
    ParticipantLeft {
        participant_id: ParticipantId,
    },
    PeerConnected(ParticipantId),
    PeerDisconnected(ParticipantId),
    NegotiationFailed {
        participant_id: ParticipantId,
        reason: String,
    },
    RemoteTrack {
        participant_id: ParticipantId,
        track: Arc<TrackRemote>,
    },
    Chat(ChatContent),
    LocalMediaChanged {
        audio_enabled: bool,
        video_enabled: bool,
        video_source: VideoSource,
    },
    HungUp,
}
