use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use meshcall::ParticipantId;
use meshcall::client::{
    CallEvent, CallSession, ClientConfig, MediaHandle, SampleDevices, SessionIdentity,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use webrtc::media::Sample;

/// One Opus frame of silence.
const OPUS_SILENCE: [u8; 3] = [0xF8, 0xFF, 0xFE];
const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Headless meeting participant: joins, publishes silence, logs the call.
#[derive(Parser)]
#[command(name = "meshcall")]
#[command(about = "Join a meshcall meeting from the terminal")]
struct Args {
    /// Meeting code, e.g. abc-defg-hij
    #[arg(short, long)]
    meeting: String,

    /// Signaling server; defaults to MESHCALL_SERVER_URL or ws://localhost:8080
    #[arg(short, long)]
    server: Option<String>,

    /// Participant id; a random one is used when omitted
    #[arg(short, long)]
    participant: Option<String>,

    #[arg(short, long, default_value = "")]
    name: String,

    /// Chat line posted once media is up
    #[arg(long)]
    say: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env();
    if let Some(server) = args.server {
        config.server_url = server;
    }

    let participant_id = args
        .participant
        .map(ParticipantId::from)
        .unwrap_or_else(|| ParticipantId::new(Uuid::new_v4().to_string()));
    let identity = SessionIdentity {
        meeting_code: args.meeting,
        participant_id,
        display_name: args.name,
    };
    info!(
        server = %config.server_url,
        meeting = %identity.meeting_code,
        participant = %identity.participant_id,
        "Joining meeting"
    );

    let (session, handle, mut events) =
        CallSession::with_webrtc(identity, &config, Arc::new(SampleDevices)).await;
    tokio::spawn(feed_silence(session.media()));
    let session_task = tokio::spawn(session.run());

    let mut say = args.say;
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(CallEvent::HungUp) | None => break,
                    Some(CallEvent::MediaStarted) => {
                        info!("Local media started");
                        if let Some(text) = say.take()
                            && handle.send_chat(text).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(event) => log_event(&event),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, hanging up");
                if handle.hangup().await.is_err() {
                    break;
                }
            }
        }
    }

    session_task.await.context("Call session task failed")?;
    Ok(())
}

fn log_event(event: &CallEvent) {
    match event {
        CallEvent::AdmissionChanged(state) => info!("Admission: {}", state),
        CallEvent::ShowWaitingRoom => info!("Waiting for the host to admit us"),
        CallEvent::WaitingRoomUpdated(waiting) => {
            let names: Vec<_> = waiting.iter().map(|w| w.name.as_str()).collect();
            info!("Waiting room: {:?}", names);
        }
        CallEvent::MediaStarted => info!("Local media started"),
        CallEvent::DeviceError(e) => error!("Device error: {}", e),
        CallEvent::ParticipantJoined {
            participant_id,
            name,
        } => info!(">>> {} ({}) joined", name, participant_id),
        CallEvent::ParticipantLeft { participant_id } => info!("<<< {} left", participant_id),
        CallEvent::PeerConnected(peer) => info!("Media flowing with {}", peer),
        CallEvent::PeerDisconnected(peer) => warn!("Media to {} interrupted", peer),
        CallEvent::NegotiationFailed {
            participant_id,
            reason,
        } => error!("Negotiation with {} failed: {}", participant_id, reason),
        CallEvent::RemoteTrack {
            participant_id,
            track,
        } => info!("Receiving {} from {}", track.kind(), participant_id),
        CallEvent::Chat(chat) => info!(
            "[{}]: {}",
            chat.sender.as_deref().unwrap_or("?"),
            chat.text
        ),
        CallEvent::LocalMediaChanged {
            audio_enabled,
            video_enabled,
            video_source,
        } => info!(
            audio = audio_enabled,
            video = video_enabled,
            source = ?video_source,
            "Local media changed"
        ),
        CallEvent::HungUp => info!("Call ended"),
    }
}

/// Keeps the published audio track busy so peers see a live stream.
async fn feed_silence(media: MediaHandle) {
    let mut ticker = tokio::time::interval(FRAME_DURATION);
    loop {
        ticker.tick().await;
        let Some(audio) = media.published().await.audio else {
            continue;
        };
        let sample = Sample {
            data: Bytes::from_static(&OPUS_SILENCE),
            duration: FRAME_DURATION,
            ..Default::default()
        };
        if let Err(e) = audio.write_sample(&sample).await {
            warn!("Failed to write audio sample: {}", e);
        }
    }
}
