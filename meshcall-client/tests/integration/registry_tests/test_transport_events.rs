use meshcall_client::{CallEvent, LinkState};
use meshcall_core::{SignalContent, SignalPayload};

use crate::integration::{RegistryFixture, init_tracing, pid};

#[tokio::test]
async fn test_local_candidates_are_signaled_to_peer() {
    init_tracing();

    let mut fixture = RegistryFixture::new("alice");
    fixture
        .registry
        .participant_joined(pid("bob"), "Bob".to_owned())
        .await;

    let transport = fixture.transports.latest_for(&pid("bob")).unwrap();
    transport.emit_candidate("host-1").await;
    transport.emit_candidate("host-2").await;
    fixture.pump_transport_events().await;

    let sent: Vec<String> = fixture
        .signaling
        .candidates_to(&pid("bob"))
        .await
        .into_iter()
        .map(|c| c.candidate)
        .collect();
    assert_eq!(sent, vec!["host-1", "host-2"]);
}

#[tokio::test]
async fn test_events_from_discarded_connection_are_dropped() {
    init_tracing();

    // "alice" < "bob", so alice discards her offer on collision
    let mut fixture = RegistryFixture::new("alice");
    fixture
        .registry
        .participant_joined(pid("bob"), "Bob".to_owned())
        .await;
    let discarded = fixture.transports.latest_for(&pid("bob")).unwrap();

    fixture
        .registry
        .handle_signal(SignalContent {
            sender_id: Some(pid("bob")),
            target_id: Some(pid("alice")),
            payload: SignalPayload::Offer {
                sdp: "bob-offer".to_owned(),
            },
        })
        .await;
    let live = fixture.transports.latest_for(&pid("bob")).unwrap();
    assert_ne!(discarded.connection_id, live.connection_id);

    discarded.emit_candidate("stale").await;
    discarded.emit_state(LinkState::Connected).await;
    live.emit_candidate("fresh").await;
    fixture.pump_transport_events().await;

    let sent: Vec<String> = fixture
        .signaling
        .candidates_to(&pid("bob"))
        .await
        .into_iter()
        .map(|c| c.candidate)
        .collect();
    assert_eq!(sent, vec!["fresh"]);
    assert!(
        !fixture
            .drain_events()
            .iter()
            .any(|event| matches!(event, CallEvent::PeerConnected(_)))
    );
}

#[tokio::test]
async fn test_link_state_surfaces_as_events() {
    init_tracing();

    let mut fixture = RegistryFixture::new("alice");
    fixture
        .registry
        .participant_joined(pid("bob"), "Bob".to_owned())
        .await;
    fixture.drain_events();

    let transport = fixture.transports.latest_for(&pid("bob")).unwrap();
    transport.emit_state(LinkState::Connecting).await;
    transport.emit_state(LinkState::Connected).await;
    transport.emit_state(LinkState::Disconnected).await;
    fixture.pump_transport_events().await;

    let events = fixture.drain_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], CallEvent::PeerConnected(id) if id == &pid("bob")));
    assert!(matches!(&events[1], CallEvent::PeerDisconnected(id) if id == &pid("bob")));
}

#[tokio::test]
async fn test_events_after_leave_are_dropped() {
    init_tracing();

    let mut fixture = RegistryFixture::new("alice");
    fixture
        .registry
        .participant_joined(pid("bob"), "Bob".to_owned())
        .await;
    let transport = fixture.transports.latest_for(&pid("bob")).unwrap();
    fixture.registry.participant_left(&pid("bob")).await;

    transport.emit_candidate("late").await;
    fixture.pump_transport_events().await;

    assert!(fixture.signaling.candidates_to(&pid("bob")).await.is_empty());
}
