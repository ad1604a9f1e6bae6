use std::collections::BTreeSet;

use meshcall_client::{CallEvent, NegotiationState};
use meshcall_core::ParticipantId;

use crate::integration::{RegistryFixture, init_tracing, pid};

#[tokio::test]
async fn test_entries_track_joined_minus_left() {
    init_tracing();

    let mut fixture = RegistryFixture::new("alice");
    let mut expected: BTreeSet<ParticipantId> = BTreeSet::new();

    let script = [
        ("join", "bob"),
        ("join", "carol"),
        ("join", "dave"),
        ("leave", "carol"),
        ("leave", "erin"),
        ("join", "erin"),
        ("leave", "bob"),
        ("join", "carol"),
    ];

    for (action, who) in script {
        match action {
            "join" => {
                fixture
                    .registry
                    .participant_joined(pid(who), who.to_uppercase())
                    .await;
                expected.insert(pid(who));
            }
            _ => {
                fixture.registry.participant_left(&pid(who)).await;
                expected.remove(&pid(who));
            }
        }
        let actual: BTreeSet<_> = fixture.registry.participants().into_iter().collect();
        assert_eq!(actual, expected, "after {} {}", action, who);
    }
}

#[tokio::test]
async fn test_join_makes_us_initiator() {
    init_tracing();

    let mut fixture = RegistryFixture::new("alice");
    fixture
        .registry
        .participant_joined(pid("bob"), "Bob".to_owned())
        .await;

    assert_eq!(fixture.registry.is_initiator(&pid("bob")), Some(true));
    assert_eq!(
        fixture.registry.state_of(&pid("bob")),
        Some(NegotiationState::HaveLocalOffer)
    );
    assert_eq!(fixture.signaling.offers_to(&pid("bob")).await.len(), 1);
    assert_eq!(
        fixture.registry.get(&pid("bob")).unwrap().display_name.as_deref(),
        Some("Bob")
    );

    let events = fixture.drain_events();
    assert!(matches!(
        events.as_slice(),
        [CallEvent::ParticipantJoined { participant_id, name }]
            if participant_id == &pid("bob") && name == "Bob"
    ));
}

#[tokio::test]
async fn test_leave_closes_and_rejoin_starts_fresh() {
    init_tracing();

    let mut fixture = RegistryFixture::new("alice");
    fixture
        .registry
        .participant_joined(pid("bob"), "Bob".to_owned())
        .await;
    fixture
        .registry
        .handle_signal(meshcall_core::SignalContent {
            sender_id: Some(pid("bob")),
            target_id: Some(pid("alice")),
            payload: meshcall_core::SignalPayload::Answer {
                sdp: "answer".to_owned(),
            },
        })
        .await;
    assert_eq!(
        fixture.registry.state_of(&pid("bob")),
        Some(NegotiationState::Stable)
    );
    let first_connection = fixture.registry.connection_id_of(&pid("bob")).unwrap();

    fixture.registry.participant_left(&pid("bob")).await;

    assert!(!fixture.registry.contains(&pid("bob")));
    let first_transport = fixture.transports.latest_for(&pid("bob")).unwrap();
    assert!(first_transport.was_closed());

    fixture
        .registry
        .participant_joined(pid("bob"), "Bob".to_owned())
        .await;

    assert_eq!(
        fixture.registry.state_of(&pid("bob")),
        Some(NegotiationState::HaveLocalOffer)
    );
    assert_ne!(
        fixture.registry.connection_id_of(&pid("bob")),
        Some(first_connection)
    );
    assert_eq!(fixture.transports.transports_for(&pid("bob")).len(), 2);
    assert_eq!(fixture.signaling.offers_to(&pid("bob")).await.len(), 2);
}
