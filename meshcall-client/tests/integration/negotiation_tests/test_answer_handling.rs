use meshcall_client::{NegotiationState, SessionDescription};

use crate::integration::{RegistryFixture, init_tracing, pid};
use crate::utils::TransportCall;

#[tokio::test]
async fn test_answer_completes_outstanding_offer() {
    init_tracing();

    let fixture = RegistryFixture::new("alice");
    let mut machine = fixture.machine("bob");
    machine.create_as_initiator().await.unwrap();

    machine.handle_remote_answer("bob-answer".to_owned()).await.unwrap();

    assert_eq!(machine.state(), NegotiationState::Stable);
    let transport = fixture.transports.latest_for(&pid("bob")).unwrap();
    assert_eq!(
        transport.calls(),
        vec![
            TransportCall::CreateOffer,
            TransportCall::SetRemote(SessionDescription::Answer("bob-answer".to_owned())),
        ]
    );
}

#[tokio::test]
async fn test_unexpected_answers_are_ignored() {
    init_tracing();

    let fixture = RegistryFixture::new("alice");
    let mut machine = fixture.machine("bob");

    // No offer outstanding
    machine.handle_remote_answer("stray".to_owned()).await.unwrap();
    assert_eq!(machine.state(), NegotiationState::New);
    assert_eq!(fixture.transports.created_count(), 0);

    machine.create_as_initiator().await.unwrap();
    machine.handle_remote_answer("first".to_owned()).await.unwrap();

    // Duplicate answer after stable
    machine.handle_remote_answer("second".to_owned()).await.unwrap();
    assert_eq!(machine.state(), NegotiationState::Stable);

    let transport = fixture.transports.latest_for(&pid("bob")).unwrap();
    let remote_descriptions = transport
        .calls()
        .into_iter()
        .filter(|call| matches!(call, TransportCall::SetRemote(_)))
        .count();
    assert_eq!(remote_descriptions, 1);
}

#[tokio::test]
async fn test_offer_while_stable_renegotiates() {
    init_tracing();

    let fixture = RegistryFixture::new("alice");
    let mut machine = fixture.machine("bob");

    machine.handle_remote_offer("offer-1".to_owned()).await.unwrap();
    machine.handle_remote_offer("offer-2".to_owned()).await.unwrap();

    assert_eq!(machine.state(), NegotiationState::Stable);
    assert_eq!(fixture.signaling.answers_to(&pid("bob")).await.len(), 2);
    // Same connection is reused
    assert_eq!(fixture.transports.created_count(), 1);
}
