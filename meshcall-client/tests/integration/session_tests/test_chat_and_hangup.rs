use meshcall_client::CallEvent;
use meshcall_core::{ChatContent, ParticipantJoined, SignalingMessage};

use super::init_message;
use crate::integration::{create_test_session, init_tracing, pid, wait_for_event};

#[tokio::test]
async fn test_chat_is_trimmed_and_passed_through() {
    init_tracing();

    let mut session = create_test_session("alice").await;
    let mut server = session.connections.recv().await.unwrap();
    server.push(&init_message(false, true, false));
    wait_for_event(&mut session.events, |e| matches!(e, CallEvent::MediaStarted)).await;

    session.handle.send_chat("   ").await.unwrap();
    session.handle.send_chat("  hello there \n").await.unwrap();

    let sent = server.next_message().await.unwrap();
    assert_eq!(sent, SignalingMessage::chat("hello there"));

    server.push(&SignalingMessage::Chat(ChatContent {
        sender: Some("Bob".to_owned()),
        sender_id: Some(pid("bob")),
        text: "hi".to_owned(),
        timestamp: Some(1_700_000_000_i64.into()),
        ..Default::default()
    }));
    let event = wait_for_event(&mut session.events, |e| matches!(e, CallEvent::Chat(_))).await;
    let CallEvent::Chat(chat) = event else {
        unreachable!()
    };
    assert_eq!(chat.sender.as_deref(), Some("Bob"));
    assert_eq!(chat.timestamp_secs(), Some(1_700_000_000));

    session.handle.hangup().await.unwrap();
    session.task.await.unwrap();
}

#[tokio::test]
async fn test_hangup_closes_everything() {
    init_tracing();

    let mut session = create_test_session("alice").await;
    let server = session.connections.recv().await.unwrap();
    server.push(&init_message(true, true, false));
    wait_for_event(&mut session.events, |e| matches!(e, CallEvent::MediaStarted)).await;

    for peer in ["bob", "carol"] {
        server.push(&SignalingMessage::ParticipantJoined(ParticipantJoined {
            participant_id: pid(peer),
            name: peer.to_owned(),
        }));
    }
    wait_for_event(&mut session.events, |e| {
        matches!(e, CallEvent::ParticipantJoined { participant_id, .. } if participant_id == &pid("carol"))
    })
    .await;

    session.handle.hangup().await.unwrap();
    wait_for_event(&mut session.events, |e| matches!(e, CallEvent::HungUp)).await;
    session.task.await.unwrap();

    for peer in ["bob", "carol"] {
        assert!(session.transports.latest_for(&pid(peer)).unwrap().was_closed());
    }
    assert!(session.handle.toggle_audio().await.is_err());
    assert_eq!(session.connector.attempts().len(), 1);
}
