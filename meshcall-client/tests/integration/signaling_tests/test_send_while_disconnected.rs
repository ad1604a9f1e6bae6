use meshcall_client::{ChannelState, SignalingOutput};
use meshcall_core::{ParticipantId, SignalPayload, SignalingMessage};

use super::{create_test_channel, wait_for_state};
use crate::integration::{init_tracing, pid};

#[tokio::test]
async fn test_messages_sent_before_open_are_lost() {
    init_tracing();

    let (channel, _connector, mut connections, _inbound) = create_test_channel().await;

    channel.send(SignalingMessage::chat("too early")).await;

    let _task = channel
        .connect("m", &ParticipantId::from("alice"), "Alice")
        .unwrap();
    let mut server = connections.recv().await.unwrap();
    wait_for_state(&channel, ChannelState::Open).await;

    channel
        .send_offer(pid("bob"), "offer-sdp".to_owned())
        .await;

    let received = server.next_message().await.unwrap();
    match received {
        SignalingMessage::Signal(content) => {
            assert_eq!(content.target_id, Some(pid("bob")));
            assert_eq!(
                content.payload,
                SignalPayload::Offer {
                    sdp: "offer-sdp".to_owned()
                }
            );
        }
        other => panic!("expected signal, got {:?}", other),
    }
    assert!(server.drain().is_empty());

    channel.close();
}
