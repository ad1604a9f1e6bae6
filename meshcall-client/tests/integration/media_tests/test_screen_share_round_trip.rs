use meshcall_client::{DeviceError, VideoSource};
use meshcall_core::{SignalContent, SignalPayload};

use crate::integration::{RegistryFixture, init_tracing, pid};

async fn connect_bob(fixture: &mut RegistryFixture) {
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
}

#[tokio::test]
async fn test_share_and_stop_swap_video_track() {
    init_tracing();

    let mut fixture = RegistryFixture::new("alice");
    fixture.media.start().await.unwrap();
    connect_bob(&mut fixture).await;
    let camera_id = fixture
        .media
        .handle()
        .published()
        .await
        .video
        .unwrap()
        .id()
        .to_owned();

    let report = fixture
        .media
        .start_screen_share(&mut fixture.registry)
        .await
        .unwrap();
    assert_eq!(report.replaced, vec![pid("bob")]);

    let screen = fixture.devices.last_screen().unwrap();
    let published = fixture.media.handle().published().await;
    assert_eq!(published.video.unwrap().id(), screen.id());
    assert_eq!(
        fixture.media.handle().read().await.video_source(),
        VideoSource::Screen
    );

    // Second start while sharing is a no-op
    let report = fixture
        .media
        .start_screen_share(&mut fixture.registry)
        .await
        .unwrap();
    assert!(report.replaced.is_empty());
    assert_eq!(fixture.devices.display_media_calls(), 1);

    let report = fixture
        .media
        .stop_screen_share(&mut fixture.registry)
        .await
        .unwrap();
    assert_eq!(report.replaced, vec![pid("bob")]);
    assert!(screen.is_ended());

    let transport = fixture.transports.latest_for(&pid("bob")).unwrap();
    assert_eq!(
        transport.replaced_tracks(),
        vec![screen.id().to_owned(), camera_id.clone()]
    );
    assert_eq!(
        fixture.media.handle().published().await.video.unwrap().id(),
        camera_id
    );

    // Stopping again changes nothing
    assert!(
        fixture
            .media
            .stop_screen_share(&mut fixture.registry)
            .await
            .is_none()
    );
    assert_eq!(transport.replaced_tracks().len(), 2);
}

#[tokio::test]
async fn test_share_requires_started_media() {
    init_tracing();

    let mut fixture = RegistryFixture::new("alice");
    let err = fixture
        .media
        .start_screen_share(&mut fixture.registry)
        .await
        .unwrap_err();

    assert_eq!(err, DeviceError::NotStarted);
    assert_eq!(fixture.devices.display_media_calls(), 0);
}

#[tokio::test]
async fn test_denied_share_keeps_camera() {
    init_tracing();

    let mut fixture = RegistryFixture::new("alice");
    fixture.media.start().await.unwrap();
    connect_bob(&mut fixture).await;
    fixture.devices.deny_display_media(true);

    let err = fixture
        .media
        .start_screen_share(&mut fixture.registry)
        .await
        .unwrap_err();

    assert!(matches!(err, DeviceError::PermissionDenied(_)));
    assert_eq!(
        fixture.media.handle().read().await.video_source(),
        VideoSource::Camera
    );
    let transport = fixture.transports.latest_for(&pid("bob")).unwrap();
    assert!(transport.replaced_tracks().is_empty());
}
