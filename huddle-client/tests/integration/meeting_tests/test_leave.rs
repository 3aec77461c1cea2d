use crate::integration::meeting_tests::{ROOM, full_room, start_participant};
use crate::integration::{eventually, init_tracing, wait_for_event};
use crate::utils::{FakeDevices, FakeNetwork, Switchboard};
use huddle_client::{DepartureReason, MediaKind, MeetingEvent};
use huddle_core::HuddleError;

#[tokio::test]
async fn test_leave_closes_links_and_releases_media() {
    init_tracing();
    let board = Switchboard::new();
    let network = FakeNetwork::new();
    let mut room = full_room(&board, &network, &["alice", "bob"]).await.unwrap();
    let microphone = room[0].handle.local_media().borrow().audio.clone().unwrap();

    room[0].handle.leave().await.unwrap();

    let alice = &mut room[0];
    wait_for_event(&mut alice.events, |e| matches!(e, MeetingEvent::Left { .. }))
        .await
        .unwrap();
    assert!(microphone.is_ended());
    assert!(alice.handle.local_media().borrow().audio.is_none());
    assert_eq!(
        network.latest("alice", "bob").unwrap().state().close_calls,
        1
    );
    assert!(matches!(
        alice.handle.leave().await,
        Err(HuddleError::NotInRoom)
    ));

    let bob = &mut room[1];
    let left = wait_for_event(&mut bob.events, |e| {
        matches!(e, MeetingEvent::ParticipantLeft { .. })
    })
    .await
    .unwrap();
    assert_eq!(
        left,
        MeetingEvent::ParticipantLeft {
            identity: "alice".into(),
            reason: DepartureReason::Left,
        }
    );
}

#[tokio::test]
async fn test_join_without_microphone_is_refused() {
    init_tracing();
    let board = Switchboard::new();
    let network = FakeNetwork::new();
    let alice = start_participant(&board, &network, "alice", FakeDevices::without_microphone()).await;

    let result = alice.handle.join(ROOM, None, Default::default()).await;

    assert!(matches!(result, Err(HuddleError::MediaUnavailable(_))));
    assert!(alice.handle.local_media().borrow().video.is_none());
    eventually(|| board.registry().room_count() == 0)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_switch_device_is_all_or_nothing() {
    init_tracing();
    let board = Switchboard::new();
    let network = FakeNetwork::new();
    let room = full_room(&board, &network, &["alice", "bob"]).await.unwrap();
    let alice = &room[0];
    let camera = alice.handle.local_media().borrow().video.clone().unwrap();
    let transport = network.latest("alice", "bob").unwrap();

    network
        .behavior()
        .fail_replace_towards
        .lock()
        .unwrap()
        .insert("bob".into());
    assert!(
        alice
            .handle
            .switch_device(MediaKind::Video, "cam-2")
            .await
            .is_err()
    );
    assert_eq!(transport.sending(MediaKind::Video), Some(camera.id()));
    assert_eq!(
        alice.handle.local_media().borrow().video.as_ref(),
        Some(&camera)
    );
    assert!(!camera.is_ended());

    network.behavior().fail_replace_towards.lock().unwrap().clear();
    let switched = alice
        .handle
        .switch_device(MediaKind::Video, "cam-2")
        .await
        .unwrap();

    assert_eq!(switched.device_id(), Some("cam-2"));
    assert_eq!(transport.sending(MediaKind::Video), Some(switched.id()));
    assert!(camera.is_ended());
}
