use crate::integration::meeting_tests::{ROOM, start_participant};
use crate::integration::{eventually, init_tracing, wait_for_event};
use crate::utils::{FakeDevices, FakeNetwork, Switchboard};
use huddle_client::{DepartureReason, MeetingEvent, NegotiationState};
use huddle_core::{ParticipantInfo, SignalMessage};

#[tokio::test]
async fn test_two_participants_meet_and_part() {
    init_tracing();
    let board = Switchboard::new();
    let network = FakeNetwork::new();

    let mut alice = start_participant(&board, &network, "alice", FakeDevices::standard()).await;
    alice.join().await.unwrap();

    let mut bob = start_participant(&board, &network, "bob", FakeDevices::standard()).await;
    bob.handle
        .join(ROOM, None, Default::default())
        .await
        .unwrap();

    let joined = wait_for_event(&mut bob.events, |e| matches!(e, MeetingEvent::Joined { .. }))
        .await
        .unwrap();
    assert_eq!(
        joined,
        MeetingEvent::Joined {
            room_id: ROOM.into(),
            participants: vec![ParticipantInfo::new("alice", "ALICE")],
        }
    );
    let announced = wait_for_event(&mut alice.events, |e| {
        matches!(e, MeetingEvent::ParticipantJoined(_))
    })
    .await
    .unwrap();
    assert_eq!(
        announced,
        MeetingEvent::ParticipantJoined(ParticipantInfo::new("bob", "BOB"))
    );

    alice.wait_connected(&["bob"]).await.unwrap();
    bob.wait_connected(&["alice"]).await.unwrap();

    let offers: Vec<_> = board
        .forwarded_signals()
        .into_iter()
        .filter(|s| matches!(s, SignalMessage::Offer { .. }))
        .collect();
    assert_eq!(offers.len(), 1, "{offers:?}");
    assert_eq!(offers[0].sender().as_str(), "alice");
    assert_eq!(offers[0].recipient().as_str(), "bob");

    board.disconnect(bob.endpoint).await;

    let left = wait_for_event(&mut alice.events, |e| {
        matches!(e, MeetingEvent::ParticipantLeft { .. })
    })
    .await
    .unwrap();
    assert_eq!(
        left,
        MeetingEvent::ParticipantLeft {
            identity: "bob".into(),
            reason: DepartureReason::Left,
        }
    );
    let closed = wait_for_event(&mut alice.events, |e| {
        matches!(e, MeetingEvent::LinkStateChanged { .. })
    })
    .await
    .unwrap();
    assert_eq!(
        closed,
        MeetingEvent::LinkStateChanged {
            identity: "bob".into(),
            state: NegotiationState::Closed,
        }
    );
    let transport = network.latest("alice", "bob").unwrap();
    eventually(|| transport.state().close_calls == 1)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_first_joiner_sees_an_empty_room() {
    init_tracing();
    let board = Switchboard::new();
    let network = FakeNetwork::new();

    let mut alice = start_participant(&board, &network, "alice", FakeDevices::standard()).await;
    let media = alice
        .handle
        .join(ROOM, Some("Alice".into()), Default::default())
        .await
        .unwrap();
    assert!(media.audio.is_some());
    assert!(media.video.is_some());

    let joined = wait_for_event(&mut alice.events, |e| matches!(e, MeetingEvent::Joined { .. }))
        .await
        .unwrap();
    assert_eq!(
        joined,
        MeetingEvent::Joined {
            room_id: ROOM.into(),
            participants: Vec::new(),
        }
    );
    assert_eq!(board.registry().room_count(), 1);
    assert!(network.owned_by("alice").is_empty());
}
