use crate::integration::meeting_tests::full_room;
use crate::integration::{init_tracing, wait_for_event};
use crate::utils::{FakeNetwork, Switchboard};
use huddle_client::peer::{TransportEvent, TransportState};
use huddle_client::{DepartureReason, MeetingEvent};
use huddle_core::HuddleError;
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn test_failed_peer_departs_once() {
    init_tracing();
    let board = Switchboard::new();
    let network = FakeNetwork::new();
    let mut room = full_room(&board, &network, &["alice", "bob"]).await.unwrap();
    let transport = network.latest("alice", "bob").unwrap();

    transport.emit(TransportEvent::StateChanged(TransportState::Failed));

    let first = wait_for_event(&mut room[0].events, |e| {
        matches!(e, MeetingEvent::ParticipantLeft { .. })
    })
    .await
    .unwrap();
    assert!(matches!(
        first,
        MeetingEvent::ParticipantLeft {
            ref identity,
            reason: DepartureReason::Failed(HuddleError::NegotiationFailed { .. }),
        } if identity.as_str() == "bob"
    ));

    board.disconnect(room[1].endpoint).await;

    let alice = &mut room[0];
    let mut later = Vec::new();
    while let Ok(Some(event)) = timeout(Duration::from_millis(300), alice.events.recv()).await {
        if let MeetingEvent::ParticipantLeft { .. } = event {
            later.push(event);
        }
    }
    assert!(later.is_empty(), "bob departed twice: {later:?}");
    assert_eq!(transport.state().close_calls, 1);
}
