use crate::integration::init_tracing;
use crate::integration::link_tests::LinkPair;
use crate::utils::FakeNetwork;
use huddle_client::peer::SdpKind;
use huddle_client::{MediaKind, NegotiationState, PeerLinkManager};
use huddle_core::{ParticipantId, SignalMessage};
use std::sync::atomic::Ordering;

fn both_connected(a: &PeerLinkManager, b: &PeerLinkManager) -> bool {
    a.link_state(&ParticipantId::from("bob")) == Some(NegotiationState::Connected)
        && b.link_state(&ParticipantId::from("alice")) == Some(NegotiationState::Connected)
}

#[tokio::test]
async fn test_initial_connect_uses_a_single_offer() {
    init_tracing();
    let network = FakeNetwork::new();
    let mut pair = LinkPair::new(&network, "alice", "bob").await;

    pair.a.manager.connect_to(&"bob".into()).await.unwrap();
    pair.run_until(both_connected).await.unwrap();

    let offers: Vec<_> = pair
        .log
        .iter()
        .filter(|s| matches!(s, SignalMessage::Offer { .. }))
        .collect();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].sender().as_str(), "alice");
    assert_eq!(offers[0].recipient().as_str(), "bob");
    assert!(pair.log.iter().any(|s| matches!(
        s,
        SignalMessage::Answer { from, .. } if from.as_str() == "bob"
    )));
}

#[tokio::test]
async fn test_offer_collision_is_resolved_by_the_answering_side() {
    init_tracing();
    let network = FakeNetwork::new();
    let mut pair = LinkPair::new(&network, "alice", "bob").await;

    pair.a.manager.connect_to(&"bob".into()).await.unwrap();
    pair.run_until(both_connected).await.unwrap();
    pair.log.clear();

    network
        .behavior()
        .require_renegotiation
        .store(true, Ordering::SeqCst);
    let alice_screen = pair.a.tracks.open_screen_share().await.unwrap();
    let bob_screen = pair.b.tracks.open_screen_share().await.unwrap();
    pair.a
        .manager
        .replace_track(MediaKind::Video, Some(&alice_screen), None)
        .await
        .unwrap();
    pair.b
        .manager
        .replace_track(MediaKind::Video, Some(&bob_screen), None)
        .await
        .unwrap();

    let probe = network.clone();
    pair.run_until(move |a, b| {
        let alice_side = probe.latest("alice", "bob").unwrap().state();
        let bob_side = probe.latest("bob", "alice").unwrap().state();
        both_connected(a, b)
            && bob_side.offers_created == 2
            && matches!(bob_side.remote_description, Some((SdpKind::Answer, _)))
            && matches!(alice_side.local_description, Some((SdpKind::Answer, _)))
    })
    .await
    .unwrap();

    let alice_side = network.latest("alice", "bob").unwrap().state();
    let bob_side = network.latest("bob", "alice").unwrap().state();
    assert_eq!(alice_side.rollbacks, 0);
    assert_eq!(bob_side.rollbacks, 1);
    assert_eq!(alice_side.lines[&MediaKind::Video], Some(alice_screen.id()));
    assert_eq!(bob_side.lines[&MediaKind::Video], Some(bob_screen.id()));

    let offers_from_bob = pair
        .log
        .iter()
        .filter(|s| matches!(s, SignalMessage::Offer { from, .. } if from.as_str() == "bob"))
        .count();
    assert_eq!(offers_from_bob, 2);
}
