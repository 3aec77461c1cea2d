use async_trait::async_trait;
use huddle_client::media::TrackId;
use huddle_client::peer::{ReplaceOutcome, SdpKind, TransportEvent, TransportState};
use huddle_client::{LocalTrack, MediaKind, PeerTransport, PeerTransportFactory};
use huddle_core::{HuddleError, IceCandidateInit, IceServerConfig, ParticipantId, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Knobs shared by every fake transport of a [`FakeNetwork`].
#[derive(Default)]
pub struct FakeBehavior {
    /// `replace_track` fails on transports towards these remotes.
    pub fail_replace_towards: Mutex<HashSet<ParticipantId>>,
    pub require_renegotiation: AtomicBool,
    pub fail_close: AtomicBool,
    pub never_connect: AtomicBool,
}

#[derive(Debug, Default, Clone)]
pub struct FakeState {
    pub lines: BTreeMap<MediaKind, Option<TrackId>>,
    pub local_description: Option<(SdpKind, String)>,
    pub remote_description: Option<(SdpKind, String)>,
    pub applied_candidates: Vec<IceCandidateInit>,
    pub offers_created: usize,
    pub rollbacks: usize,
    pub close_calls: usize,
    pub connected: bool,
}

/// Peer connection double. Reports `Connected` as soon as both
/// descriptions are in place.
pub struct FakeTransport {
    pub owner: ParticipantId,
    pub remote: ParticipantId,
    events: mpsc::UnboundedSender<TransportEvent>,
    state: Mutex<FakeState>,
    behavior: Arc<FakeBehavior>,
}

impl FakeTransport {
    pub fn state(&self) -> FakeState {
        self.state.lock().unwrap().clone()
    }

    pub fn sending(&self, kind: MediaKind) -> Option<TrackId> {
        self.state().lines.get(&kind).copied().flatten()
    }

    /// Injects a transport event as if the network produced it.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    fn candidate(&self) -> IceCandidateInit {
        IceCandidateInit {
            candidate: format!("candidate:{}", self.owner),
            sdp_mid: Some("0".into()),
            sdp_m_line_index: Some(0),
            username_fragment: None,
        }
    }

    fn maybe_connect(&self) {
        if self.behavior.never_connect.load(Ordering::SeqCst) {
            return;
        }
        let mut state = self.state.lock().unwrap();
        if state.connected
            || state.local_description.is_none()
            || state.remote_description.is_none()
        {
            return;
        }
        state.connected = true;
        drop(state);
        self.emit(TransportEvent::StateChanged(TransportState::Connecting));
        self.emit(TransportEvent::StateChanged(TransportState::Connected));
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn add_media_line(&self, kind: MediaKind, track: Option<&LocalTrack>) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .lines
            .insert(kind, track.map(LocalTrack::id));
        Ok(())
    }

    async fn create_offer(&self) -> Result<String> {
        let sdp = {
            let mut state = self.state.lock().unwrap();
            state.offers_created += 1;
            let sdp = format!("offer:{}->{}#{}", self.owner, self.remote, state.offers_created);
            state.local_description = Some((SdpKind::Offer, sdp.clone()));
            sdp
        };
        self.emit(TransportEvent::LocalCandidate(self.candidate()));
        Ok(sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let sdp = {
            let mut state = self.state.lock().unwrap();
            if !matches!(state.remote_description, Some((SdpKind::Offer, _))) {
                return Err(HuddleError::transport("no remote offer"));
            }
            let sdp = format!("answer:{}->{}", self.owner, self.remote);
            state.local_description = Some((SdpKind::Answer, sdp.clone()));
            sdp
        };
        self.emit(TransportEvent::LocalCandidate(self.candidate()));
        self.maybe_connect();
        Ok(sdp)
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        self.state.lock().unwrap().remote_description = Some((kind, sdp));
        if kind == SdpKind::Answer {
            self.maybe_connect();
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.local_description = None;
        state.rollbacks += 1;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidateInit) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.remote_description.is_none() {
            return Err(HuddleError::transport("remote description not set"));
        }
        state.applied_candidates.push(candidate);
        Ok(())
    }

    async fn replace_track(
        &self,
        kind: MediaKind,
        track: Option<&LocalTrack>,
    ) -> Result<ReplaceOutcome> {
        if self
            .behavior
            .fail_replace_towards
            .lock()
            .unwrap()
            .contains(&self.remote)
        {
            return Err(HuddleError::transport("replace refused"));
        }
        self.state
            .lock()
            .unwrap()
            .lines
            .insert(kind, track.map(LocalTrack::id));
        if self.behavior.require_renegotiation.load(Ordering::SeqCst) {
            Ok(ReplaceOutcome::RenegotiationRequired)
        } else {
            Ok(ReplaceOutcome::Replaced)
        }
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().close_calls += 1;
        if self.behavior.fail_close.load(Ordering::SeqCst) {
            return Err(HuddleError::transport("close failed"));
        }
        Ok(())
    }
}

/// Every fake transport created by any participant.
#[derive(Clone, Default)]
pub struct FakeNetwork {
    transports: Arc<Mutex<Vec<Arc<FakeTransport>>>>,
    behavior: Arc<FakeBehavior>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn behavior(&self) -> &FakeBehavior {
        &self.behavior
    }

    pub fn factory(&self, owner: &str) -> Arc<dyn PeerTransportFactory> {
        Arc::new(FakeTransportFactory {
            owner: ParticipantId::from(owner),
            network: self.clone(),
        })
    }

    /// All transports `owner` opened towards `remote`, oldest first.
    pub fn between(&self, owner: &str, remote: &str) -> Vec<Arc<FakeTransport>> {
        self.transports
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.owner.as_str() == owner && t.remote.as_str() == remote)
            .cloned()
            .collect()
    }

    pub fn latest(&self, owner: &str, remote: &str) -> Option<Arc<FakeTransport>> {
        self.between(owner, remote).pop()
    }

    pub fn owned_by(&self, owner: &str) -> Vec<Arc<FakeTransport>> {
        self.transports
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.owner.as_str() == owner)
            .cloned()
            .collect()
    }
}

struct FakeTransportFactory {
    owner: ParticipantId,
    network: FakeNetwork,
}

#[async_trait]
impl PeerTransportFactory for FakeTransportFactory {
    async fn create(
        &self,
        remote: &ParticipantId,
        _ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>> {
        let transport = Arc::new(FakeTransport {
            owner: self.owner.clone(),
            remote: remote.clone(),
            events,
            state: Mutex::new(FakeState::default()),
            behavior: self.network.behavior.clone(),
        });
        self.network
            .transports
            .lock()
            .unwrap()
            .push(transport.clone());
        Ok(transport)
    }
}
