use crate::media::{LocalTrack, MediaKind};
use crate::peer::{
    PeerTransport, PeerTransportFactory, RemoteTrack, ReplaceOutcome, SdpKind, TransportEvent,
    TransportState,
};
use crate::rtc::SampleTrackBackend;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use huddle_core::{HuddleError, IceCandidateInit, IceServerConfig, ParticipantId, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// webrtc-rs peer connection with one outbound line per media kind.
pub struct RtcPeerTransport {
    remote: ParticipantId,
    peer_connection: Arc<RTCPeerConnection>,
    senders: Mutex<HashMap<MediaKind, Arc<RTCRtpSender>>>,
}

impl RtcPeerTransport {
    /// Sets up the connection. `event_tx` receives local candidates, state
    /// changes and remote tracks.
    pub async fn new(
        remote: ParticipantId,
        ice_servers: &[IceServerConfig],
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> anyhow::Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_tx = event_tx.clone();
        let remote_state = remote.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let remote = remote_state.clone();

                Box::pin(async move {
                    debug!("Peer connection state for {}: {:?}", remote, s);
                    let state = match s {
                        RTCPeerConnectionState::New => TransportState::New,
                        RTCPeerConnectionState::Connecting => TransportState::Connecting,
                        RTCPeerConnectionState::Connected => TransportState::Connected,
                        RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
                        RTCPeerConnectionState::Failed => TransportState::Failed,
                        RTCPeerConnectionState::Closed => TransportState::Closed,
                        _ => return,
                    };
                    let _ = tx.send(TransportEvent::StateChanged(state));
                })
            },
        ));

        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(json_candidate) = candidate.to_json() else {
                    return;
                };
                let Ok(candidate) = convert::<_, IceCandidateInit>(&json_candidate) else {
                    return;
                };
                let _ = tx.send(TransportEvent::LocalCandidate(candidate));
            })
        }));

        let track_tx = event_tx;
        peer_connection.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            let tx = track_tx.clone();

            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => MediaKind::Audio,
                    RTPCodecType::Video => MediaKind::Video,
                    _ => return,
                };
                let _ = tx.send(TransportEvent::RemoteTrack(RemoteTrack {
                    id: track.id(),
                    stream_id: track.stream_id(),
                    kind,
                }));
            })
        }));

        Ok(Self {
            remote,
            peer_connection,
            senders: Mutex::new(HashMap::new()),
        })
    }

    async fn install_sender(&self, kind: MediaKind, sender: Arc<RTCRtpSender>) {
        drain_rtcp(sender.clone());
        self.senders.lock().await.insert(kind, sender);
    }
}

#[async_trait]
impl PeerTransport for RtcPeerTransport {
    async fn add_media_line(&self, kind: MediaKind, track: Option<&LocalTrack>) -> Result<()> {
        let sender = match track {
            Some(track) => self
                .peer_connection
                .add_track(rtc_track(track)?)
                .await
                .map_err(HuddleError::transport)?,
            None => self
                .peer_connection
                .add_transceiver_from_kind(codec_type(kind), None)
                .await
                .map_err(HuddleError::transport)?
                .sender()
                .await,
        };
        self.install_sender(kind, sender).await;
        Ok(())
    }

    async fn create_offer(&self) -> Result<String> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(HuddleError::transport)?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .map_err(HuddleError::transport)?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(HuddleError::transport)?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .map_err(HuddleError::transport)?;
        Ok(answer.sdp)
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        let desc = match kind {
            SdpKind::Offer => RTCSessionDescription::offer(sdp),
            SdpKind::Answer => RTCSessionDescription::answer(sdp),
        }
        .map_err(HuddleError::transport)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .map_err(HuddleError::transport)
    }

    async fn rollback(&self) -> Result<()> {
        let rollback: RTCSessionDescription =
            convert(&serde_json::json!({ "type": "rollback", "sdp": "" }))
                .map_err(HuddleError::transport)?;
        self.peer_connection
            .set_local_description(rollback)
            .await
            .map_err(HuddleError::transport)
    }

    async fn add_ice_candidate(&self, candidate: IceCandidateInit) -> Result<()> {
        let candidate: RTCIceCandidateInit =
            convert(&candidate).map_err(HuddleError::transport)?;
        self.peer_connection
            .add_ice_candidate(candidate)
            .await
            .map_err(HuddleError::transport)
    }

    async fn replace_track(
        &self,
        kind: MediaKind,
        track: Option<&LocalTrack>,
    ) -> Result<ReplaceOutcome> {
        let sender = self
            .senders
            .lock()
            .await
            .get(&kind)
            .cloned()
            .ok_or_else(|| HuddleError::transport(format!("no {kind:?} line to {}", self.remote)))?;
        let replacement = track.map(rtc_track).transpose()?;

        let Err(e) = sender.replace_track(replacement.clone()).await else {
            return Ok(ReplaceOutcome::Replaced);
        };
        let Some(replacement) = replacement else {
            return Err(HuddleError::transport(e));
        };

        warn!(
            "In-place {:?} replacement towards {} failed ({}), rebuilding the line",
            kind, self.remote, e
        );
        self.peer_connection
            .remove_track(&sender)
            .await
            .map_err(HuddleError::transport)?;
        let sender = self
            .peer_connection
            .add_track(replacement)
            .await
            .map_err(HuddleError::transport)?;
        self.install_sender(kind, sender).await;
        Ok(ReplaceOutcome::RenegotiationRequired)
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection
            .close()
            .await
            .map_err(HuddleError::transport)
    }
}

/// Creates [`RtcPeerTransport`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtcTransportFactory;

#[async_trait]
impl PeerTransportFactory for RtcTransportFactory {
    async fn create(
        &self,
        remote: &ParticipantId,
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>> {
        info!("Creating peer connection to {}", remote);
        let transport = RtcPeerTransport::new(remote.clone(), ice_servers, events)
            .await
            .map_err(|e| HuddleError::transport(format!("{e:#}")))?;
        Ok(Arc::new(transport))
    }
}

fn codec_type(kind: MediaKind) -> RTPCodecType {
    match kind {
        MediaKind::Audio => RTPCodecType::Audio,
        MediaKind::Video => RTPCodecType::Video,
    }
}

fn rtc_track(track: &LocalTrack) -> Result<Arc<dyn TrackLocal + Send + Sync>> {
    let backend = SampleTrackBackend::of(track).ok_or_else(|| {
        HuddleError::transport(format!("track {} has no webrtc backend", track.id()))
    })?;
    Ok(backend.rtc_track())
}

/// Moves a value between our wire types and webrtc-rs types through their
/// shared JSON shape.
fn convert<T, U>(value: &T) -> anyhow::Result<U>
where
    T: serde::Serialize,
    U: serde::de::DeserializeOwned,
{
    let json = serde_json::to_value(value).context("Failed to encode")?;
    serde_json::from_value(json).map_err(|e| anyhow!("Failed to decode: {e}"))
}

/// Incoming RTCP has to be read for interceptors to work.
fn drain_rtcp(sender: Arc<RTCRtpSender>) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 1500];
        while sender.read(&mut buf).await.is_ok() {}
    });
}
