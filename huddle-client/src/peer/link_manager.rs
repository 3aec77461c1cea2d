use crate::config::ClientConfig;
use crate::media::{LocalMediaState, LocalTrack, MediaKind};
use crate::peer::peer_link::{LinkContext, PeerLink};
use crate::peer::{
    LinkCommand, LinkReport, LinkSnapshot, NegotiationState, PeerTransport,
    PeerTransportFactory, Role,
};
use crate::signaling::SignalingChannel;
use huddle_core::{HuddleError, IceServerConfig, ParticipantId, Result, SignalMessage};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// How long a link gets to wind down before its task is aborted.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

struct LinkHandle {
    generation: u64,
    commands: mpsc::UnboundedSender<LinkCommand>,
    transport: Arc<dyn PeerTransport>,
    task: JoinHandle<()>,
    state: NegotiationState,
}

/// Keeps one [`PeerLink`] per remote participant.
pub struct PeerLinkManager {
    ctx: LinkContext,
    factory: Arc<dyn PeerTransportFactory>,
    media: watch::Receiver<LocalMediaState>,
    ice_servers: Vec<IceServerConfig>,
    links: HashMap<ParticipantId, LinkHandle>,
    /// Links closed by [`Self::close_link`] whose `Closed` report is still
    /// to be delivered.
    closing: HashSet<(ParticipantId, u64)>,
    reports_rx: mpsc::UnboundedReceiver<LinkReport>,
    next_generation: u64,
}

impl PeerLinkManager {
    pub fn new(
        local: ParticipantId,
        factory: Arc<dyn PeerTransportFactory>,
        signaling: Arc<dyn SignalingChannel>,
        media: watch::Receiver<LocalMediaState>,
        config: &ClientConfig,
    ) -> Self {
        let (reports, reports_rx) = mpsc::unbounded_channel();
        Self {
            ctx: LinkContext {
                local,
                signaling,
                reports,
                negotiation_timeout: config.negotiation_timeout,
            },
            factory,
            media,
            ice_servers: config.ice_servers.clone(),
            links: HashMap::new(),
            closing: HashSet::new(),
            reports_rx,
            next_generation: 0,
        }
    }

    pub fn local(&self) -> &ParticipantId {
        &self.ctx.local
    }

    /// Only links created afterwards see the new identity.
    pub fn set_local(&mut self, local: ParticipantId) {
        self.ctx.local = local;
    }

    pub fn set_ice_servers(&mut self, ice_servers: Vec<IceServerConfig>) {
        self.ice_servers = ice_servers;
    }

    pub fn contains(&self, remote: &ParticipantId) -> bool {
        self.links.contains_key(remote)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn remotes(&self) -> Vec<ParticipantId> {
        let mut remotes: Vec<_> = self.links.keys().cloned().collect();
        remotes.sort();
        remotes
    }

    /// Last state reported by the link.
    pub fn link_state(&self, remote: &ParticipantId) -> Option<NegotiationState> {
        self.links.get(remote).map(|link| link.state)
    }

    /// Opens a link to a newcomer and sends it our offer. An existing link to
    /// the same identity is replaced.
    pub async fn connect_to(&mut self, remote: &ParticipantId) -> Result<()> {
        if *remote == self.ctx.local {
            warn!("Refusing to open a link to ourselves ({})", remote);
            return Ok(());
        }
        if self.links.contains_key(remote) {
            info!("Replacing existing link to {}", remote);
            if let Err(e) = self.shutdown(remote, false).await {
                warn!("Closing replaced link to {} failed: {}", remote, e);
            }
        }

        self.spawn_link(remote.clone(), Role::Offerer).await?;
        self.dispatch(remote, LinkCommand::Offer);
        Ok(())
    }

    /// Routes an inbound negotiation message to its link. An offer from an
    /// unknown peer opens a new link as answerer.
    pub async fn handle_signal(&mut self, msg: SignalMessage) -> Result<()> {
        if *msg.recipient() != self.ctx.local {
            warn!(
                "Dropping {} addressed to {} (we are {})",
                msg.kind(),
                msg.recipient(),
                self.ctx.local
            );
            return Ok(());
        }

        let remote = msg.sender().clone();
        match msg {
            SignalMessage::Offer { sdp, .. } => {
                let stale = self
                    .links
                    .get(&remote)
                    .is_some_and(|link| link.task.is_finished() || link.state.is_terminal());
                if stale {
                    info!("Offer from {} replaces a finished link", remote);
                    if let Some(old) = self.links.remove(&remote) {
                        old.task.abort();
                    }
                }
                if !self.links.contains_key(&remote) {
                    self.spawn_link(remote.clone(), Role::Answerer).await?;
                }
                self.dispatch(&remote, LinkCommand::RemoteOffer(sdp));
            }
            SignalMessage::Answer { sdp, .. } => {
                self.dispatch(&remote, LinkCommand::RemoteAnswer(sdp));
            }
            SignalMessage::IceCandidate { candidate, .. } => {
                self.dispatch(&remote, LinkCommand::RemoteCandidate(candidate));
            }
        }
        Ok(())
    }

    async fn spawn_link(&mut self, remote: ParticipantId, role: Role) -> Result<()> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = self
            .factory
            .create(&remote, &self.ice_servers, events_tx)
            .await?;
        let (commands, command_rx) = mpsc::unbounded_channel();

        self.next_generation += 1;
        let generation = self.next_generation;
        let media = self.media.borrow().clone();

        let link = PeerLink::new(
            self.ctx.clone(),
            remote.clone(),
            generation,
            role,
            transport.clone(),
            media,
            command_rx,
            events_rx,
        );
        let task = tokio::spawn(link.run());

        self.links.insert(
            remote,
            LinkHandle {
                generation,
                commands,
                transport,
                task,
                state: NegotiationState::New,
            },
        );
        Ok(())
    }

    fn dispatch(&self, remote: &ParticipantId, cmd: LinkCommand) {
        let Some(link) = self.links.get(remote) else {
            warn!("Dropping {} from {}: no link", cmd.name(), remote);
            return;
        };
        if let Err(e) = link.commands.send(cmd) {
            warn!(
                "Dropping {} for {}: link is shutting down",
                e.0.name(),
                remote
            );
        }
    }

    /// Tears a link down. The link reports `Closed` before it is forgotten.
    /// Closing an unknown or already closed link is a no-op. The link is
    /// forgotten even if the transport fails to close.
    pub async fn close_link(&mut self, remote: &ParticipantId) -> Result<()> {
        self.shutdown(remote, true).await
    }

    /// Drives the link to `Closed` through its own task. A link that does
    /// not wind down within [`CLOSE_GRACE`] is aborted and its transport
    /// closed directly. With `announce` unset the `Closed` report is treated
    /// as stale, as for a link being replaced.
    async fn shutdown(&mut self, remote: &ParticipantId, announce: bool) -> Result<()> {
        let Some(link) = self.links.remove(remote) else {
            return Ok(());
        };
        info!("Closing link to {}", remote);

        let (reply, rx) = oneshot::channel();
        if link.commands.send(LinkCommand::Close { reply }).is_err() {
            debug!("Link to {} already finished", remote);
            return Ok(());
        }
        if announce {
            self.closing.insert((remote.clone(), link.generation));
        }

        match timeout(CLOSE_GRACE, rx).await {
            Ok(Ok(result)) => result,
            // The task ended on its own and closed the transport on the way out.
            Ok(Err(_)) => Ok(()),
            Err(_) => {
                warn!(
                    "Link to {} did not close within {:?}, aborting it",
                    remote, CLOSE_GRACE
                );
                self.closing.remove(&(remote.clone(), link.generation));
                link.task.abort();
                link.transport.close().await
            }
        }
    }

    /// Closes every link, carrying on past individual failures, and returns
    /// those failures.
    pub async fn close_all(&mut self) -> Vec<(ParticipantId, HuddleError)> {
        let mut failures = Vec::new();
        for remote in self.remotes() {
            if let Err(e) = self.close_link(&remote).await {
                warn!("Failed to close link to {}: {}", remote, e);
                failures.push((remote, e));
            }
        }
        failures
    }

    /// Swaps the outbound track of `kind` on every link. If any link refuses,
    /// the links already switched are put back on `previous` and the error is
    /// returned.
    pub async fn replace_track(
        &self,
        kind: MediaKind,
        track: Option<&LocalTrack>,
        previous: Option<&LocalTrack>,
    ) -> Result<()> {
        let mut switched = Vec::new();
        for remote in self.remotes() {
            let Some(link) = self.links.get(&remote) else {
                continue;
            };
            match Self::request_replace(link, kind, track.cloned()).await {
                Ok(true) => switched.push(remote),
                Ok(false) => debug!("Link to {} is shutting down, not replacing", remote),
                Err(e) => {
                    warn!(
                        "Replacing {:?} track on link to {} failed: {}. Rolling back {} link(s)",
                        kind,
                        remote,
                        e,
                        switched.len()
                    );
                    for remote in &switched {
                        let Some(link) = self.links.get(remote) else {
                            continue;
                        };
                        if let Err(e) = Self::request_replace(link, kind, previous.cloned()).await
                        {
                            warn!("Rollback on link to {} failed: {}", remote, e);
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// `Ok(false)` when the link task is gone.
    async fn request_replace(
        link: &LinkHandle,
        kind: MediaKind,
        track: Option<LocalTrack>,
    ) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        if link
            .commands
            .send(LinkCommand::ReplaceTrack { kind, track, reply })
            .is_err()
        {
            return Ok(false);
        }
        match rx.await {
            Ok(result) => result.map(|_| true),
            Err(_) => Ok(false),
        }
    }

    pub async fn snapshot(&self, remote: &ParticipantId) -> Option<LinkSnapshot> {
        let link = self.links.get(remote)?;
        let (reply, rx) = oneshot::channel();
        link.commands.send(LinkCommand::Inspect { reply }).ok()?;
        rx.await.ok()
    }

    /// Waits for the next report from any link, stale ones included. Feed
    /// it to [`Self::handle_report`].
    pub async fn next_report(&mut self) -> Option<LinkReport> {
        self.reports_rx.recv().await
    }

    /// Records a report. Returns it unless it came from a link that has since
    /// been replaced or closed; the `Closed` report of a link torn down by
    /// [`Self::close_link`] still comes through. Links reaching a terminal
    /// state are removed.
    pub fn handle_report(&mut self, report: LinkReport) -> Option<LinkReport> {
        let remote = report.remote().clone();
        let generation = report.generation();

        if let LinkReport::StateChanged {
            state: NegotiationState::Closed,
            ..
        } = &report
            && self.closing.remove(&(remote.clone(), generation))
        {
            return Some(report);
        }

        let Some(link) = self
            .links
            .get_mut(&remote)
            .filter(|link| link.generation == generation)
        else {
            debug!("Ignoring report from a stale link to {}", remote);
            return None;
        };

        if let LinkReport::StateChanged { state, .. } = &report {
            link.state = *state;
            if state.is_terminal() {
                self.links.remove(&remote);
                info!("Link to {} removed ({})", remote, state);
            }
        }
        Some(report)
    }
}
