pub mod test_abc123_scenario;
pub mod test_departures;
pub mod test_leave;

use crate::integration::{WAIT, wait_for_event};
use crate::utils::{FakeDevices, FakeNetwork, Switchboard};
use anyhow::{Context, Result, bail};
use huddle_client::{
    ClientConfig, MediaPreferences, Meeting, MeetingEvent, MeetingHandle, NegotiationState,
};
use huddle_core::{ConnectionId, ParticipantId};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub const ROOM: &str = "abc123";

/// A meeting running against the in-process relay.
pub struct Participant {
    pub handle: MeetingHandle,
    pub events: mpsc::UnboundedReceiver<MeetingEvent>,
    pub endpoint: ConnectionId,
    pub task: JoinHandle<()>,
}

pub async fn start_participant(
    board: &Switchboard,
    network: &FakeNetwork,
    identity: &str,
    devices: FakeDevices,
) -> Participant {
    let endpoint = board.connect(identity).await;
    let (meeting, events) = Meeting::new(
        identity,
        devices.shared(),
        network.factory(identity),
        endpoint.signaling,
        &ClientConfig::default(),
    );
    let (handle, task) = meeting.spawn(endpoint.inbound);
    Participant {
        handle,
        events,
        endpoint: endpoint.id,
        task,
    }
}

impl Participant {
    /// Joins [`ROOM`] and waits for the server to accept.
    pub async fn join(&mut self) -> Result<()> {
        self.handle
            .join(ROOM, None, MediaPreferences::default())
            .await?;
        wait_for_event(&mut self.events, |e| matches!(e, MeetingEvent::Joined { .. })).await?;
        Ok(())
    }

    /// Waits until links to every one of `remotes` reported `Connected`.
    pub async fn wait_connected(&mut self, remotes: &[&str]) -> Result<()> {
        let mut missing: HashSet<ParticipantId> =
            remotes.iter().map(|r| ParticipantId::from(*r)).collect();
        timeout(WAIT, async {
            while !missing.is_empty() {
                match self.events.recv().await {
                    Some(MeetingEvent::LinkStateChanged {
                        identity,
                        state: NegotiationState::Connected,
                    }) => {
                        missing.remove(&identity);
                    }
                    Some(_) => {}
                    None => bail!("meeting event stream closed"),
                }
            }
            Ok(())
        })
        .await
        .context("links never connected")?
    }
}

/// Starts `identities` in order, each joining once the previous one is in.
pub async fn full_room(
    board: &Switchboard,
    network: &FakeNetwork,
    identities: &[&str],
) -> Result<Vec<Participant>> {
    let mut participants = Vec::new();
    for identity in identities {
        let mut participant =
            start_participant(board, network, identity, FakeDevices::standard()).await;
        participant.join().await?;
        participants.push(participant);
    }
    for (i, participant) in participants.iter_mut().enumerate() {
        let others: Vec<&str> = identities
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, id)| *id)
            .collect();
        participant.wait_connected(&others).await?;
    }
    Ok(participants)
}
