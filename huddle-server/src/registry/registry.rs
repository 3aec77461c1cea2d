use crate::registry::room::{Participant, Room};
use dashmap::DashMap;
use huddle_core::{ConnectionId, ParticipantId, ParticipantInfo, RoomId};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// One (room, identity) registration held by an endpoint.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Membership {
    pub room_id: RoomId,
    pub identity: ParticipantId,
}

#[derive(Debug)]
pub struct JoinOutcome {
    /// Every other member of the room at the time of the join.
    pub existing: Vec<Participant>,
    /// Endpoint of the entry this join replaced (re-join after reconnect).
    pub replaced: Option<ConnectionId>,
}

/// A removed member and the members left behind in its room.
#[derive(Debug, Clone)]
pub struct Departure {
    pub room_id: RoomId,
    pub participant: Participant,
    pub remaining: Vec<Participant>,
}

/// Room and presence registry.
///
/// Each room is mutated only while its map entry is locked, so writes to one
/// room are serialized while other rooms proceed independently. The endpoint
/// index is always locked after a room entry, never before.
#[derive(Default)]
pub struct Registry {
    rooms: DashMap<RoomId, Room>,
    endpoints: DashMap<ConnectionId, BTreeSet<Membership>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, room_id: &RoomId, info: ParticipantInfo, endpoint: ConnectionId) -> JoinOutcome {
        let identity = info.identity.clone();

        let mut room = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            info!("Creating room {}", room_id);
            Room::new(room_id.clone())
        });

        let replaced = room
            .insert(Participant { info, endpoint })
            .map(|stale| stale.endpoint);

        if let Some(stale) = replaced.filter(|stale| *stale != endpoint) {
            info!(
                "Participant {} re-joined room {} from a new endpoint (was {})",
                identity, room_id, stale
            );
            self.unindex(stale, room_id, &identity);
        }

        self.endpoints.entry(endpoint).or_default().insert(Membership {
            room_id: room_id.clone(),
            identity: identity.clone(),
        });

        let existing = room.members_except(Some(&identity));
        debug!(
            "Participant {} joined room {} ({} members)",
            identity,
            room_id,
            room.len()
        );

        JoinOutcome { existing, replaced }
    }

    /// Removes `identity` from `room_id`. Unknown rooms or identities are a
    /// no-op.
    pub fn leave(&self, room_id: &RoomId, identity: &ParticipantId) -> Option<Departure> {
        self.remove_member(room_id, identity, None)
    }

    /// Like [`Registry::leave`], but only if the entry was registered by
    /// `endpoint`. A stale connection cannot evict its own replacement.
    pub fn leave_from(
        &self,
        room_id: &RoomId,
        identity: &ParticipantId,
        endpoint: ConnectionId,
    ) -> Option<Departure> {
        self.remove_member(room_id, identity, Some(endpoint))
    }

    /// Drops every membership registered by a closed endpoint.
    pub fn on_endpoint_closed(&self, endpoint: ConnectionId) -> Vec<Departure> {
        let Some((_, memberships)) = self.endpoints.remove(&endpoint) else {
            return Vec::new();
        };

        memberships
            .into_iter()
            .filter_map(|m| self.remove_member(&m.room_id, &m.identity, Some(endpoint)))
            .collect()
    }

    pub fn resolve_endpoint(&self, room_id: &RoomId, identity: &ParticipantId) -> Option<ConnectionId> {
        let room = self.rooms.get(room_id)?;
        room.get(identity).map(|p| p.endpoint)
    }

    /// Resolves `recipient` within the rooms `sender` is registered in.
    pub fn route(&self, sender: ConnectionId, recipient: &ParticipantId) -> Option<ConnectionId> {
        self.memberships(sender)
            .iter()
            .find_map(|m| self.resolve_endpoint(&m.room_id, recipient))
    }

    pub fn memberships(&self, endpoint: ConnectionId) -> Vec<Membership> {
        self.endpoints
            .get(&endpoint)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn members(&self, room_id: &RoomId) -> Vec<Participant> {
        self.rooms
            .get(room_id)
            .map(|room| room.members_except(None))
            .unwrap_or_default()
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn remove_member(
        &self,
        room_id: &RoomId,
        identity: &ParticipantId,
        expected: Option<ConnectionId>,
    ) -> Option<Departure> {
        let departure = {
            let Some(mut room) = self.rooms.get_mut(room_id) else {
                debug!("Leave for unknown room {} ignored", room_id);
                return None;
            };
            let Some(participant) = room.remove(identity, expected) else {
                debug!("Leave for {} not registered in room {} ignored", identity, room_id);
                return None;
            };
            self.unindex(participant.endpoint, room_id, identity);

            Departure {
                room_id: room_id.clone(),
                remaining: room.members_except(None),
                participant,
            }
        };

        if self.rooms.remove_if(room_id, |_, room| room.is_empty()).is_some() {
            info!("Room {} is empty, removing", room_id);
        }

        Some(departure)
    }

    fn unindex(&self, endpoint: ConnectionId, room_id: &RoomId, identity: &ParticipantId) {
        let membership = Membership {
            room_id: room_id.clone(),
            identity: identity.clone(),
        };
        if let Some(mut set) = self.endpoints.get_mut(&endpoint) {
            set.remove(&membership);
        }
        self.endpoints.remove_if(&endpoint, |_, set| set.is_empty());
    }
}
