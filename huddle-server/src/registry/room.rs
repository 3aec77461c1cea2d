use huddle_core::{ConnectionId, ParticipantId, ParticipantInfo, RoomId};
use std::collections::HashMap;

/// A room member together with the signaling connection that reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub info: ParticipantInfo,
    pub endpoint: ConnectionId,
}

impl Participant {
    pub fn identity(&self) -> &ParticipantId {
        &self.info.identity
    }
}

#[derive(Debug)]
pub struct Room {
    id: RoomId,
    members: HashMap<ParticipantId, Participant>,
}

impl Room {
    pub(crate) fn new(id: RoomId) -> Self {
        Self {
            id,
            members: HashMap::new(),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Inserts or replaces the member, returning the previous entry.
    pub(crate) fn insert(&mut self, participant: Participant) -> Option<Participant> {
        self.members
            .insert(participant.identity().clone(), participant)
    }

    /// Removes `identity`. With `expected` set, only an entry registered from
    /// that endpoint is removed.
    pub(crate) fn remove(
        &mut self,
        identity: &ParticipantId,
        expected: Option<ConnectionId>,
    ) -> Option<Participant> {
        let registered = self.members.get(identity)?;
        if expected.is_some_and(|endpoint| endpoint != registered.endpoint) {
            return None;
        }
        self.members.remove(identity)
    }

    pub fn get(&self, identity: &ParticipantId) -> Option<&Participant> {
        self.members.get(identity)
    }

    /// Members sorted by identity, optionally leaving one out.
    pub fn members_except(&self, excluded: Option<&ParticipantId>) -> Vec<Participant> {
        let mut members: Vec<Participant> = self
            .members
            .values()
            .filter(|p| Some(p.identity()) != excluded)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.identity().cmp(b.identity()));
        members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
