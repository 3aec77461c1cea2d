use crate::peer::TransportState;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    New,
    HaveLocalOffer,
    HaveRemoteOffer,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl NegotiationState {
    /// Terminal states tear the link down.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed | Self::Closed)
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::HaveLocalOffer => "have-local-offer",
            Self::HaveRemoteOffer => "have-remote-offer",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Which side sent the first offer. The answerer is the polite side when two
/// renegotiation offers collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Offerer,
    Answerer,
}

impl Role {
    pub fn is_polite(&self) -> bool {
        matches!(self, Self::Answerer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationInput {
    LocalOffer,
    RemoteOffer,
    LocalAnswer,
    RemoteAnswer,
    Transport(TransportState),
    TimedOut,
    /// A local operation on the transport failed.
    Fail,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{input:?} is not valid in state {from}")]
pub struct InvalidTransition {
    pub from: NegotiationState,
    pub input: NegotiationInput,
}

/// Offer/answer state machine of one link.
///
/// `Connected` requires both a completed offer/answer exchange and a connected
/// transport, so a renegotiation passes through `HaveLocalOffer` or
/// `HaveRemoteOffer` and settles back into `Connected` once its answer lands.
#[derive(Debug, Clone)]
pub struct Negotiation {
    state: NegotiationState,
    role: Role,
    exchange_complete: bool,
    transport_up: bool,
    ever_connected: bool,
}

impl Negotiation {
    pub fn new(role: Role) -> Self {
        Self {
            state: NegotiationState::New,
            role,
            exchange_complete: false,
            transport_up: false,
            ever_connected: false,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn ever_connected(&self) -> bool {
        self.ever_connected
    }

    /// True when a new local offer may be sent right away.
    pub fn can_offer(&self) -> bool {
        matches!(
            self.state,
            NegotiationState::New | NegotiationState::Connected
        )
    }

    pub fn apply(&mut self, input: NegotiationInput) -> Result<NegotiationState, InvalidTransition> {
        use NegotiationInput as I;
        use NegotiationState as S;

        let invalid = InvalidTransition {
            from: self.state,
            input,
        };
        if self.state.is_terminal() {
            return Err(invalid);
        }

        let next = match (self.state, input) {
            (_, I::Close) => S::Closed,
            (_, I::Fail) => S::Failed,
            (_, I::TimedOut) if !self.ever_connected => S::Failed,
            (S::New | S::Connected, I::LocalOffer) => {
                self.exchange_complete = false;
                S::HaveLocalOffer
            }
            (S::New | S::Connected, I::RemoteOffer) => {
                self.exchange_complete = false;
                S::HaveRemoteOffer
            }
            // Glare: only the polite side abandons its own offer.
            (S::HaveLocalOffer, I::RemoteOffer) if self.role.is_polite() => S::HaveRemoteOffer,
            (S::HaveRemoteOffer, I::LocalAnswer) | (S::HaveLocalOffer, I::RemoteAnswer) => {
                self.exchange_complete = true;
                self.settle()
            }
            (_, I::Transport(transport)) => match transport {
                TransportState::Connected => {
                    self.transport_up = true;
                    self.settle()
                }
                TransportState::Disconnected => S::Disconnected,
                TransportState::Failed => S::Failed,
                TransportState::Closed => S::Closed,
                TransportState::New | TransportState::Connecting => self.state,
            },
            _ => return Err(invalid),
        };

        if next == S::Connected {
            self.ever_connected = true;
        }
        self.state = next;
        Ok(next)
    }

    fn settle(&self) -> NegotiationState {
        if self.exchange_complete && self.transport_up {
            NegotiationState::Connected
        } else {
            self.state
        }
    }
}
