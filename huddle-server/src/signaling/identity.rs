use async_trait::async_trait;
use huddle_core::ParticipantInfo;

/// Resolves the credentials presented on connect into a participant.
///
/// Authentication itself lives outside the signaling server; this is the
/// seam through which it is consulted.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, token: &str, display_name: Option<&str>) -> Option<ParticipantInfo>;
}

/// Trusts the token as the participant identity. Suitable when a fronting
/// proxy has already authenticated the user.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenIdentity;

#[async_trait]
impl IdentityProvider for TokenIdentity {
    async fn authenticate(&self, token: &str, display_name: Option<&str>) -> Option<ParticipantInfo> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(token);
        Some(ParticipantInfo::new(token, display_name))
    }
}
