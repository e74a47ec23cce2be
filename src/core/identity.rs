//! Player Identity
//!
//! What the remote service tells us about the signed-in player.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Stable 16-byte player identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Derive a deterministic id from a remote subject string.
    pub fn from_subject(subject: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"chewman-player:");
        hasher.update(subject.as_bytes());
        let hash = hasher.finalize();

        let mut id = [0u8; 16];
        id.copy_from_slice(&hash[..16]);
        Self(id)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Short hex prefix for log lines.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

/// Signed-in player, as reported by the session layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    /// Subject from the identity provider.
    pub subject: String,
    /// Display name, if the provider returned one.
    pub display_name: Option<String>,
    /// Derived player id.
    pub player_id: PlayerId,
}

impl PlayerIdentity {
    /// Build an identity from the provider subject and optional display name.
    pub fn new(subject: impl Into<String>, display_name: Option<String>) -> Self {
        let subject = subject.into();
        let player_id = PlayerId::from_subject(&subject);
        Self {
            subject,
            display_name,
            player_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_is_stable() {
        let a = PlayerId::from_subject("g:1234");
        let b = PlayerId::from_subject("g:1234");
        let c = PlayerId::from_subject("g:9999");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.short_hex().len(), 8);
    }

    #[test]
    fn test_identity_derives_id() {
        let identity = PlayerIdentity::new("g:1234", Some("Ann".to_string()));
        assert_eq!(identity.player_id, PlayerId::from_subject("g:1234"));
    }
}
