//! Session gate: whether remote calls are currently possible.

use std::sync::RwLock;

use crate::core::identity::PlayerIdentity;

/// Holds the signed-in identity, if any.
#[derive(Debug, Default)]
pub struct SessionGate {
    identity: RwLock<Option<PlayerIdentity>>,
}

impl SessionGate {
    /// Create a gate with nobody signed in.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an established session.
    pub fn establish(&self, identity: PlayerIdentity) {
        *self.identity.write().unwrap_or_else(|e| e.into_inner()) = Some(identity);
    }

    /// Forget the session.
    pub fn clear(&self) {
        *self.identity.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Check if a session is established.
    pub fn is_active(&self) -> bool {
        self.identity.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Current identity.
    pub fn identity(&self) -> Option<PlayerIdentity> {
        self.identity.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_establish_and_clear() {
        let gate = SessionGate::new();
        assert!(!gate.is_active());

        gate.establish(PlayerIdentity::new("g:1", None));
        assert!(gate.is_active());
        assert_eq!(gate.identity().map(|i| i.subject), Some("g:1".to_string()));

        gate.clear();
        assert!(!gate.is_active());
        assert!(gate.identity().is_none());
    }
}
