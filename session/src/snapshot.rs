use identity::Identity;

/// Lifecycle phase of a session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, not yet subscribed to identity changes.
    Uninitialized,
    /// Subscribed, waiting for the first identity change.
    Resolving,
    Authenticated,
    Anonymous,
    /// Torn down; the subscription has been released.
    Closed,
}

impl Phase {
    /// True while the manager accepts operations.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Phase::Resolving | Phase::Authenticated | Phase::Anonymous
        )
    }
}

/// Local, authoritative view of the current identity.
///
/// `identity` must not be read by dependent UI while `resolved` is false.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub identity: Option<Identity>,
    /// Set by the first identity change after initialization and never cleared.
    pub resolved: bool,
    /// Monotonic counter bumped on every published change.
    pub revision: u64,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.resolved && self.identity.is_some()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.identity
            .as_ref()
            .and_then(|identity| identity.display_name.as_deref())
    }
}
