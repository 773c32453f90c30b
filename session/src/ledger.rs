//! Session state machine and the rule that reconciles optimistic local writes with the
//! provider's change stream.

use identity::{Identity, IdentityChange};
use log::*;

use crate::snapshot::{Phase, Session};

/// A display name applied locally before the provider has echoed it back.
#[derive(Debug, Clone, PartialEq)]
struct LocalWrite {
    uid: String,
    display_name: String,
    /// Provider-side name at the time of the write.
    previous: Option<String>,
    revision: u64,
}

/// Owns the session snapshot, the lifecycle phase and any pending local write.
///
/// While a local write is pending, a provider change for the same uid that still carries the
/// name from before the write is a stale echo and the local name wins. Any other name for that
/// uid is newer provider state: it wins and retires the pending write. The pending write also
/// retires when a change for another uid (or no identity) arrives, or when it is discarded.
#[derive(Debug)]
pub(crate) struct Ledger {
    phase: Phase,
    session: Session,
    pending: Option<LocalWrite>,
}

impl Ledger {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::Uninitialized,
            session: Session::default(),
            pending: None,
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    /// Move from Uninitialized to Resolving. Returns false from any other phase.
    pub(crate) fn begin(&mut self) -> bool {
        if self.phase != Phase::Uninitialized {
            return false;
        }
        self.phase = Phase::Resolving;
        true
    }

    pub(crate) fn close(&mut self) {
        self.phase = Phase::Closed;
        self.pending = None;
    }

    /// Apply a change from the provider's stream.
    ///
    /// Marks the session resolved, then replaces the identity. Returns the snapshot to publish,
    /// or `None` when the ledger is not active.
    pub(crate) fn apply_provider_change(&mut self, change: IdentityChange) -> Option<Session> {
        if !self.phase.is_active() {
            return None;
        }

        self.session.resolved = true;

        let identity = match (change, self.pending.take()) {
            (Some(mut incoming), Some(pending)) if incoming.uid == pending.uid => {
                if incoming.display_name == pending.previous
                    && pending.previous.as_deref() != Some(pending.display_name.as_str())
                {
                    debug!(
                        "Ignoring stale display name for {} in favour of local revision {}",
                        incoming.uid, pending.revision
                    );
                    incoming.display_name = Some(pending.display_name.clone());
                    self.pending = Some(pending);
                } else {
                    debug!(
                        "Provider display name for {} supersedes local revision {}",
                        incoming.uid, pending.revision
                    );
                }
                Some(incoming)
            }
            (change, _) => change,
        };

        self.phase = if identity.is_some() {
            Phase::Authenticated
        } else {
            Phase::Anonymous
        };
        self.session.identity = identity;
        Some(self.bump())
    }

    /// Optimistically apply a display name for `identity` ahead of the provider.
    ///
    /// `identity` is the provider's view before the rename; its display name is what a later
    /// stale echo will still carry.
    ///
    /// Does not resolve the session. Returns the snapshot to publish, or `None` when the
    /// ledger is not active.
    pub(crate) fn apply_local_display_name(
        &mut self,
        identity: &Identity,
        display_name: &str,
    ) -> Option<Session> {
        if !self.phase.is_active() {
            return None;
        }

        let mut local = match &self.session.identity {
            Some(current) if current.uid == identity.uid => current.clone(),
            _ => identity.clone(),
        };
        local.display_name = Some(display_name.to_string());
        self.session.identity = Some(local);

        if self.session.resolved {
            self.phase = Phase::Authenticated;
        }

        let session = self.bump();
        self.pending = Some(LocalWrite {
            uid: identity.uid.clone(),
            display_name: display_name.to_string(),
            previous: identity.display_name.clone(),
            revision: session.revision,
        });
        Some(session)
    }

    pub(crate) fn discard_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(
                "Discarding pending display name for {} (revision {})",
                pending.uid, pending.revision
            );
        }
    }

    fn bump(&mut self) -> Session {
        self.session.revision += 1;
        self.session.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        assert!(ledger.begin());
        ledger
    }

    fn ada() -> Identity {
        Identity::new("u1", "a@x.com")
    }

    #[test]
    fn test_new_ledger_is_uninitialized_and_unresolved() {
        let ledger = Ledger::new();
        assert_eq!(ledger.phase(), Phase::Uninitialized);
        assert!(!ledger.session().resolved);
        assert!(ledger.session().identity.is_none());
    }

    #[test]
    fn test_begin_only_once() {
        let mut ledger = active_ledger();
        assert_eq!(ledger.phase(), Phase::Resolving);
        assert!(!ledger.begin());
    }

    #[test]
    fn test_changes_ignored_before_begin_and_after_close() {
        let mut ledger = Ledger::new();
        assert!(ledger.apply_provider_change(None).is_none());
        assert!(!ledger.session().resolved);

        let mut ledger = active_ledger();
        ledger.close();
        assert!(ledger.apply_provider_change(Some(ada())).is_none());
        assert!(ledger.apply_local_display_name(&ada(), "Ada").is_none());
        assert!(!ledger.begin());
    }

    #[test]
    fn test_resolved_flips_on_first_change_and_never_reverts() {
        let mut ledger = active_ledger();
        let changes = vec![
            None,
            Some(ada()),
            Some(ada()),
            None,
            Some(Identity::new("u2", "b@x.com")),
            None,
        ];

        let mut last_revision = 0;
        for change in changes {
            let session = ledger.apply_provider_change(change.clone()).unwrap();
            assert!(session.resolved);
            assert_eq!(session.identity, change);
            assert!(session.revision > last_revision);
            last_revision = session.revision;
        }
        assert_eq!(ledger.phase(), Phase::Anonymous);
    }

    #[test]
    fn test_local_write_before_first_change_keeps_session_unresolved() {
        let mut ledger = active_ledger();
        let session = ledger.apply_local_display_name(&ada(), "Ada").unwrap();

        assert!(!session.resolved);
        assert_eq!(session.display_name(), Some("Ada"));
        assert_eq!(ledger.phase(), Phase::Resolving);
    }

    #[test]
    fn test_stale_echo_keeps_local_display_name() {
        let mut ledger = active_ledger();
        ledger.apply_provider_change(None);
        ledger.apply_local_display_name(&ada(), "Ada");

        // Provider still reports the pre-update identity, twice.
        for _ in 0..2 {
            let session = ledger.apply_provider_change(Some(ada())).unwrap();
            assert_eq!(session.display_name(), Some("Ada"));
            assert_eq!(ledger.phase(), Phase::Authenticated);
        }
    }

    #[test]
    fn test_matching_echo_retires_pending_write() {
        let mut ledger = active_ledger();
        ledger.apply_local_display_name(&ada(), "Ada");
        ledger.apply_provider_change(Some(ada().with_display_name("Ada")));

        let session = ledger
            .apply_provider_change(Some(ada().with_display_name("Bob")))
            .unwrap();
        assert_eq!(session.display_name(), Some("Bob"));
    }

    #[test]
    fn test_newer_provider_name_supersedes_pending_write() {
        let mut ledger = active_ledger();
        ledger.apply_provider_change(Some(ada()));
        ledger.apply_local_display_name(&ada(), "Ada");

        // Pre-rename event still in flight.
        let session = ledger.apply_provider_change(Some(ada())).unwrap();
        assert_eq!(session.display_name(), Some("Ada"));

        let session = ledger
            .apply_provider_change(Some(ada().with_display_name("Augusta")))
            .unwrap();
        assert_eq!(session.display_name(), Some("Augusta"));

        // The pending write is gone, so the provider's view is taken as-is from here on.
        let session = ledger.apply_provider_change(Some(ada())).unwrap();
        assert_eq!(session.display_name(), None);
    }

    #[test]
    fn test_rename_of_named_identity_masks_only_the_old_name() {
        let mut ledger = active_ledger();
        let named = ada().with_display_name("Ada");
        ledger.apply_provider_change(Some(named.clone()));
        ledger.apply_local_display_name(&named, "Augusta");

        let session = ledger.apply_provider_change(Some(named.clone())).unwrap();
        assert_eq!(session.display_name(), Some("Augusta"));

        let session = ledger
            .apply_provider_change(Some(ada().with_display_name("Bea")))
            .unwrap();
        assert_eq!(session.display_name(), Some("Bea"));
    }

    #[test]
    fn test_change_for_other_identity_retires_pending_write() {
        let mut ledger = active_ledger();
        ledger.apply_local_display_name(&ada(), "Ada");

        let other = Identity::new("u2", "b@x.com");
        let session = ledger.apply_provider_change(Some(other.clone())).unwrap();
        assert_eq!(session.identity, Some(other));

        let session = ledger.apply_provider_change(Some(ada())).unwrap();
        assert_eq!(session.display_name(), None);
    }

    #[test]
    fn test_absent_change_signs_out_and_retires_pending_write() {
        let mut ledger = active_ledger();
        ledger.apply_local_display_name(&ada(), "Ada");

        let session = ledger.apply_provider_change(None).unwrap();
        assert!(session.identity.is_none());
        assert!(session.resolved);

        let session = ledger.apply_provider_change(Some(ada())).unwrap();
        assert_eq!(session.display_name(), None);
    }

    #[test]
    fn test_discard_pending_lets_provider_name_through() {
        let mut ledger = active_ledger();
        ledger.apply_local_display_name(&ada(), "Ada");
        ledger.discard_pending();

        let session = ledger.apply_provider_change(Some(ada())).unwrap();
        assert_eq!(session.display_name(), None);
    }

    #[test]
    fn test_local_write_preserves_current_identity_fields() {
        let mut ledger = active_ledger();
        ledger.apply_provider_change(Some(ada()));

        let stale_copy = Identity::new("u1", "old@x.com");
        let session = ledger.apply_local_display_name(&stale_copy, "Ada").unwrap();
        let identity = session.identity.unwrap();
        assert_eq!(identity.email, "a@x.com");
        assert_eq!(identity.display_name.as_deref(), Some("Ada"));
    }
}
