//! Session manager: subscribes to identity changes and owns the session state.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use identity::error::{session_error, SessionErrorKind};
use identity::{Error, Identity, IdentityChange, Provider, ProviderKind, Storage, SubscriptionId};
use log::*;
use secrecy::SecretString;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::gate::Gate;
use crate::handle::SessionHandle;
use crate::ledger::Ledger;
use crate::settings::Settings;
use crate::snapshot::{Phase, Session};
use crate::synchronizer::Synchronizer;

/// Single source of truth for who is signed in.
///
/// Cloning is cheap and every clone refers to the same session. Construct one per process,
/// call [`Manager::initialize`] once from inside a Tokio runtime, and call
/// [`Manager::shutdown`] at teardown.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<Inner>,
}

struct Shared {
    ledger: Ledger,
    publisher: Option<watch::Sender<Session>>,
}

struct Inner {
    provider: Arc<dyn Provider>,
    synchronizer: Synchronizer,
    settings: Settings,
    shared: Mutex<Shared>,
    subscription: Mutex<Option<SubscriptionId>>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    syncs: Mutex<JoinSet<()>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn no_active_session() -> Error {
    session_error(
        SessionErrorKind::NoActiveSession,
        "Session used outside the session manager's active lifetime",
    )
}

impl Manager {
    pub fn new(provider: Arc<dyn Provider>, storage: Arc<dyn Storage>, settings: Settings) -> Self {
        let synchronizer = Synchronizer::new(storage, settings.default_display_name.clone());
        let (publisher, _) = watch::channel(Session::default());

        Self {
            inner: Arc::new(Inner {
                provider,
                synchronizer,
                settings,
                shared: Mutex::new(Shared {
                    ledger: Ledger::new(),
                    publisher: Some(publisher),
                }),
                subscription: Mutex::new(None),
                event_loop: Mutex::new(None),
                syncs: Mutex::new(JoinSet::new()),
            }),
        }
    }

    /// Subscribe to the provider's change stream and start processing changes.
    ///
    /// Must be called from within a Tokio runtime. Repeated calls while active are no-ops;
    /// calling after [`Manager::shutdown`] fails with `NoActiveSession`.
    pub fn initialize(&self) -> Result<(), Error> {
        {
            let mut shared = lock(&self.inner.shared);
            match shared.ledger.phase() {
                Phase::Uninitialized => {}
                Phase::Closed => return Err(no_active_session()),
                _ => {
                    warn!("Session manager already initialized");
                    return Ok(());
                }
            }
            shared.ledger.begin();
        }

        let subscription = self.inner.provider.subscribe();
        *lock(&self.inner.subscription) = Some(subscription.id);

        let handle = tokio::spawn(run_event_loop(
            Arc::downgrade(&self.inner),
            subscription.changes,
        ));
        *lock(&self.inner.event_loop) = Some(handle);

        info!("Session manager initialized; waiting for first identity change");
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        lock(&self.inner.shared).ledger.phase()
    }

    /// Current session snapshot.
    pub fn session(&self) -> Result<Session, Error> {
        self.inner.ensure_active()?;
        Ok(lock(&self.inner.shared).ledger.session().clone())
    }

    /// A reactive handle on the session.
    pub fn handle(&self) -> Result<SessionHandle, Error> {
        let receiver = self.inner.subscribe_snapshots()?;
        Ok(SessionHandle::new(self.clone(), receiver))
    }

    pub fn gate(&self) -> Result<Gate, Error> {
        Ok(Gate::new(self.inner.subscribe_snapshots()?))
    }

    /// Sign in with email and password.
    ///
    /// The profile store is not touched here; the resulting identity change triggers the sync.
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Identity, Error> {
        self.inner.ensure_active()?;

        let identity = self
            .inner
            .provider
            .sign_in_with_password(email, password)
            .await
            .inspect_err(|e| warn!("Password sign-in failed: {e}"))?;

        info!("Password sign-in succeeded for {}", identity.uid);
        Ok(identity)
    }

    /// Interactive Google sign-in. Creates the profile record only if none exists, so a
    /// display name stored earlier is never replaced by the provider's current one.
    pub async fn sign_in_with_google(&self) -> Result<Identity, Error> {
        self.inner.ensure_active()?;

        let identity = self
            .inner
            .provider
            .sign_in_interactive(ProviderKind::Google)
            .await
            .inspect_err(|e| warn!("Google sign-in failed: {e}"))?;

        let outcome = self
            .inner
            .synchronizer
            .ensure_profile(&identity)
            .await
            .inspect_err(|e| warn!("Google sign-in profile check failed: {e}"))?;

        info!(
            "Google sign-in succeeded for {} (profile {})",
            identity.uid,
            if outcome.was_created() { "created" } else { "existing" }
        );
        Ok(identity)
    }

    /// Create an account, name it, and write its initial profile record.
    ///
    /// The display name is applied to the local session before the provider's change event
    /// arrives. Failures after the account is created are returned as-is; the account is not
    /// rolled back.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        display_name: &str,
    ) -> Result<Identity, Error> {
        self.inner.ensure_active()?;

        let created = self
            .inner
            .provider
            .create_account(email, password)
            .await
            .inspect_err(|e| warn!("Sign-up failed: {e}"))?;

        self.inner
            .provider
            .update_display_name(&created, display_name)
            .await
            .inspect_err(|e| warn!("Setting display name for {} failed: {e}", created.uid))?;

        self.inner.apply_local_display_name(&created, display_name);
        let identity = created.with_display_name(display_name);

        self.inner
            .synchronizer
            .record_sign_up(&identity, display_name)
            .await
            .inspect_err(|e| warn!("Writing sign-up profile for {} failed: {e}", identity.uid))?;

        info!("Sign-up completed for {}", identity.uid);
        Ok(identity)
    }

    /// Sign out. The provider's following change event clears the identity.
    pub async fn logout(&self) -> Result<(), Error> {
        self.inner.ensure_active()?;

        self.inner
            .provider
            .sign_out()
            .await
            .inspect_err(|e| warn!("Sign-out failed: {e}"))?;

        lock(&self.inner.shared).ledger.discard_pending();
        info!("Signed out");
        Ok(())
    }

    /// Release the provider subscription, stop processing changes and drain in-flight
    /// profile syncs for up to `Settings::shutdown_grace`. Idempotent.
    pub async fn shutdown(&self) {
        {
            let mut shared = lock(&self.inner.shared);
            if shared.ledger.phase() == Phase::Closed {
                return;
            }
            shared.ledger.close();
            // Dropping the sender wakes every waiting handle with a closed error.
            shared.publisher = None;
        }

        self.inner.release_subscription();

        let event_loop = lock(&self.inner.event_loop).take();
        if let Some(event_loop) = event_loop {
            event_loop.abort();
            let _ = event_loop.await;
        }

        let mut syncs = std::mem::take(&mut *lock(&self.inner.syncs));
        let drained = tokio::time::timeout(self.inner.settings.shutdown_grace, async {
            while syncs.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                "Abandoning {} profile syncs still running after {:?}",
                syncs.len(),
                self.inner.settings.shutdown_grace
            );
            syncs.abort_all();
        }

        info!("Session manager shut down");
    }

    pub(crate) fn ensure_active(&self) -> Result<(), Error> {
        self.inner.ensure_active()
    }
}

impl Inner {
    fn ensure_active(&self) -> Result<(), Error> {
        if lock(&self.shared).ledger.phase().is_active() {
            Ok(())
        } else {
            Err(no_active_session())
        }
    }

    fn subscribe_snapshots(&self) -> Result<watch::Receiver<Session>, Error> {
        let shared = lock(&self.shared);
        match (&shared.publisher, shared.ledger.phase().is_active()) {
            (Some(publisher), true) => Ok(publisher.subscribe()),
            _ => Err(no_active_session()),
        }
    }

    fn on_identity_change(&self, change: IdentityChange) {
        if let Some(identity) = &change {
            self.spawn_profile_sync(identity.clone());
        }

        let mut shared = lock(&self.shared);
        let Shared { ledger, publisher } = &mut *shared;
        if let Some(session) = ledger.apply_provider_change(change) {
            debug!(
                "Session revision {}: {}",
                session.revision,
                session
                    .identity
                    .as_ref()
                    .map(|identity| identity.uid.as_str())
                    .unwrap_or("signed out")
            );
            if let Some(publisher) = publisher {
                publisher.send_replace(session);
            }
        }
    }

    fn apply_local_display_name(&self, identity: &Identity, display_name: &str) {
        let mut shared = lock(&self.shared);
        let Shared { ledger, publisher } = &mut *shared;
        if let Some(session) = ledger.apply_local_display_name(identity, display_name) {
            debug!(
                "Session revision {}: local display name for {}",
                session.revision, identity.uid
            );
            if let Some(publisher) = publisher {
                publisher.send_replace(session);
            }
        }
    }

    fn spawn_profile_sync(&self, identity: Identity) {
        let synchronizer = self.synchronizer.clone();
        let mut syncs = lock(&self.syncs);
        while syncs.try_join_next().is_some() {}

        syncs.spawn(async move {
            if let Err(e) = synchronizer.ensure_profile(&identity).await {
                warn!("Profile sync error for {}: {e}", identity.uid);
            }
        });
    }

    fn release_subscription(&self) {
        if let Some(id) = lock(&self.subscription).take() {
            self.provider.unsubscribe(&id);
            debug!("Released identity subscription {}", id.as_str());
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.release_subscription();
        if let Some(event_loop) = lock(&self.event_loop).take() {
            event_loop.abort();
        }
    }
}

async fn run_event_loop(inner: Weak<Inner>, mut changes: UnboundedReceiver<IdentityChange>) {
    while let Some(change) = changes.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.on_identity_change(change);
    }
    debug!("Identity change stream ended");
}
