//! In-memory identity provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use log::*;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::error::{auth_error, AuthErrorKind, Error};
use crate::provider::{Identity, IdentityChange, ProviderKind, Subscription, SubscriptionId};

/// Scripted result of the next interactive sign-in.
#[derive(Debug, Clone)]
pub enum InteractiveOutcome {
    /// The user completes the flow and the provider returns this identity.
    SignIn(Identity),
    /// The user closes the popup before finishing.
    Closed,
}

struct Account {
    identity: Identity,
    password: SecretString,
}

/// Identity provider that keeps accounts and the current identity in memory.
///
/// Password accounts are keyed by email, federated (interactive) identities by uid.
/// The current identity is broadcast to every subscriber whenever it changes.
pub struct Provider {
    accounts: DashMap<String, Account>,
    federated: DashMap<String, Identity>,
    current: Mutex<IdentityChange>,
    subscribers: DashMap<SubscriptionId, UnboundedSender<IdentityChange>>,
    interactive: Mutex<VecDeque<InteractiveOutcome>>,
    online: AtomicBool,
}

impl Provider {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            federated: DashMap::new(),
            current: Mutex::new(None),
            subscribers: DashMap::new(),
            interactive: Mutex::new(VecDeque::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Seed a password account without signing it in.
    pub fn add_account(&self, email: &str, password: &str, display_name: Option<&str>) -> Identity {
        let mut identity = Identity::new(uuid::Uuid::new_v4().to_string(), email);
        identity.display_name = display_name.map(str::to_string);
        self.accounts.insert(
            email.to_string(),
            Account {
                identity: identity.clone(),
                password: SecretString::new(password.to_string()),
            },
        );
        identity
    }

    /// Queue the outcome of the next interactive sign-in.
    pub fn queue_interactive(&self, outcome: InteractiveOutcome) {
        self.interactive
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
    }

    /// Simulate losing or regaining connectivity. While offline every remote call fails with
    /// `Network`.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// The identity currently signed in on this provider.
    pub fn current(&self) -> IdentityChange {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver a change to all subscribers without altering the current identity.
    ///
    /// Used to simulate redundant or stale notifications.
    pub fn emit(&self, change: IdentityChange) {
        self.subscribers.retain(|id, sender| {
            if sender.send(change.clone()).is_err() {
                debug!("Dropping closed identity subscription {}", id.as_str());
                false
            } else {
                true
            }
        });
    }

    fn set_current(&self, change: IdentityChange) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = change.clone();
        self.emit(change);
    }

    fn ensure_online(&self) -> Result<(), Error> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(auth_error(
                AuthErrorKind::Network,
                "Identity provider is unreachable",
            ))
        }
    }
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl crate::provider::Provider for Provider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, Error> {
        self.ensure_online()?;

        let identity = match self.accounts.get(email) {
            Some(account) if account.password.expose_secret() == password.expose_secret() => {
                account.identity.clone()
            }
            _ => {
                return Err(auth_error(
                    AuthErrorKind::InvalidCredentials,
                    "Email or password is incorrect",
                ))
            }
        };

        info!("Signed in {}", identity.uid);
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, Error> {
        self.ensure_online()?;

        if self.accounts.contains_key(email) {
            return Err(auth_error(
                AuthErrorKind::AccountAlreadyExists,
                "An account with this email already exists",
            ));
        }

        let identity = Identity::new(uuid::Uuid::new_v4().to_string(), email);
        self.accounts.insert(
            email.to_string(),
            Account {
                identity: identity.clone(),
                password: SecretString::new(password.expose_secret().clone()),
            },
        );

        info!("Created account {}", identity.uid);
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn update_display_name(&self, identity: &Identity, name: &str) -> Result<(), Error> {
        self.ensure_online()?;

        let updated = if let Some(mut account) = self.accounts.get_mut(&identity.email) {
            account.identity.display_name = Some(name.to_string());
            true
        } else if let Some(mut federated) = self.federated.get_mut(&identity.uid) {
            federated.display_name = Some(name.to_string());
            true
        } else {
            false
        };

        if !updated {
            return Err(auth_error(
                AuthErrorKind::InvalidCredentials,
                "No account exists for this identity",
            ));
        }

        // The provider updates its current user in place without notifying subscribers.
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(signed_in) = current.as_mut() {
            if signed_in.uid == identity.uid {
                signed_in.display_name = Some(name.to_string());
            }
        }
        Ok(())
    }

    async fn sign_in_interactive(&self, kind: ProviderKind) -> Result<Identity, Error> {
        self.ensure_online()?;

        let outcome = self
            .interactive
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(InteractiveOutcome::Closed);

        match outcome {
            InteractiveOutcome::Closed => Err(auth_error(
                AuthErrorKind::PopupClosedByUser,
                &format!("{} sign-in was closed before completing", kind.as_str()),
            )),
            InteractiveOutcome::SignIn(identity) => {
                self.federated.insert(identity.uid.clone(), identity.clone());
                info!("Signed in {} via {}", identity.uid, kind.as_str());
                self.set_current(Some(identity.clone()));
                Ok(identity)
            }
        }
    }

    async fn sign_out(&self) -> Result<(), Error> {
        self.ensure_online()?;
        self.set_current(None);
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        let (sender, changes) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();

        // New subscribers learn the current identity immediately.
        let _ = sender.send(self.current());
        self.subscribers.insert(id.clone(), sender);

        debug!("Registered identity subscription {}", id.as_str());
        Subscription { id, changes }
    }

    fn unsubscribe(&self, id: &SubscriptionId) {
        if self.subscribers.remove(id).is_some() {
            debug!("Released identity subscription {}", id.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::provider::Provider as _;

    fn password(value: &str) -> SecretString {
        SecretString::new(value.to_string())
    }

    #[tokio::test]
    async fn test_subscribe_delivers_current_identity_first() {
        let provider = Provider::new();
        let mut subscription = provider.subscribe();

        assert_eq!(subscription.changes.recv().await, Some(None));
        assert_eq!(provider.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_create_account_emits_identity_without_display_name() {
        let provider = Provider::new();
        let mut subscription = provider.subscribe();
        let _ = subscription.changes.recv().await;

        let identity = provider
            .create_account("a@x.com", &password("pw"))
            .await
            .unwrap();

        let change = subscription.changes.recv().await.unwrap();
        assert_eq!(change, Some(identity.clone()));
        assert!(identity.display_name.is_none());
    }

    #[tokio::test]
    async fn test_create_account_rejects_duplicate_email() {
        let provider = Provider::new();
        provider.add_account("a@x.com", "pw", None);

        let err = provider
            .create_account("a@x.com", &password("other"))
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Auth(AuthErrorKind::AccountAlreadyExists)
        );
    }

    #[tokio::test]
    async fn test_sign_in_with_wrong_password_fails() {
        let provider = Provider::new();
        provider.add_account("a@x.com", "pw", None);

        let err = provider
            .sign_in_with_password("a@x.com", &password("nope"))
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Auth(AuthErrorKind::InvalidCredentials)
        );
        assert!(provider.current().is_none());
    }

    #[tokio::test]
    async fn test_offline_provider_reports_network_error() {
        let provider = Provider::new();
        provider.add_account("a@x.com", "pw", None);
        provider.set_online(false);

        let err = provider
            .sign_in_with_password("a@x.com", &password("pw"))
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Auth(AuthErrorKind::Network));
    }

    #[tokio::test]
    async fn test_update_display_name_does_not_notify() {
        let provider = Provider::new();
        let identity = provider
            .create_account("a@x.com", &password("pw"))
            .await
            .unwrap();
        let mut subscription = provider.subscribe();
        let _ = subscription.changes.recv().await;

        provider.update_display_name(&identity, "Ada").await.unwrap();

        assert!(subscription.changes.try_recv().is_err());
        assert_eq!(
            provider.current().unwrap().display_name.as_deref(),
            Some("Ada")
        );
    }

    #[tokio::test]
    async fn test_interactive_sign_in_without_script_is_closed() {
        let provider = Provider::new();
        let err = provider
            .sign_in_interactive(ProviderKind::Google)
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Auth(AuthErrorKind::PopupClosedByUser)
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let provider = Provider::new();
        let subscription = provider.subscribe();
        provider.unsubscribe(&subscription.id);
        assert_eq!(provider.subscriber_count(), 0);

        provider.sign_out().await.unwrap();
        assert_eq!(provider.subscriber_count(), 0);
    }
}
