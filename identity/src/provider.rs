//! Identity provider trait and types.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::Error;

/// Known interactive (social) sign-in providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Google,
}

impl ProviderKind {
    /// Get the provider identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
        }
    }
}

/// An authenticated principal issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider's opaque, stable identifier.
    pub uid: String,
    /// User's email address.
    pub email: String,
    /// User's display name, if one has been set.
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// A single notification on the provider's change stream: the current identity, or `None`
/// when nobody is signed in.
pub type IdentityChange = Option<Identity>;

/// Unique identifier for a change-stream subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to the provider's change stream.
///
/// Changes arrive on `changes` in emission order. The subscription stays live until the
/// holder passes `id` back to [`Provider::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub changes: UnboundedReceiver<IdentityChange>,
}

/// Trait for identity providers.
///
/// Implementations own the authoritative view of who is signed in on this device and
/// notify subscribers whenever it changes.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Sign in with an email and password.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` when the provider rejects the pair, `Network` when it cannot be reached.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, Error>;

    /// Create a new account and sign it in.
    ///
    /// # Errors
    ///
    /// `AccountAlreadyExists` when the email is taken, `Network` when unreachable.
    async fn create_account(&self, email: &str, password: &SecretString)
        -> Result<Identity, Error>;

    /// Update the provider-side display name for an identity.
    async fn update_display_name(&self, identity: &Identity, name: &str) -> Result<(), Error>;

    /// Run a provider-driven interactive sign-in (e.g. a popup).
    ///
    /// # Errors
    ///
    /// `PopupClosedByUser` when the user abandons the flow, `Network` when unreachable.
    async fn sign_in_interactive(&self, kind: ProviderKind) -> Result<Identity, Error>;

    /// Sign out the current identity.
    async fn sign_out(&self) -> Result<(), Error>;

    /// Subscribe to identity changes.
    ///
    /// The current identity (or `None`) is delivered to a new subscriber immediately.
    fn subscribe(&self) -> Subscription;

    /// Release a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: &SubscriptionId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_as_str() {
        assert_eq!(ProviderKind::Google.as_str(), "google");
    }

    #[test]
    fn test_identity_builder_sets_display_name() {
        let identity = Identity::new("uid-1", "a@x.com").with_display_name("Ada");
        assert_eq!(identity.uid, "uid-1");
        assert_eq!(identity.display_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        assert_ne!(SubscriptionId::new(), SubscriptionId::new());
    }
}
