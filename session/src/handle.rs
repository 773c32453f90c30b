use identity::error::{session_error, Error, SessionErrorKind};
use identity::Identity;
use secrecy::SecretString;
use tokio::sync::watch;

use crate::gate::Gate;
use crate::manager::Manager;
use crate::snapshot::Session;

/// Cloneable, reactive access to the session and its operations.
///
/// Every accessor fails with `NoActiveSession` once the owning manager has shut down.
#[derive(Clone)]
pub struct SessionHandle {
    manager: Manager,
    receiver: watch::Receiver<Session>,
}

impl SessionHandle {
    pub(crate) fn new(manager: Manager, receiver: watch::Receiver<Session>) -> Self {
        Self { manager, receiver }
    }

    pub fn session(&self) -> Result<Session, Error> {
        self.manager.ensure_active()?;
        Ok(self.receiver.borrow().clone())
    }

    pub fn identity(&self) -> Result<Option<Identity>, Error> {
        Ok(self.session()?.identity)
    }

    pub fn is_resolved(&self) -> Result<bool, Error> {
        Ok(self.session()?.resolved)
    }

    /// Wait for the next published snapshot.
    pub async fn changed(&mut self) -> Result<Session, Error> {
        self.manager.ensure_active()?;
        self.receiver.changed().await.map_err(|_| closed())?;
        Ok(self.receiver.borrow_and_update().clone())
    }

    /// Wait until a snapshot satisfies `predicate`, checking the current one first.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&Session) -> bool,
    ) -> Result<Session, Error> {
        self.manager.ensure_active()?;
        self.receiver
            .wait_for(predicate)
            .await
            .map(|session| session.clone())
            .map_err(|_| closed())
    }

    pub fn gate(&self) -> Gate {
        Gate::new(self.receiver.clone())
    }

    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Identity, Error> {
        self.manager.sign_in(email, password).await
    }

    pub async fn sign_in_with_google(&self) -> Result<Identity, Error> {
        self.manager.sign_in_with_google().await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        display_name: &str,
    ) -> Result<Identity, Error> {
        self.manager.sign_up(email, password, display_name).await
    }

    pub async fn logout(&self) -> Result<(), Error> {
        self.manager.logout().await
    }
}

fn closed() -> Error {
    session_error(
        SessionErrorKind::NoActiveSession,
        "Session manager shut down",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use identity::error::ErrorKind;
    use identity::in_memory;
    use std::sync::Arc;
    use std::time::Duration;

    fn manager() -> (Manager, Arc<in_memory::Provider>) {
        let provider = Arc::new(in_memory::Provider::new());
        let storage = Arc::new(in_memory::Storage::new());
        let manager = Manager::new(provider.clone(), storage, Settings::default());
        (manager, provider)
    }

    #[tokio::test]
    async fn test_handle_observes_sign_in() {
        let (manager, provider) = manager();
        provider.add_account("a@x.com", "pw", Some("Ada"));
        manager.initialize().unwrap();
        let mut handle = manager.handle().unwrap();

        handle
            .sign_in("a@x.com", &SecretString::new("pw".to_string()))
            .await
            .unwrap();
        let session = tokio::time::timeout(
            Duration::from_secs(2),
            handle.wait_for(|s| s.identity.is_some()),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(session.display_name(), Some("Ada"));
        assert!(handle.is_resolved().unwrap());
        assert_eq!(handle.identity().unwrap().unwrap().email, "a@x.com");
    }

    #[tokio::test]
    async fn test_changed_fails_after_shutdown() {
        let (manager, _provider) = manager();
        manager.initialize().unwrap();
        let mut handle = manager.handle().unwrap();
        let waiter = {
            let mut handle = handle.clone();
            tokio::spawn(async move {
                loop {
                    if let Err(e) = handle.changed().await {
                        return e;
                    }
                }
            })
        };

        manager.shutdown().await;

        let err = waiter.await.unwrap();
        assert_eq!(
            err.error_kind,
            ErrorKind::Session(SessionErrorKind::NoActiveSession)
        );
        assert!(handle.changed().await.is_err());
        assert!(handle.identity().is_err());
    }

    #[tokio::test]
    async fn test_handle_gate_becomes_ready() {
        let (manager, _provider) = manager();
        manager.initialize().unwrap();
        let mut gate = manager.handle().unwrap().gate();

        let session = tokio::time::timeout(Duration::from_secs(2), gate.ready())
            .await
            .unwrap()
            .unwrap();
        assert!(!session.is_authenticated());
        assert!(gate.is_ready());
    }
}
