use identity::error::{session_error, Error, SessionErrorKind};
use tokio::sync::watch;

use crate::snapshot::Session;

/// Withholds dependent output until the session has resolved at least once.
///
/// Readiness is derived solely from `Session::resolved`; the gate never mutates the session.
#[derive(Clone)]
pub struct Gate {
    receiver: watch::Receiver<Session>,
}

impl Gate {
    pub fn new(receiver: watch::Receiver<Session>) -> Self {
        Self { receiver }
    }

    pub fn is_ready(&self) -> bool {
        self.receiver.borrow().resolved
    }

    /// Wait for the first resolution and return the snapshot that satisfied it.
    ///
    /// Fails with `NoActiveSession` if the session is torn down before resolving.
    pub async fn ready(&mut self) -> Result<Session, Error> {
        self.receiver
            .wait_for(|session| session.resolved)
            .await
            .map(|session| session.clone())
            .map_err(|_| {
                session_error(
                    SessionErrorKind::NoActiveSession,
                    "Session closed before it resolved",
                )
            })
    }

    /// Produce dependent output from the current snapshot, or `None` while unresolved.
    pub fn render<T>(&self, view: impl FnOnce(&Session) -> T) -> Option<T> {
        let session = self.receiver.borrow();
        if session.resolved {
            Some(view(&session))
        } else {
            None
        }
    }
}
