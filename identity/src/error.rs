//! Error types shared by the `identity` and `session` crates.
//!
//! Follows the same pattern as the rest of the workspace: a root Error struct holding an
//! error kind tree plus an optional source for error chaining.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Auth(AuthErrorKind),
    Profile(ProfileErrorKind),
    Session(SessionErrorKind),
}

/// Errors reported by the identity provider. These are user-actionable and are always
/// surfaced to the caller of the operation that triggered them.
#[derive(Debug, PartialEq)]
pub enum AuthErrorKind {
    InvalidCredentials,
    AccountAlreadyExists,
    PopupClosedByUser,
    Network,
}

/// Errors from profile store reads and writes.
#[derive(Debug, PartialEq)]
pub enum ProfileErrorKind {
    StoreUnavailable,
    Network,
    /// The stored document could not be decoded into a profile record.
    Malformed,
}

/// Errors from using the session outside of its active lifetime.
#[derive(Debug, PartialEq)]
pub enum SessionErrorKind {
    NoActiveSession,
}

impl Error {
    /// Returns true for programming errors that cannot be recovered from at runtime.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.error_kind,
            ErrorKind::Session(SessionErrorKind::NoActiveSession)
        )
    }

    /// Returns true if the failure came from an unreachable provider or store.
    pub fn is_network(&self) -> bool {
        matches!(
            self.error_kind,
            ErrorKind::Auth(AuthErrorKind::Network)
                | ErrorKind::Profile(ProfileErrorKind::Network)
                | ErrorKind::Profile(ProfileErrorKind::StoreUnavailable)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Auth(kind) => write!(f, "Auth error: {:?}", kind)?,
            ErrorKind::Profile(kind) => write!(f, "Profile error: {:?}", kind)?,
            ErrorKind::Session(kind) => write!(f, "Session error: {:?}", kind)?,
        }
        if let Some(source) = &self.source {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Profile(ProfileErrorKind::Malformed),
        }
    }
}

/// Helper function to create identity provider errors.
pub fn auth_error(kind: AuthErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Auth(kind),
    }
}

/// Helper function to create profile store errors.
pub fn profile_error(kind: ProfileErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Profile(kind),
    }
}

/// Helper function to create session lifetime errors.
pub fn session_error(kind: SessionErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Session(kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_active_session_is_fatal() {
        let err = session_error(SessionErrorKind::NoActiveSession, "not initialized");
        assert!(err.is_fatal());
        assert!(!err.is_network());
    }

    #[test]
    fn test_store_unavailable_is_not_fatal() {
        let err = profile_error(ProfileErrorKind::StoreUnavailable, "offline");
        assert!(!err.is_fatal());
        assert!(err.is_network());
    }

    #[test]
    fn test_display_includes_kind_and_message() {
        let err = auth_error(AuthErrorKind::InvalidCredentials, "wrong password");
        let rendered = err.to_string();
        assert!(rendered.contains("InvalidCredentials"));
        assert!(rendered.contains("wrong password"));
    }

    #[test]
    fn test_serde_json_error_maps_to_malformed() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(
            err.error_kind,
            ErrorKind::Profile(ProfileErrorKind::Malformed)
        );
        assert!(StdError::source(&err).is_some());
    }
}
