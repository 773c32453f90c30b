//! Profile record type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::provider::Identity;

/// Durable, store-side record mirroring select identity attributes plus account metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    /// Written once, when the record is first created.
    pub account_created_at: DateTime<Utc>,
}

impl ProfileRecord {
    /// Build a fresh record for an identity, using `fallback_name` when the identity has no
    /// display name.
    pub fn from_identity(identity: &Identity, fallback_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            display_name: identity
                .display_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| fallback_name.to_string()),
            account_created_at: now,
        }
    }

    /// Encode as a store document.
    pub fn to_document(&self) -> Result<Value, Error> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode from a store document.
    pub fn from_document(document: Value) -> Result<Self, Error> {
        Ok(serde_json::from_value(document)?)
    }
}
