//! Profile synchronizer with per-uid write serialization.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use identity::{Error, Identity, ProfileRecord, Storage};
use log::*;
use tokio::sync::Mutex;

/// What `ensure_profile` found or did.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// No record existed; this one was written.
    Created(ProfileRecord),
    /// A record already existed and was left untouched.
    Existing(ProfileRecord),
}

impl SyncOutcome {
    pub fn record(&self) -> &ProfileRecord {
        match self {
            SyncOutcome::Created(record) | SyncOutcome::Existing(record) => record,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, SyncOutcome::Created(_))
    }
}

/// Reconciles profile records with identities.
///
/// Every read-then-write sequence for a uid runs under that uid's lock, so a background
/// sync and an explicit sign-up write for the same identity can never interleave and
/// `account_created_at` is only ever written once.
#[derive(Clone)]
pub struct Synchronizer {
    storage: Arc<dyn Storage>,
    default_display_name: Arc<str>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Synchronizer {
    pub fn new(storage: Arc<dyn Storage>, default_display_name: impl Into<String>) -> Self {
        Self {
            storage,
            default_display_name: Arc::from(default_display_name.into()),
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Ensure a profile record exists for `identity`.
    ///
    /// Creates the record from the identity when absent, falling back to the default display
    /// name. An existing record is returned as-is. Safe to call on every sign-in.
    pub async fn ensure_profile(&self, identity: &Identity) -> Result<SyncOutcome, Error> {
        let lock = self.lock_for(&identity.uid);
        let outcome = {
            let _guard = lock.lock().await;
            self.ensure_locked(identity).await
        };
        self.release(&identity.uid, lock);
        outcome
    }

    /// Write the record for a freshly signed-up identity with an explicit display name.
    ///
    /// If a record already exists (a background sync got there first) its
    /// `account_created_at` is kept.
    pub async fn record_sign_up(
        &self,
        identity: &Identity,
        display_name: &str,
    ) -> Result<ProfileRecord, Error> {
        let lock = self.lock_for(&identity.uid);
        let record = {
            let _guard = lock.lock().await;
            self.record_sign_up_locked(identity, display_name).await
        };
        self.release(&identity.uid, lock);
        record
    }

    async fn ensure_locked(&self, identity: &Identity) -> Result<SyncOutcome, Error> {
        if let Some(existing) = self.storage.get(&identity.uid).await? {
            debug!("Profile record for {} already exists", identity.uid);
            return Ok(SyncOutcome::Existing(existing));
        }

        let record = ProfileRecord::from_identity(identity, &self.default_display_name, Utc::now());
        self.storage.put(&identity.uid, record.clone()).await?;

        info!("Created profile record for {}", identity.uid);
        Ok(SyncOutcome::Created(record))
    }

    async fn record_sign_up_locked(
        &self,
        identity: &Identity,
        display_name: &str,
    ) -> Result<ProfileRecord, Error> {
        let account_created_at = self
            .storage
            .get(&identity.uid)
            .await?
            .map(|existing| existing.account_created_at)
            .unwrap_or_else(Utc::now);

        let record = ProfileRecord {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            display_name: display_name.to_string(),
            account_created_at,
        };
        self.storage.put(&identity.uid, record.clone()).await?;

        info!("Recorded sign-up profile for {}", identity.uid);
        Ok(record)
    }

    fn lock_for(&self, uid: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(uid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the uid's lock from the map once no other task holds a copy.
    fn release(&self, uid: &str, lock: Arc<Mutex<()>>) {
        self.locks
            .remove_if(uid, |_, held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2);
    }
}
