//! In-memory profile document store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::{profile_error, Error, ProfileErrorKind};
use crate::profile::ProfileRecord;

/// Profile store holding one JSON document per uid.
pub struct Storage {
    documents: DashMap<String, Value>,
    available: AtomicBool,
    writes: AtomicUsize,
}

impl Storage {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            available: AtomicBool::new(true),
            writes: AtomicUsize::new(0),
        }
    }

    /// Simulate the store becoming unreachable. While unavailable every read and write fails
    /// with `StoreUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Raw document for a uid, bypassing availability.
    pub fn document(&self, uid: &str) -> Option<Value> {
        self.documents.get(uid).map(|doc| doc.value().clone())
    }

    /// Place a raw document, bypassing availability and decoding.
    pub fn insert_document(&self, uid: &str, document: Value) {
        self.documents.insert(uid.to_string(), document);
    }

    /// Number of successful `put` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn ensure_available(&self) -> Result<(), Error> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(profile_error(
                ProfileErrorKind::StoreUnavailable,
                "Profile store is unreachable",
            ))
        }
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl crate::profile::Storage for Storage {
    async fn get(&self, uid: &str) -> Result<Option<ProfileRecord>, Error> {
        self.ensure_available()?;
        self.document(uid)
            .map(ProfileRecord::from_document)
            .transpose()
    }

    async fn put(&self, uid: &str, record: ProfileRecord) -> Result<(), Error> {
        self.ensure_available()?;
        let document = record.to_document()?;
        self.documents.insert(uid.to_string(), document);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
