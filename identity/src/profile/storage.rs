//! Profile storage trait for persisting profile records.

use async_trait::async_trait;

use super::ProfileRecord;
use crate::error::Error;

/// Trait for reading and writing profile records.
///
/// One record per identity, keyed by `uid`. Implementations should:
/// - Map transport failures to `ProfileErrorKind::StoreUnavailable`
/// - Replace the whole record on `put` (no field-level merge)
#[async_trait]
pub trait Storage: Send + Sync {
    /// Retrieve the profile record for a uid.
    ///
    /// # Returns
    ///
    /// `Some(ProfileRecord)` if found, `None` if not found.
    async fn get(&self, uid: &str) -> Result<Option<ProfileRecord>, Error>;

    /// Store the profile record for a uid.
    async fn put(&self, uid: &str, record: ProfileRecord) -> Result<(), Error>;
}
