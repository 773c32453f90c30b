//! Profile records and the document store that holds them.

mod record;
mod storage;

pub use record::ProfileRecord;
pub use storage::Storage;
