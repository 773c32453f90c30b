//! Identity & session lifecycle management.
//!
//! This crate owns the authoritative answer to "who is signed in, and do we know yet",
//! and keeps a profile record in step with every identity that signs in.
//!
//! # Architecture
//!
//! - **Manager**: subscribes to the identity provider's change stream, processes changes in
//!   emission order, publishes session snapshots and exposes the session-mutating operations.
//! - **Synchronizer**: idempotently ensures a profile record exists for an identity. Runs
//!   fire-and-forget on every observed sign-in; failures there are logged, never surfaced.
//! - **SessionHandle**: cloneable, reactive view of the session plus the operations. Fails with
//!   `NoActiveSession` outside the manager's active lifetime.
//! - **Gate**: withholds dependent output until the first identity change has been resolved.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --initialize()--> Resolving --first change--> Authenticated <--> Anonymous
//!        \______________________________ shutdown() ______________________________> Closed
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = session::Manager::new(provider, storage, Settings::from(&config));
//! manager.initialize()?;
//! let mut gate = manager.gate()?;
//! let session = gate.ready().await?;
//! ```

mod gate;
mod handle;
mod ledger;
mod manager;
mod settings;
mod snapshot;
mod synchronizer;

pub use gate::Gate;
pub use handle::SessionHandle;
pub use manager::Manager;
pub use settings::Settings;
pub use snapshot::{Phase, Session};
pub use synchronizer::{SyncOutcome, Synchronizer};

pub use identity::{Error, ErrorKind};
