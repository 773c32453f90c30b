//! # identity
//!
//! Foundation crate for everything the session layer consumes from the outside world:
//! - The identity provider capability set (password, sign-up, interactive sign-in, change stream)
//! - The profile store capability set (one document per identity, keyed by `uid`)
//! - The shared error tree used by every crate in the workspace
//! - In-memory implementations of both collaborators
//!
//! ## Architecture
//!
//! This crate has no dependencies on other workspace crates. The `session` crate builds the
//! Session Manager and Profile Synchronizer on top of the traits defined here, and any real
//! backend (a hosted auth service, a document database) plugs in by implementing them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use identity::{
//!     profile::{ProfileRecord, Storage},
//!     provider::{Identity, Provider, ProviderKind},
//!     in_memory,
//! };
//! ```

pub mod error;
pub mod in_memory;
pub mod profile;
pub mod provider;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
pub use profile::{ProfileRecord, Storage};
pub use provider::{Identity, IdentityChange, Provider, ProviderKind, Subscription, SubscriptionId};
