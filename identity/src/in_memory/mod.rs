//! In-memory identity provider and profile store.
//!
//! Both keep all state in process memory. They back the demo binary and the test suites,
//! and expose switches for simulating outages and scripted user behaviour.

mod provider;
mod storage;

pub use provider::{InteractiveOutcome, Provider};
pub use storage::Storage;
