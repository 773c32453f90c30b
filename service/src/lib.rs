//! Infrastructure shared by every binary in the workspace: configuration and logging.

pub mod config;
pub mod logging;
