use std::time::Duration;

use service::config::{Config, DEFAULT_DISPLAY_NAME};

/// Values the session layer reads from configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Display name for new profile records whose identity has none.
    pub default_display_name: String,
    /// Upper bound on how long shutdown waits for in-flight profile syncs.
    pub shutdown_grace: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_display_name: DEFAULT_DISPLAY_NAME.to_string(),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            default_display_name: config.default_display_name().to_string(),
            shutdown_grace: config.shutdown_grace(),
        }
    }
}
