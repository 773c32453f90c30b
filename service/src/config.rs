use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::time::Duration;

/// Display name given to profiles whose identity carries none.
pub const DEFAULT_DISPLAY_NAME: &str = "Traveler";

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Display name written to new profile records when the identity provider has none.
    #[arg(long, env, default_value = DEFAULT_DISPLAY_NAME)]
    default_display_name: String,

    /// Seconds to wait for in-flight profile syncs when the session shuts down.
    #[arg(long, env, default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn default_display_name(&self) -> &str {
        &self.default_display_name
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
