use crate::config::Config;
use log::LevelFilter;
use simplelog::{self, ConfigBuilder};

/// Runtime internals that are only worth seeing at Trace level.
const FILTERED_MODULES: &[&str] = &["tokio", "mio", "dashmap"];

pub struct Logger {}

impl Logger {
    /// Initializes the global terminal logger from the provided Config.
    ///
    /// Runtime internals are hidden unless the level is Trace.
    pub fn init_logger(config: &Config) {
        let apply_filters = Self::should_filter_dependencies(config.log_level_filter);
        let log_config = Self::build_log_config(apply_filters);

        simplelog::TermLogger::init(
            config.log_level_filter,
            log_config,
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )
        .expect("Failed to start simplelog");
    }

    fn should_filter_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }

    fn build_log_config(apply_filters: bool) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();

        if apply_filters {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}
