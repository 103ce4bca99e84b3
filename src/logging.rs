//! Logging Module
//!
//! Daily log files under the data dir. Development runs also echo to the
//! console at debug level.

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, Environment};

const LOG_FILE_PREFIX: &str = "mapic-client.log";

// HTTP internals stay quiet unless RUST_LOG asks for them.
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn";

/// Install the global subscriber for this client
pub fn init(config: &Config) {
    let log_dir = config.log_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Cannot create log directory {}: {}", log_dir.display(), e);
    }

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(RollingFileAppender::new(
            Rotation::DAILY,
            &log_dir,
            LOG_FILE_PREFIX,
        ));

    let console_layer = (config.environment == Environment::Development)
        .then(|| fmt::layer().with_target(true).pretty());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config.environment)));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer);

    // A second init (tests, embedding hosts) keeps the first subscriber.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn default_directives(environment: Environment) -> String {
    let level = match environment {
        Environment::Development => "debug",
        Environment::Production => "info",
    };
    format!("{},{}", level, QUIET_DEPENDENCIES)
}
