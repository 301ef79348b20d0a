use crate::{config::ObserverConfig, errors::ConfigError};
use std::str::FromStr;
use tracing::Level;

/// Installs a global `fmt` subscriber at the configured level.
///
/// Output goes to stderr because stdout may carry protocol messages. Does nothing if a global
/// subscriber is already set.
pub fn init_logging(config: &ObserverConfig) -> Result<(), ConfigError> {
    let level = parse_level(&config.log_level)?;
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();
    if !installed {
        tracing::debug!("A tracing subscriber is already installed.");
    }
    Ok(())
}

fn parse_level(level: &str) -> Result<Level, ConfigError> {
    Level::from_str(level).map_err(|_| ConfigError::InvalidLogLevel {
        level: level.to_string(),
    })
}
