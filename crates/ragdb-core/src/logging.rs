use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;
use crate::error::{Error, Result};

/// Install the global fmt subscriber. `RUST_LOG` overrides the configured
/// filter. Returns `false` if a subscriber was already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.filter)
            .map_err(|e| Error::InvalidConfig(format!("logging.filter: {e}")))?,
    };
    Ok(tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok())
}
