use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ConfigResult, LoggingConfig};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `config.filter`. Returns `Ok(false)` when
/// a global subscriber was already installed (by the host application or an
/// earlier call).
pub fn init_tracing(config: &LoggingConfig) -> ConfigResult<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| ConfigError::Logging(format!("{}: {}", config.filter, e)))?,
    };

    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok())
}
