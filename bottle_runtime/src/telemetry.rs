//! Tracing setup for the `bottle` binary.

use tracing_subscriber::EnvFilter;

use crate::error::{Result, RuntimeError};

/// Install a stderr fmt subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init(default_filter: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| RuntimeError::Config(format!("invalid log filter {default_filter:?}: {e}")))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .try_init()
        .map_err(|e| RuntimeError::Config(format!("tracing already initialised: {e}")))
}
