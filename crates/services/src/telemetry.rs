use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::error::TelemetryError;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` (e.g. `"info"` or
/// `"services=debug,storage=debug"`) is used. Fails if a global subscriber is
/// already installed, which callers may ignore.
///
/// # Errors
///
/// Returns `TelemetryError` if the directive does not parse or a subscriber
/// is already set.
pub fn init_tracing(default_directive: &str) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| TelemetryError(e.to_string()))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| TelemetryError(e.to_string()))?;

    debug!("tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_reported_not_fatal() {
        // the first call may race other tests; only the second must fail
        let _ = init_tracing("info");
        assert!(init_tracing("info").is_err());
    }
}
