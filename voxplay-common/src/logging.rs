//! Tracing subscriber setup shared by voxplay binaries

use crate::{Error, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter directive used when `RUST_LOG` is unset.
///
/// `level` applies to the voxplay crates only; dependencies stay at `warn`.
pub fn default_directive(level: &str) -> String {
    format!("warn,voxplay_ap={level},voxplay_common={level}")
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(level)))
        .map_err(|e| Error::Logging(format!("Invalid log level '{}': {}", level, e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_scopes_level_to_voxplay() {
        let directive = default_directive("debug");
        assert_eq!(directive, "warn,voxplay_ap=debug,voxplay_common=debug");
        assert!(EnvFilter::try_new(directive).is_ok());
    }
}
