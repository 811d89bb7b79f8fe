//! Subscriber setup for the daemon. The library itself only emits events.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` when set, otherwise `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global fmt subscriber.
pub fn init(default: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default))
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_default_filter() {
        std::env::remove_var("RUST_LOG");
        assert_eq!(env_filter("pxeward=debug").to_string(), "pxeward=debug");
    }

    #[test]
    #[serial]
    fn test_rust_log_wins() {
        std::env::set_var("RUST_LOG", "pxeward=trace");
        let filter = env_filter("pxeward=info");
        std::env::remove_var("RUST_LOG");
        assert_eq!(filter.to_string(), "pxeward=trace");
    }
}
