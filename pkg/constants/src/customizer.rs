//! Customizer CLI constants.

/// Default config file path for the `podguard` CLI.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/podguard/config.yaml";

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info";
