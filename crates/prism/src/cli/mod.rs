//! Command implementations for the `prism` binary.

pub mod config;
pub mod process;
pub mod serve;
pub mod stats;

use prism_core::Config;
use std::path::Path;

/// Load the config from an explicit path, or from the default location.
///
/// An explicit path must load cleanly. A broken default config falls back to
/// built-in defaults with a warning, so `prism config init` stays reachable.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display())),
        None => Ok(Config::load().unwrap_or_else(|e| {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `prism config path`."
            );
            Config::default()
        })),
    }
}
