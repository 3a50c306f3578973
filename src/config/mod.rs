// Configuration module for edgecam-supervisor
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Default values

pub mod types;
mod loader;

pub use types::*;
pub use loader::ConfigLoader;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SupervisorConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<SupervisorConfig> {
    let mut config = load_config(path)?;

    // Allow environment variables to override config values
    if let Ok(device) = std::env::var("CAMERA_DEVICE") {
        config.capture.device = device;
    }

    if let Ok(url) = std::env::var("PUBLISH_URL") {
        config.publish.url = url;
    }

    if let Ok(buffer_path) = std::env::var("OFFLINE_BUFFER_PATH") {
        config.offline.buffer_path = buffer_path;
    }

    if let Ok(timeout) = std::env::var("OFFLINE_TIMEOUT_SECONDS") {
        if let Ok(seconds) = timeout.parse() {
            config.offline.timeout_seconds = seconds;
        }
    }

    Ok(config)
}
