// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SupervisorConfig> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        // Substitute environment variables
        let content = Self::substitute_env_vars(&content);

        // Parse YAML
        let config: SupervisorConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

        // Validate configuration
        Self::validate(&config)?;

        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${CAMERA_DEVICE:-/dev/video0} -> /dev/video0 (if CAMERA_DEVICE not set)
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if let Some(default) = default_value {
                        default.to_string()
                    } else {
                        // Keep original if no default and var not found
                        format!("${{{}}}", var_name)
                    }
                }
            }
        })
        .to_string()
    }

    /// Validate configuration
    fn validate(config: &SupervisorConfig) -> Result<()> {
        if config.capture.device.is_empty() {
            bail!("capture.device cannot be empty");
        }

        if config.capture.width == 0 || config.capture.height == 0 {
            bail!("capture resolution must be > 0");
        }

        if config.capture.framerate == 0 {
            bail!("capture.framerate must be > 0");
        }

        if config.publish.url.is_empty() {
            bail!("publish.url cannot be empty");
        }

        if config.probe.host.is_empty() {
            bail!("probe.host cannot be empty");
        }

        if config.probe.timeout_seconds == 0 {
            bail!("probe.timeout_seconds must be > 0");
        }

        if config.probe.poll_interval_seconds == 0 {
            bail!("probe.poll_interval_seconds must be > 0");
        }

        if config.offline.buffer_path.is_empty() {
            bail!("offline.buffer_path cannot be empty");
        }

        if config.offline.timeout_seconds == 0 {
            bail!("offline.timeout_seconds must be > 0");
        }

        if config.offline.poll_interval_seconds == 0 {
            bail!("offline.poll_interval_seconds must be > 0");
        }

        if config.recovery.disk_poll_seconds == 0 {
            bail!("recovery.disk_poll_seconds must be > 0");
        }

        Ok(())
    }
}
