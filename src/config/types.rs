// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Configuration types for edgecam-supervisor

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SupervisorConfig {
    #[serde(default)]
    pub capture: CaptureSettings,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub offline: OfflineConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Capture parameters handed to the camera collaborator.
///
/// The supervisor keeps a working copy of these for the lifetime of one
/// initialization chain, so a reduction applied by a recovery action is
/// still in effect on the next attempt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CaptureSettings {
    #[serde(default = "default_device")]
    pub device: String,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_framerate")]
    pub framerate: u32,

    /// FIFO the capture process writes H264 into and the publisher reads.
    #[serde(default = "default_pipe_path")]
    pub pipe_path: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device: default_device(),
            width: default_width(),
            height: default_height(),
            framerate: default_framerate(),
            pipe_path: default_pipe_path(),
        }
    }
}

impl CaptureSettings {
    /// Conservative profile substituted by the reconfigure-defaults action.
    pub fn conservative(&self) -> Self {
        Self {
            device: self.device.clone(),
            pipe_path: self.pipe_path.clone(),
            width: 640,
            height: 480,
            framerate: 15,
        }
    }

    /// Halve resolution and frame rate, with a floor, after a buffer fault.
    pub fn degrade(&mut self) {
        self.width = (self.width / 2).max(320);
        self.height = (self.height / 2).max(240);
        self.framerate = (self.framerate / 2).max(5);
    }
}

/// Live publish target
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishConfig {
    #[serde(default = "default_publish_url")]
    pub url: String,

    /// Optional two-line latitude/longitude file; absence is not an error.
    #[serde(default = "default_location_file")]
    pub location_file: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            url: default_publish_url(),
            location_file: default_location_file(),
        }
    }
}

/// Reachability probe target and cadence
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_host")]
    pub host: String,

    #[serde(default = "default_probe_port")]
    pub port: u16,

    #[serde(default = "default_probe_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_live_poll")]
    pub poll_interval_seconds: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: default_probe_host(),
            port: default_probe_port(),
            timeout_seconds: default_probe_timeout(),
            poll_interval_seconds: default_live_poll(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

/// Offline buffer location and staleness window
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OfflineConfig {
    #[serde(default = "default_buffer_path")]
    pub buffer_path: String,

    /// Outages longer than this make the buffer too stale to replay.
    #[serde(default = "default_offline_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_offline_poll")]
    pub poll_interval_seconds: u64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            buffer_path: default_buffer_path(),
            timeout_seconds: default_offline_timeout(),
            poll_interval_seconds: default_offline_poll(),
        }
    }
}

impl OfflineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

/// Retry budget and recovery pacing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecoveryConfig {
    /// Initialization attempts before escalating to fatal shutdown.
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// Pause between stopping and restarting pipeline components.
    #[serde(default = "default_restart_delay")]
    pub restart_delay_seconds: u64,

    /// Pause between supervisory loop iterations.
    #[serde(default = "default_iteration_delay")]
    pub iteration_delay_seconds: u64,

    /// Backoff after a memory reclamation pass.
    #[serde(default = "default_memory_backoff")]
    pub memory_backoff_seconds: u64,

    /// Disk headroom required before a disk-full restart proceeds.
    #[serde(default = "default_min_free_disk")]
    pub min_free_disk_mb: u64,

    #[serde(default = "default_disk_poll")]
    pub disk_poll_seconds: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_tries: default_max_tries(),
            restart_delay_seconds: default_restart_delay(),
            iteration_delay_seconds: default_iteration_delay(),
            memory_backoff_seconds: default_memory_backoff(),
            min_free_disk_mb: default_min_free_disk(),
            disk_poll_seconds: default_disk_poll(),
        }
    }
}

impl RecoveryConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_seconds)
    }

    pub fn iteration_delay(&self) -> Duration {
        Duration::from_secs(self.iteration_delay_seconds)
    }

    pub fn memory_backoff(&self) -> Duration {
        Duration::from_secs(self.memory_backoff_seconds)
    }

    pub fn disk_poll(&self) -> Duration {
        Duration::from_secs(self.disk_poll_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String, // "text", "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_device() -> String { "/dev/video0".to_string() }
fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_framerate() -> u32 { 30 }
fn default_pipe_path() -> String { "/tmp/video_pipe".to_string() }
fn default_publish_url() -> String { "rtsp://127.0.0.1:8554/stream".to_string() }
fn default_location_file() -> String { "/boot/location.txt".to_string() }
fn default_probe_host() -> String { "8.8.8.8".to_string() }
fn default_probe_port() -> u16 { 53 }
fn default_probe_timeout() -> u64 { 3 }
fn default_live_poll() -> u64 { 1 }
fn default_buffer_path() -> String { "/var/spool/edgecam/offline_buffer.h264".to_string() }
fn default_offline_timeout() -> u64 { 400 }
fn default_offline_poll() -> u64 { 1 }
fn default_max_tries() -> u32 { 3 }
fn default_restart_delay() -> u64 { 2 }
fn default_iteration_delay() -> u64 { 2 }
fn default_memory_backoff() -> u64 { 2 }
fn default_min_free_disk() -> u64 { 256 }
fn default_disk_poll() -> u64 { 2 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
