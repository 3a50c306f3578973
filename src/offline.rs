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

// Offline buffer lifecycle: record locally while the target is
// unreachable, then replay or discard

use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::OfflineConfig;
use crate::connectivity::Probe;
use crate::pipeline::{metadata_path, PipelineFactory};
use crate::session::CaptureSession;

/// How an offline episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineOutcome {
    /// Reconnected inside the staleness window; buffer was replayed.
    Replayed,
    /// Reconnected, but the outage outlasted the window; buffer dropped.
    DiscardedStale,
    /// Never reconnected; buffer dropped at the timeout.
    DiscardedTimeout,
    /// Cooperative stop arrived mid-episode.
    Interrupted,
}

/// Runs one OFFLINE episode over a session that is already recording
/// into the buffer file.
///
/// Whatever the outcome, the buffer file and its sidecar are gone when
/// `run` returns.
pub struct OfflineBufferManager<'a> {
    probe: &'a dyn Probe,
    factory: &'a dyn PipelineFactory,
    config: &'a OfflineConfig,
    publish_url: &'a str,
}

impl<'a> OfflineBufferManager<'a> {
    pub fn new(
        probe: &'a dyn Probe,
        factory: &'a dyn PipelineFactory,
        config: &'a OfflineConfig,
        publish_url: &'a str,
    ) -> Self {
        Self {
            probe,
            factory,
            config,
            publish_url,
        }
    }

    pub async fn run(
        &self,
        mut session: CaptureSession,
        stop: &watch::Receiver<bool>,
    ) -> OfflineOutcome {
        let path = PathBuf::from(&self.config.buffer_path);
        let timeout = self.config.timeout();
        let started = Instant::now();

        info!(
            "Buffering offline to {} (staleness window {:?})",
            path.display(),
            timeout
        );

        let outcome = loop {
            if *stop.borrow() {
                session.stop_all().await;
                break OfflineOutcome::Interrupted;
            }

            if self.probe.is_reachable().await {
                session.stop_all().await;
                let elapsed = started.elapsed();
                if elapsed < timeout {
                    info!("Reconnected after {:?}; replaying buffer", elapsed);
                    if let Err(e) = self.factory.replay(&path, self.publish_url).await {
                        // Never resurrects the file and never retries.
                        warn!("Replay failed: {}", e);
                    }
                    break OfflineOutcome::Replayed;
                }
                info!(
                    "Reconnected after {:?}, past the {:?} window; discarding buffer",
                    elapsed, timeout
                );
                break OfflineOutcome::DiscardedStale;
            }

            if started.elapsed() >= timeout {
                info!("Outage reached {:?} without reconnection; discarding buffer", timeout);
                session.stop_all().await;
                break OfflineOutcome::DiscardedTimeout;
            }

            sleep(self.config.poll_interval()).await;
        };

        remove_quietly(&path);
        remove_quietly(&metadata_path(&path));
        outcome
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Cannot remove {}: {}", path.display(), e),
    }
}
