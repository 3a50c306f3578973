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

// Recovery action library: the named remediation procedures the
// classifier can indicate

use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::CaptureSettings;
use crate::fault::Fault;
use crate::session::CaptureSession;
use crate::system;

/// SIGTERM every process holding the device node, except ourselves.
///
/// A permission failure on one holder is logged and does not abort the
/// rest; no holders at all is a no-op.
pub async fn kill_conflicting_holders(device: &str) {
    let holders = system::device_holders(Path::new(device));
    if holders.is_empty() {
        debug!("No conflicting holders of {}", device);
        return;
    }

    for pid in holders {
        match system::terminate(pid) {
            Ok(()) => info!("Terminated pid {} holding {}", pid, device),
            Err(e) => warn!("Cannot terminate pid {} holding {}: {}", pid, device, e),
        }
    }
}

/// Force a reclamation pass: log utilization, drop OS page caches
/// (best-effort), then back off to let the kernel catch up.
pub async fn free_memory(backoff: Duration) {
    match system::MemoryInfo::read() {
        Some(info) => info!(
            "Memory before reclamation: {:.1}% used ({} kB available)",
            info.used_percent(),
            info.available_kb
        ),
        None => debug!("Memory utilization unavailable"),
    }

    if let Err(e) = system::drop_page_caches() {
        warn!("Cannot drop page caches: {}", e);
    }

    if let Some(info) = system::MemoryInfo::read() {
        info!(
            "Memory after reclamation: {:.1}% used ({} kB available)",
            info.used_percent(),
            info.available_kb
        );
    }

    sleep(backoff).await;
}

/// Poll until the recording volume has at least `min_free_mb` of
/// headroom. Unbounded: if the disk never frees up this never returns,
/// and each poll logs the shortfall so the stall is visible.
pub async fn wait_for_disk_space(path: &Path, min_free_mb: u64, poll: Duration) {
    loop {
        match system::free_disk_mb(path) {
            Some(free) if free >= min_free_mb => {
                info!("Disk headroom restored: {} MB free", free);
                return;
            }
            Some(free) => {
                warn!(
                    "Waiting for disk headroom on {}: {} MB free, need {} MB",
                    path.display(),
                    free,
                    min_free_mb
                );
            }
            None => {
                // An unqueryable volume should not wedge recovery forever.
                warn!(
                    "Cannot determine free space on {}; proceeding",
                    path.display()
                );
                return;
            }
        }
        sleep(poll).await;
    }
}

/// Discard the current capture parameters for the conservative profile.
pub fn reconfigure_defaults(settings: &mut CaptureSettings) {
    let fallback = settings.conservative();
    info!(
        "Reconfiguring to defaults: {}x{}@{}",
        fallback.width, fallback.height, fallback.framerate
    );
    *settings = fallback;
}

/// Restart capture and recording against the existing sink.
///
/// Every stop is issued before any start, each independently best-effort.
pub async fn restart_pipeline(session: &mut CaptureSession, delay: Duration) -> Result<(), Fault> {
    info!("Restarting capture pipeline");

    if let Err(e) = session.device.stop_recording().await {
        warn!("Stop recording during pipeline restart failed: {}", e);
    }
    if let Err(e) = session.device.stop().await {
        warn!("Stop capture during pipeline restart failed: {}", e);
    }

    sleep(delay).await;

    session.device.start().await?;
    let output = session.sink.input_path().to_path_buf();
    session.device.start_recording(&output).await?;
    info!("Capture pipeline restarted");
    Ok(())
}

/// Restart the whole chain with the sink brought up first: the sink, not
/// the capture device, was the failing component, so it must be accepting
/// input before capture resumes.
pub async fn restart_sink(session: &mut CaptureSession, delay: Duration) -> Result<(), Fault> {
    info!("Restarting publish sink");

    if let Err(e) = session.device.stop_recording().await {
        warn!("Stop recording during sink restart failed: {}", e);
    }
    if let Err(e) = session.device.stop().await {
        warn!("Stop capture during sink restart failed: {}", e);
    }
    if let Err(e) = session.sink.stop().await {
        warn!("Stop sink during sink restart failed: {}", e);
    }

    sleep(delay).await;

    session.sink.start().await?;
    let output = session.sink.input_path().to_path_buf();
    session.device.start_recording(&output).await?;
    session.device.start().await?;
    info!("Publish sink restarted");
    Ok(())
}
