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

// Capture session: one configured device plus one attached sink, owned
// exclusively by the supervisor for the duration of a mode

use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

use crate::config::CaptureSettings;
use crate::fault::Fault;

/// Camera/video-device collaborator.
///
/// Implementations surface OS errors through [`Fault::from_io`] and
/// subprocess output as `Fault::Runtime` so the classifier sees structured
/// faults wherever possible.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn configure(&mut self, settings: &CaptureSettings) -> Result<(), Fault>;
    async fn start(&mut self) -> Result<(), Fault>;
    async fn stop(&mut self) -> Result<(), Fault>;
    /// Begin encoding into `output` (a FIFO for live publish, a plain file
    /// for offline buffering).
    async fn start_recording(&mut self, output: &Path) -> Result<(), Fault>;
    async fn stop_recording(&mut self) -> Result<(), Fault>;
    /// Non-blocking check for a fault raised since the last call.
    fn poll_fault(&mut self) -> Option<Fault>;
}

/// Publish/record sink collaborator: the live RTSP publisher or the
/// offline buffer file.
#[async_trait]
pub trait MediaSink: Send + Sync {
    async fn start(&mut self) -> Result<(), Fault>;
    async fn stop(&mut self) -> Result<(), Fault>;
    /// Path the capture device should write encoded video into.
    fn input_path(&self) -> &Path;
    /// Non-blocking check for a fault raised since the last call.
    fn poll_fault(&mut self) -> Option<Fault>;
    fn describe(&self) -> String;
}

/// At most one of these is open at any time; the supervisor stops it
/// fully before any mode transition.
pub struct CaptureSession {
    pub(crate) device: Box<dyn CaptureDevice>,
    pub(crate) sink: Box<dyn MediaSink>,
}

impl CaptureSession {
    pub fn new(device: Box<dyn CaptureDevice>, sink: Box<dyn MediaSink>) -> Self {
        Self { device, sink }
    }

    /// Bring the full pipeline up: configure, sink, capture, recording.
    /// The first fault aborts initialization; the caller owns retry policy.
    pub async fn initialize(&mut self, settings: &CaptureSettings) -> Result<(), Fault> {
        self.device.configure(settings).await?;
        self.sink.start().await?;
        self.device.start().await?;

        let output = self.sink.input_path().to_path_buf();
        self.device.start_recording(&output).await?;

        info!(
            "Capture session up: {}x{}@{} -> {}",
            settings.width,
            settings.height,
            settings.framerate,
            self.sink.describe()
        );
        Ok(())
    }

    /// First fault reported by either collaborator since the last poll.
    pub fn poll_fault(&mut self) -> Option<Fault> {
        self.device.poll_fault().or_else(|| self.sink.poll_fault())
    }

    /// Issue every stop, each independently best-effort. A failed stop is
    /// logged and never blocks the remaining stops.
    pub async fn stop_all(&mut self) {
        if let Err(e) = self.device.stop_recording().await {
            warn!("Best-effort stop of recording failed: {}", e);
        }
        if let Err(e) = self.device.stop().await {
            warn!("Best-effort stop of capture failed: {}", e);
        }
        if let Err(e) = self.sink.stop().await {
            warn!("Best-effort stop of sink failed: {}", e);
        }
    }
}
