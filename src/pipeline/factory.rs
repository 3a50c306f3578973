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

// Factory for pipeline collaborators, the seam the supervisor builds
// sessions through

use async_trait::async_trait;
use std::path::Path;

use super::camera::V4l2Capture;
use super::sink::{replay_buffer, BufferFileSink, RtspPublisher};
use crate::config::CaptureSettings;
use crate::fault::Fault;
use crate::session::{CaptureDevice, MediaSink};

/// Builds capture devices and sinks for each mode entry, and performs
/// buffer replay. Tests substitute scripted implementations.
#[async_trait]
pub trait PipelineFactory: Send + Sync {
    fn device(&self) -> Box<dyn CaptureDevice>;

    /// Sink for LIVE mode, publishing to `publish_url` via `pipe_path`.
    fn live_sink(&self, publish_url: &str, pipe_path: &Path) -> Box<dyn MediaSink>;

    /// Sink for OFFLINE mode, recording into `buffer_path`.
    fn file_sink(&self, buffer_path: &Path, settings: &CaptureSettings) -> Box<dyn MediaSink>;

    /// Stream a finished buffer to the publish target; blocks until done.
    async fn replay(&self, buffer_path: &Path, publish_url: &str) -> Result<(), Fault>;
}

/// Production factory: every collaborator is an ffmpeg subprocess.
pub struct FfmpegFactory;

#[async_trait]
impl PipelineFactory for FfmpegFactory {
    fn device(&self) -> Box<dyn CaptureDevice> {
        Box::new(V4l2Capture::new())
    }

    fn live_sink(&self, publish_url: &str, pipe_path: &Path) -> Box<dyn MediaSink> {
        Box::new(RtspPublisher::new(publish_url, pipe_path))
    }

    fn file_sink(&self, buffer_path: &Path, settings: &CaptureSettings) -> Box<dyn MediaSink> {
        Box::new(BufferFileSink::new(buffer_path, settings.clone()))
    }

    async fn replay(&self, buffer_path: &Path, publish_url: &str) -> Result<(), Fault> {
        replay_buffer(buffer_path, publish_url).await
    }
}
