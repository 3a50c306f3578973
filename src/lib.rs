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

// Self-healing capture-and-publish supervisor for edge camera devices
//
// This keeps a video pipeline alive on a device nobody can reach:
// - Publishes live over RTSP while the network is reachable
// - Buffers to a local file across outages, then replays or discards
// - Classifies device/resource/runtime faults into named recovery actions
// - Bounds initialization retries and escalates to fatal shutdown

pub mod classify;
pub mod config;
pub mod connectivity;
pub mod fault;
pub mod location;
pub mod offline;
pub mod pipeline;
pub mod recovery;
pub mod session;
pub mod supervisor;
pub mod system;

// Re-export main types
pub use classify::{classify, Classification, RecoveryAction};
pub use config::{load_config, load_config_with_env, CaptureSettings, SupervisorConfig};
pub use connectivity::{ConnectivityMonitor, Probe};
pub use fault::{ConnectionKind, DeviceCode, Fault, ResourceCode};
pub use location::{publish_url, read_location};
pub use offline::{OfflineBufferManager, OfflineOutcome};
pub use pipeline::{FfmpegFactory, PipelineFactory};
pub use session::{CaptureDevice, CaptureSession, MediaSink};
pub use supervisor::{Supervisor, SupervisorError};
