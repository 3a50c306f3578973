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

// Scripted collaborator fakes shared by the integration tests
#![allow(dead_code)] // not every test binary exercises every helper

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use edgecam_supervisor::config::CaptureSettings;
use edgecam_supervisor::connectivity::Probe;
use edgecam_supervisor::fault::Fault;
use edgecam_supervisor::pipeline::PipelineFactory;
use edgecam_supervisor::session::{CaptureDevice, MediaSink};

/// Ordered record of every collaborator call.
#[derive(Default)]
pub struct CallLog {
    events: Mutex<Vec<String>>,
}

impl CallLog {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == event)
            .count()
    }
}

/// Reachability script: consumes one entry per probe, then repeats the
/// final value.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
}

impl ScriptedProbe {
    pub fn new(script: Vec<bool>, fallback: bool) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
        }
    }

    pub fn always(value: bool) -> Self {
        Self::new(Vec::new(), value)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn is_reachable(&self) -> bool {
        self.script.lock().unwrap().pop_front().unwrap_or(self.fallback)
    }
}

#[derive(Default)]
pub struct FactoryScript {
    /// Results popped by successive `configure` calls; empty means Ok.
    pub configure_results: Mutex<VecDeque<Result<(), Fault>>>,
    /// Faults surfaced by successive device polls; empty means healthy.
    pub device_polls: Mutex<VecDeque<Fault>>,
    /// Faults surfaced by successive sink polls; empty means healthy.
    pub sink_polls: Mutex<VecDeque<Fault>>,
    /// Results popped by successive replay calls; empty means Ok.
    pub replay_results: Mutex<VecDeque<Result<(), Fault>>>,
    /// Settings seen by each `configure` call, in order.
    pub configured_with: Mutex<Vec<CaptureSettings>>,
    /// Every stop call fails when set; starts still succeed.
    pub fail_stops: bool,
}

/// Factory handing out scripted devices and sinks that share one script
/// and one call log.
pub struct ScriptedFactory {
    pub log: Arc<CallLog>,
    pub script: Arc<FactoryScript>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self {
            log: Arc::new(CallLog::default()),
            script: Arc::new(FactoryScript::default()),
        }
    }

    pub fn with_script(script: FactoryScript) -> Self {
        Self {
            log: Arc::new(CallLog::default()),
            script: Arc::new(script),
        }
    }

    pub fn device_handle(&self) -> ScriptedDevice {
        ScriptedDevice {
            log: self.log.clone(),
            script: self.script.clone(),
        }
    }

    pub fn sink_handle(&self, path: PathBuf, create_file: bool) -> ScriptedSink {
        ScriptedSink {
            log: self.log.clone(),
            script: self.script.clone(),
            path,
            create_file,
        }
    }
}

#[async_trait]
impl PipelineFactory for ScriptedFactory {
    fn device(&self) -> Box<dyn CaptureDevice> {
        Box::new(self.device_handle())
    }

    fn live_sink(&self, _publish_url: &str, pipe_path: &Path) -> Box<dyn MediaSink> {
        Box::new(self.sink_handle(pipe_path.to_path_buf(), false))
    }

    fn file_sink(&self, buffer_path: &Path, _settings: &CaptureSettings) -> Box<dyn MediaSink> {
        // The real capture process writes the buffer; the fake creates it
        // so lifecycle assertions can watch the file disappear.
        Box::new(self.sink_handle(buffer_path.to_path_buf(), true))
    }

    async fn replay(&self, buffer_path: &Path, _publish_url: &str) -> Result<(), Fault> {
        self.log.push(format!("replay {}", buffer_path.display()));
        self.script
            .replay_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

pub struct ScriptedDevice {
    log: Arc<CallLog>,
    script: Arc<FactoryScript>,
}

#[async_trait]
impl CaptureDevice for ScriptedDevice {
    async fn configure(&mut self, settings: &CaptureSettings) -> Result<(), Fault> {
        self.log.push("device.configure");
        self.script
            .configured_with
            .lock()
            .unwrap()
            .push(settings.clone());
        self.script
            .configure_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn start(&mut self) -> Result<(), Fault> {
        self.log.push("device.start");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), Fault> {
        self.log.push("device.stop");
        if self.script.fail_stops {
            Err(Fault::runtime("scripted stop failure"))
        } else {
            Ok(())
        }
    }

    async fn start_recording(&mut self, _output: &Path) -> Result<(), Fault> {
        self.log.push("device.start_recording");
        Ok(())
    }

    async fn stop_recording(&mut self) -> Result<(), Fault> {
        self.log.push("device.stop_recording");
        if self.script.fail_stops {
            Err(Fault::runtime("scripted stop failure"))
        } else {
            Ok(())
        }
    }

    fn poll_fault(&mut self) -> Option<Fault> {
        self.script.device_polls.lock().unwrap().pop_front()
    }
}

pub struct ScriptedSink {
    log: Arc<CallLog>,
    script: Arc<FactoryScript>,
    path: PathBuf,
    create_file: bool,
}

#[async_trait]
impl MediaSink for ScriptedSink {
    async fn start(&mut self) -> Result<(), Fault> {
        self.log.push("sink.start");
        if self.create_file {
            std::fs::write(&self.path, b"h264").expect("create fake buffer");
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), Fault> {
        self.log.push("sink.stop");
        if self.script.fail_stops {
            Err(Fault::runtime("scripted stop failure"))
        } else {
            Ok(())
        }
    }

    fn input_path(&self) -> &Path {
        &self.path
    }

    fn poll_fault(&mut self) -> Option<Fault> {
        self.script.sink_polls.lock().unwrap().pop_front()
    }

    fn describe(&self) -> String {
        format!("scripted sink {}", self.path.display())
    }
}
