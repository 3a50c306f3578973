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

// V4L2 capture device driven through an ffmpeg subprocess

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info, warn};

use crate::config::CaptureSettings;
use crate::fault::Fault;
use crate::session::CaptureDevice;

const STDERR_TAIL_LINES: usize = 8;

/// Captures from a V4L2 device node and encodes H264 into the sink's
/// input path. One ffmpeg process covers capture and encode; `start`
/// checks the configured device is still present, `start_recording`
/// spawns the encoder.
pub struct V4l2Capture {
    settings: Option<CaptureSettings>,
    child: Option<Child>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
}

impl V4l2Capture {
    pub fn new() -> Self {
        Self {
            settings: None,
            child: None,
            stderr_tail: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    fn settings(&self) -> Result<&CaptureSettings, Fault> {
        self.settings.as_ref().ok_or_else(|| Fault::Config {
            context: "capture device used before configure".to_string(),
        })
    }

    fn drain_tail(&self) -> String {
        let tail = self.stderr_tail.lock().unwrap();
        tail.iter().cloned().collect::<Vec<_>>().join("; ")
    }

    async fn reap(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!("Capture process already gone: {}", e);
            }
            let _ = child.wait().await;
        }
    }
}

impl Default for V4l2Capture {
    fn default() -> Self {
        Self::new()
    }
}

/// Tail a subprocess's stderr into a bounded ring so a later exit can be
/// reported with context. Runs until the pipe closes.
pub(crate) fn watch_stderr(
    label: &'static str,
    stderr: ChildStderr,
    tail: Arc<Mutex<VecDeque<String>>>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            warn!("{}: {}", label, line);
            let mut tail = tail.lock().unwrap();
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    });
}

#[async_trait]
impl CaptureDevice for V4l2Capture {
    async fn configure(&mut self, settings: &CaptureSettings) -> Result<(), Fault> {
        let device = Path::new(&settings.device);
        std::fs::metadata(device)
            .map_err(|e| Fault::from_io(&format!("probing {}", settings.device), &e))?;

        debug!(
            "Configured capture: {} {}x{}@{}",
            settings.device, settings.width, settings.height, settings.framerate
        );
        self.settings = Some(settings.clone());
        Ok(())
    }

    async fn start(&mut self) -> Result<(), Fault> {
        // The encoder process is the capture; arming just revalidates the
        // device node so removal between configure and start is caught.
        let settings = self.settings()?.clone();
        std::fs::metadata(&settings.device)
            .map_err(|e| Fault::from_io(&format!("arming {}", settings.device), &e))?;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), Fault> {
        self.reap().await;
        Ok(())
    }

    async fn start_recording(&mut self, output: &Path) -> Result<(), Fault> {
        let settings = self.settings()?.clone();

        let mut child = Command::new("ffmpeg")
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .args(["-f", "v4l2"])
            .arg("-framerate")
            .arg(settings.framerate.to_string())
            .arg("-video_size")
            .arg(format!("{}x{}", settings.width, settings.height))
            .arg("-i")
            .arg(&settings.device)
            .args(["-c:v", "libx264"])
            .args(["-preset", "ultrafast"])
            .args(["-tune", "zerolatency"])
            .args(["-f", "h264"])
            .arg("-y")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Fault::runtime("ffmpeg not found on PATH")
                } else {
                    Fault::from_io("spawning capture encoder", &e)
                }
            })?;

        if let Some(stderr) = child.stderr.take() {
            watch_stderr("capture", stderr, self.stderr_tail.clone());
        }

        info!(
            "Capture encoder started ({} -> {})",
            settings.device,
            output.display()
        );
        self.child = Some(child);
        Ok(())
    }

    async fn stop_recording(&mut self) -> Result<(), Fault> {
        self.reap().await;
        Ok(())
    }

    fn poll_fault(&mut self) -> Option<Fault> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.child = None;
                let tail = self.drain_tail();
                let message = if tail.is_empty() {
                    format!("capture encoder exited unexpectedly ({})", status)
                } else {
                    format!("capture encoder exited ({}): {}", status, tail)
                };
                Some(Fault::runtime(message))
            }
            Ok(None) => None,
            Err(e) => {
                self.child = None;
                Some(Fault::from_io("polling capture encoder", &e))
            }
        }
    }
}
