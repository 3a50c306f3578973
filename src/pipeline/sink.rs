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

// Publish sinks: live RTSP over a FIFO, or the offline buffer file

use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info, warn};

use crate::classify::classify;
use crate::config::CaptureSettings;
use crate::fault::{ConnectionKind, Fault};
use crate::session::MediaSink;

/// Publishes the H264 stream read from a FIFO to an RTSP target via an
/// ffmpeg subprocess.
///
/// The subprocess is watched asynchronously: its stderr lines are
/// classified and logged as they arrive, but recovery is only ever driven
/// by the supervisor's next fault poll.
pub struct RtspPublisher {
    url: String,
    pipe_path: PathBuf,
    child: Option<Child>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
}

impl RtspPublisher {
    pub fn new(url: impl Into<String>, pipe_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            pipe_path: pipe_path.into(),
            child: None,
            stderr_tail: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    fn ensure_fifo(&self) -> Result<(), Fault> {
        let c_path = CString::new(self.pipe_path.as_os_str().as_bytes()).map_err(|_| {
            Fault::Config {
                context: format!("pipe path {} contains NUL", self.pipe_path.display()),
            }
        })?;

        let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EEXIST) {
                return Err(Fault::from_io(
                    &format!("creating fifo {}", self.pipe_path.display()),
                    &err,
                ));
            }
        }
        Ok(())
    }

    async fn reap(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!("Publisher process already gone: {}", e);
            }
            let _ = child.wait().await;
        }
    }
}

// The asynchronous fault callback for the publish subprocess: classify
// and log each reported line; never drive recovery from here.
fn watch_publisher_stderr(stderr: ChildStderr, tail: Arc<Mutex<VecDeque<String>>>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            let classification = classify(&Fault::runtime(line.clone()));
            warn!(
                "Publisher: {} (would indicate {:?})",
                line, classification.action
            );
            let mut tail = tail.lock().unwrap();
            if tail.len() == 8 {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    });
}

#[async_trait]
impl MediaSink for RtspPublisher {
    async fn start(&mut self) -> Result<(), Fault> {
        self.ensure_fifo()?;

        let mut child = Command::new("ffmpeg")
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-re")
            .args(["-f", "h264"])
            .args(["-i"])
            .arg(&self.pipe_path)
            .args(["-c:v", "copy"])
            .args(["-f", "rtsp"])
            .arg(&self.url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Fault::runtime("ffmpeg not found on PATH")
                } else {
                    Fault::from_io("spawning publisher", &e)
                }
            })?;

        if let Some(stderr) = child.stderr.take() {
            watch_publisher_stderr(stderr, self.stderr_tail.clone());
        }

        info!("Publisher started ({})", self.url);
        self.child = Some(child);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), Fault> {
        self.reap().await;
        Ok(())
    }

    fn input_path(&self) -> &Path {
        &self.pipe_path
    }

    fn poll_fault(&mut self) -> Option<Fault> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => {
                self.child = None;
                let tail = {
                    let tail = self.stderr_tail.lock().unwrap();
                    tail.iter().cloned().collect::<Vec<_>>().join("; ")
                };
                Some(Fault::Connection {
                    kind: ConnectionKind::Network,
                    context: if tail.is_empty() {
                        format!("publisher exited unexpectedly ({})", status)
                    } else {
                        format!("publisher exited ({}): {}", status, tail)
                    },
                })
            }
            Ok(None) => None,
            Err(e) => {
                self.child = None;
                Some(Fault::from_io("polling publisher", &e))
            }
        }
    }

    fn describe(&self) -> String {
        format!("rtsp {}", self.url)
    }
}

#[derive(Debug, Serialize)]
struct BufferMetadata<'a> {
    started_at: String,
    device: &'a str,
    width: u32,
    height: u32,
    framerate: u32,
}

/// Offline buffer sink: the capture device writes straight into the
/// buffer file, so start/stop have nothing to manage beyond the sidecar.
pub struct BufferFileSink {
    path: PathBuf,
    settings: CaptureSettings,
}

impl BufferFileSink {
    pub fn new(path: impl Into<PathBuf>, settings: CaptureSettings) -> Self {
        Self {
            path: path.into(),
            settings,
        }
    }
}

/// Sidecar path recording when and how a buffer was captured.
pub fn metadata_path(buffer_path: &Path) -> PathBuf {
    let mut os = buffer_path.as_os_str().to_owned();
    os.push(".meta.json");
    PathBuf::from(os)
}

#[async_trait]
impl MediaSink for BufferFileSink {
    async fn start(&mut self) -> Result<(), Fault> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Fault::from_io(&format!("creating {}", parent.display()), &e)
            })?;
        }

        let meta = BufferMetadata {
            started_at: chrono::Utc::now().to_rfc3339(),
            device: &self.settings.device,
            width: self.settings.width,
            height: self.settings.height,
            framerate: self.settings.framerate,
        };
        let sidecar = metadata_path(&self.path);
        match serde_json::to_string_pretty(&meta) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&sidecar, json) {
                    warn!("Cannot write buffer sidecar {}: {}", sidecar.display(), e);
                }
            }
            Err(e) => warn!("Cannot serialize buffer metadata: {}", e),
        }

        info!("Offline buffer sink ready at {}", self.path.display());
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), Fault> {
        Ok(())
    }

    fn input_path(&self) -> &Path {
        &self.path
    }

    fn poll_fault(&mut self) -> Option<Fault> {
        None
    }

    fn describe(&self) -> String {
        format!("offline buffer {}", self.path.display())
    }
}

/// Stream a recorded buffer to the publish target. Blocks until the
/// replay process finishes; the caller deletes the file either way.
pub async fn replay_buffer(path: &Path, url: &str) -> Result<(), Fault> {
    info!("Replaying {} to {}", path.display(), url);

    let status = Command::new("ffmpeg")
        .arg("-hide_banner")
        .args(["-loglevel", "error"])
        .arg("-re")
        .args(["-f", "h264"])
        .args(["-i"])
        .arg(path)
        .args(["-c:v", "copy"])
        .args(["-f", "rtsp"])
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Fault::runtime("ffmpeg not found on PATH")
            } else {
                Fault::from_io("spawning replay", &e)
            }
        })?;

    if status.success() {
        info!("Replay of {} complete", path.display());
        Ok(())
    } else {
        Err(Fault::Connection {
            kind: ConnectionKind::Network,
            context: format!("replay exited with {}", status),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_path_appends_suffix() {
        assert_eq!(
            metadata_path(Path::new("/var/spool/edgecam/buffer.h264")),
            PathBuf::from("/var/spool/edgecam/buffer.h264.meta.json")
        );
    }

    #[tokio::test]
    async fn test_buffer_sink_writes_sidecar() {
        let dir = tempfile::TempDir::new().unwrap();
        let buffer = dir.path().join("buffer.h264");

        let mut sink = BufferFileSink::new(&buffer, CaptureSettings::default());
        sink.start().await.unwrap();

        let sidecar = metadata_path(&buffer);
        let content = std::fs::read_to_string(&sidecar).unwrap();
        assert!(content.contains("started_at"));
        assert!(content.contains("/dev/video0"));
        assert_eq!(sink.input_path(), buffer.as_path());
    }

    #[tokio::test]
    async fn test_buffer_sink_creates_parent_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let buffer = dir.path().join("nested/spool/buffer.h264");

        let mut sink = BufferFileSink::new(&buffer, CaptureSettings::default());
        sink.start().await.unwrap();
        assert!(buffer.parent().unwrap().is_dir());
    }
}
