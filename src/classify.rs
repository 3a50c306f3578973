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

// Fault classification: maps a fault to a named recovery action

use crate::fault::{ConnectionKind, DeviceCode, Fault, ResourceCode};

/// Named remediation procedures the supervisor knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    KillConflictingHolder,
    FreeMemory,
    ReconfigureDefaults,
    WaitForDiskSpace,
    RestartPipeline,
    RestartSink,
    RetryAfterDelay,
    FatalShutdown,
}

/// Verdict produced by [`classify`].
///
/// `then` carries the second step of a compound remediation (e.g. wait for
/// disk headroom, then restart the pipeline). `degrade` asks the caller to
/// reduce resolution/frame-rate in its working settings before retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub action: RecoveryAction,
    pub then: Option<RecoveryAction>,
    pub degrade: bool,
    pub retryable: bool,
}

impl Classification {
    fn retry(action: RecoveryAction) -> Self {
        Self {
            action,
            then: None,
            degrade: false,
            retryable: true,
        }
    }

    fn fatal() -> Self {
        Self {
            action: RecoveryAction::FatalShutdown,
            then: None,
            degrade: false,
            retryable: false,
        }
    }
}

/// Classify a fault into a recovery action and a recoverability verdict.
///
/// Pure function; the supervisor owns execution. Unmapped device/resource
/// codes fall through to a log-and-retry default rather than being dropped,
/// and unknown runtime messages get a best-effort pipeline restart.
pub fn classify(fault: &Fault) -> Classification {
    match fault {
        Fault::Device { code, .. } => match code {
            DeviceCode::Absent => Classification::fatal(),
            DeviceCode::Io => Classification::retry(RecoveryAction::RetryAfterDelay),
            DeviceCode::Other(_) => Classification::retry(RecoveryAction::RetryAfterDelay),
        },

        Fault::Resource { code, .. } => match code {
            ResourceCode::Busy => Classification::retry(RecoveryAction::KillConflictingHolder),
            ResourceCode::OutOfMemory => Classification::retry(RecoveryAction::FreeMemory),
            ResourceCode::DiskFull => Classification {
                action: RecoveryAction::WaitForDiskSpace,
                then: Some(RecoveryAction::RestartPipeline),
                degrade: false,
                retryable: true,
            },
            ResourceCode::DescriptorTableFull => {
                Classification::retry(RecoveryAction::RestartPipeline)
            }
            ResourceCode::Other(_) => Classification::retry(RecoveryAction::RetryAfterDelay),
        },

        Fault::Config { .. } => Classification::retry(RecoveryAction::ReconfigureDefaults),

        Fault::Runtime { message } => classify_runtime(message),

        Fault::Memory => Classification {
            action: RecoveryAction::FreeMemory,
            then: Some(RecoveryAction::RestartPipeline),
            degrade: false,
            retryable: true,
        },

        Fault::Connection { kind, .. } => match kind {
            ConnectionKind::BrokenPipe => Classification::retry(RecoveryAction::RestartSink),
            ConnectionKind::Network => Classification::retry(RecoveryAction::RestartSink),
        },
    }
}

// Message rules are ordered: a missing binary or stream is unrecoverable,
// buffer starvation wants memory freed plus a quality reduction, encoder
// stack traces want the pipeline rebuilt. Anything else also rebuilds the
// pipeline, best-effort.
fn classify_runtime(message: &str) -> Classification {
    let lower = message.to_lowercase();

    if lower.contains("not found") {
        return Classification::fatal();
    }

    if lower.contains("buffer") {
        return Classification {
            action: RecoveryAction::FreeMemory,
            then: None,
            degrade: true,
            retryable: true,
        };
    }

    if lower.contains("encoder") || lower.contains("mmal") {
        return Classification::retry(RecoveryAction::RestartPipeline);
    }

    Classification::retry(RecoveryAction::RestartPipeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(code: DeviceCode) -> Fault {
        Fault::Device {
            code,
            context: "test".to_string(),
        }
    }

    fn resource(code: ResourceCode) -> Fault {
        Fault::Resource {
            code,
            context: "test".to_string(),
        }
    }

    #[test]
    fn test_device_absent_is_fatal() {
        let c = classify(&device(DeviceCode::Absent));
        assert_eq!(c.action, RecoveryAction::FatalShutdown);
        assert!(!c.retryable);
    }

    #[test]
    fn test_device_io_retries_after_delay() {
        let c = classify(&device(DeviceCode::Io));
        assert_eq!(c.action, RecoveryAction::RetryAfterDelay);
        assert!(c.retryable);
    }

    #[test]
    fn test_device_busy_kills_holder() {
        let c = classify(&resource(ResourceCode::Busy));
        assert_eq!(c.action, RecoveryAction::KillConflictingHolder);
        assert!(c.retryable);
    }

    #[test]
    fn test_out_of_memory_frees_memory() {
        let c = classify(&resource(ResourceCode::OutOfMemory));
        assert_eq!(c.action, RecoveryAction::FreeMemory);
        assert!(c.retryable);
    }

    #[test]
    fn test_disk_full_waits_then_restarts_pipeline() {
        let c = classify(&resource(ResourceCode::DiskFull));
        assert_eq!(c.action, RecoveryAction::WaitForDiskSpace);
        assert_eq!(c.then, Some(RecoveryAction::RestartPipeline));
        assert!(c.retryable);
    }

    #[test]
    fn test_descriptor_exhaustion_restarts_pipeline() {
        let c = classify(&resource(ResourceCode::DescriptorTableFull));
        assert_eq!(c.action, RecoveryAction::RestartPipeline);
        assert!(c.retryable);
    }

    #[test]
    fn test_unmapped_codes_fall_through_to_retry() {
        let c = classify(&device(DeviceCode::Other(libc::EPROTO)));
        assert_eq!(c.action, RecoveryAction::RetryAfterDelay);
        assert!(c.retryable);

        let c = classify(&resource(ResourceCode::Other(libc::EAGAIN)));
        assert_eq!(c.action, RecoveryAction::RetryAfterDelay);
        assert!(c.retryable);
    }

    #[test]
    fn test_invalid_config_reconfigures_defaults() {
        let c = classify(&Fault::Config {
            context: "unsupported resolution".to_string(),
        });
        assert_eq!(c.action, RecoveryAction::ReconfigureDefaults);
        assert!(c.retryable);
    }

    #[test]
    fn test_memory_exhaustion_frees_then_restarts() {
        let c = classify(&Fault::Memory);
        assert_eq!(c.action, RecoveryAction::FreeMemory);
        assert_eq!(c.then, Some(RecoveryAction::RestartPipeline));
        assert!(c.retryable);
    }

    #[test]
    fn test_broken_pipe_restarts_sink() {
        let c = classify(&Fault::Connection {
            kind: ConnectionKind::BrokenPipe,
            context: "ffmpeg stdin".to_string(),
        });
        assert_eq!(c.action, RecoveryAction::RestartSink);
        assert!(c.retryable);
    }

    #[test]
    fn test_network_fault_restarts_sink() {
        let c = classify(&Fault::Connection {
            kind: ConnectionKind::Network,
            context: "rtsp push".to_string(),
        });
        assert_eq!(c.action, RecoveryAction::RestartSink);
        assert!(c.retryable);
    }

    #[test]
    fn test_runtime_not_found_is_fatal() {
        let c = classify(&Fault::runtime("h264 encoder not found"));
        assert_eq!(c.action, RecoveryAction::FatalShutdown);
        assert!(!c.retryable);
    }

    #[test]
    fn test_runtime_buffer_frees_memory_and_degrades() {
        let c = classify(&Fault::runtime("unable to allocate output buffer"));
        assert_eq!(c.action, RecoveryAction::FreeMemory);
        assert!(c.degrade);
        assert!(c.retryable);
    }

    #[test]
    fn test_runtime_out_of_buffers_degrades_too() {
        // "buffers" contains "buffer", so the quality-reduction rule wins.
        let c = classify(&Fault::runtime("mmal: out of buffers"));
        assert_eq!(c.action, RecoveryAction::FreeMemory);
        assert!(c.degrade);
    }

    #[test]
    fn test_runtime_encoder_restarts_pipeline() {
        for message in ["encoder pipeline stalled", "MMAL component error"] {
            let c = classify(&Fault::runtime(message));
            assert_eq!(c.action, RecoveryAction::RestartPipeline, "{}", message);
            assert!(c.retryable);
        }
    }

    #[test]
    fn test_runtime_unknown_restarts_pipeline_best_effort() {
        let c = classify(&Fault::runtime("something unexpected happened"));
        assert_eq!(c.action, RecoveryAction::RestartPipeline);
        assert!(c.retryable);
        assert!(!c.degrade);
    }
}
