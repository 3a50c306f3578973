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

// Fault taxonomy raised by capture/publish collaborators

use std::io;
use thiserror::Error;

/// Errno-class codes attached to a device fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCode {
    /// Device node does not exist or was removed (ENOENT/ENODEV/ENXIO).
    Absent,
    /// Low-level I/O error on the device (EIO).
    Io,
    /// Any other OS code reported against the device.
    Other(i32),
}

/// Errno-class codes attached to a resource fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceCode {
    /// Another process holds the device (EBUSY).
    Busy,
    /// Allocation failed (ENOMEM).
    OutOfMemory,
    /// No space left on the recording volume (ENOSPC).
    DiskFull,
    /// Descriptor table exhausted (EMFILE/ENFILE).
    DescriptorTableFull,
    /// Any other OS code reported against a resource.
    Other(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// The publish subprocess lost its pipe (EPIPE).
    BrokenPipe,
    /// Network-level failure that is not a reachability probe result.
    Network,
}

/// A fault raised by a collaborator, short-lived and immutable.
///
/// Collaborators that see an OS error go through [`Fault::from_io`] so the
/// classifier can work on structured codes; only free-form subprocess
/// output is carried as a `Runtime` message.
#[derive(Debug, Clone, Error)]
pub enum Fault {
    #[error("device fault ({code:?}) during {context}")]
    Device { code: DeviceCode, context: String },

    #[error("resource fault ({code:?}) during {context}")]
    Resource { code: ResourceCode, context: String },

    #[error("invalid configuration: {context}")]
    Config { context: String },

    #[error("runtime fault: {message}")]
    Runtime { message: String },

    #[error("memory exhaustion")]
    Memory,

    #[error("connection fault ({kind:?}): {context}")]
    Connection {
        kind: ConnectionKind,
        context: String,
    },
}

impl Fault {
    /// Map an OS error raised during `context` into the fault taxonomy.
    pub fn from_io(context: &str, err: &io::Error) -> Self {
        let context = context.to_string();
        match err.raw_os_error() {
            Some(code) if code == libc::ENOENT || code == libc::ENODEV || code == libc::ENXIO => {
                Fault::Device {
                    code: DeviceCode::Absent,
                    context,
                }
            }
            Some(code) if code == libc::EIO => Fault::Device {
                code: DeviceCode::Io,
                context,
            },
            Some(code) if code == libc::EBUSY => Fault::Resource {
                code: ResourceCode::Busy,
                context,
            },
            Some(code) if code == libc::ENOMEM => Fault::Resource {
                code: ResourceCode::OutOfMemory,
                context,
            },
            Some(code) if code == libc::ENOSPC => Fault::Resource {
                code: ResourceCode::DiskFull,
                context,
            },
            Some(code) if code == libc::EMFILE || code == libc::ENFILE => Fault::Resource {
                code: ResourceCode::DescriptorTableFull,
                context,
            },
            Some(code) if code == libc::EINVAL => Fault::Config { context },
            Some(code) if code == libc::EPIPE => Fault::Connection {
                kind: ConnectionKind::BrokenPipe,
                context,
            },
            Some(code) => Fault::Device {
                code: DeviceCode::Other(code),
                context,
            },
            None => match err.kind() {
                io::ErrorKind::BrokenPipe => Fault::Connection {
                    kind: ConnectionKind::BrokenPipe,
                    context,
                },
                io::ErrorKind::NotFound => Fault::Device {
                    code: DeviceCode::Absent,
                    context,
                },
                io::ErrorKind::OutOfMemory => Fault::Resource {
                    code: ResourceCode::OutOfMemory,
                    context,
                },
                _ => Fault::Runtime {
                    message: format!("{} during {}", err, context),
                },
            },
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Fault::Runtime {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(code: i32) -> io::Error {
        io::Error::from_raw_os_error(code)
    }

    #[test]
    fn test_errno_device_absent() {
        for code in [libc::ENOENT, libc::ENODEV, libc::ENXIO] {
            match Fault::from_io("open /dev/video0", &os(code)) {
                Fault::Device {
                    code: DeviceCode::Absent,
                    ..
                } => {}
                other => panic!("expected Device Absent for errno {}, got {:?}", code, other),
            }
        }
    }

    #[test]
    fn test_errno_resource_codes() {
        let cases = [
            (libc::EBUSY, ResourceCode::Busy),
            (libc::ENOMEM, ResourceCode::OutOfMemory),
            (libc::ENOSPC, ResourceCode::DiskFull),
            (libc::EMFILE, ResourceCode::DescriptorTableFull),
            (libc::ENFILE, ResourceCode::DescriptorTableFull),
        ];
        for (errno, expected) in cases {
            match Fault::from_io("configure", &os(errno)) {
                Fault::Resource { code, .. } => assert_eq!(code, expected),
                other => panic!("expected Resource for errno {}, got {:?}", errno, other),
            }
        }
    }

    #[test]
    fn test_errno_einval_is_config() {
        assert!(matches!(
            Fault::from_io("configure", &os(libc::EINVAL)),
            Fault::Config { .. }
        ));
    }

    #[test]
    fn test_errno_epipe_is_broken_pipe() {
        assert!(matches!(
            Fault::from_io("publish", &os(libc::EPIPE)),
            Fault::Connection {
                kind: ConnectionKind::BrokenPipe,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_errno_kept_as_device_other() {
        match Fault::from_io("ioctl", &os(libc::EPROTO)) {
            Fault::Device {
                code: DeviceCode::Other(code),
                ..
            } => assert_eq!(code, libc::EPROTO),
            other => panic!("expected Device Other, got {:?}", other),
        }
    }

    #[test]
    fn test_synthetic_error_falls_back_to_runtime() {
        let err = io::Error::new(io::ErrorKind::InvalidData, "garbled frame header");
        match Fault::from_io("decode", &err) {
            Fault::Runtime { message } => assert!(message.contains("garbled frame header")),
            other => panic!("expected Runtime, got {:?}", other),
        }
    }
}
