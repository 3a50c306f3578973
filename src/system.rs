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

// Host resource queries: memory utilization, disk headroom, device holders.
// Everything degrades gracefully off-Linux or without privileges; callers
// treat None as "unknown", not as a fault.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::debug;

/// Snapshot of `/proc/meminfo`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryInfo {
    pub total_kb: u64,
    pub available_kb: u64,
}

impl MemoryInfo {
    pub fn read() -> Option<Self> {
        let content = std::fs::read_to_string("/proc/meminfo").ok()?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Option<Self> {
        let mut total_kb = None;
        let mut available_kb = None;

        for line in content.lines() {
            let mut fields = line.split_whitespace();
            match fields.next() {
                Some("MemTotal:") => total_kb = fields.next()?.parse().ok(),
                Some("MemAvailable:") => available_kb = fields.next()?.parse().ok(),
                _ => {}
            }
        }

        Some(Self {
            total_kb: total_kb?,
            available_kb: available_kb?,
        })
    }

    pub fn used_percent(&self) -> f64 {
        if self.total_kb == 0 {
            return 0.0;
        }
        let used = self.total_kb.saturating_sub(self.available_kb);
        used as f64 * 100.0 / self.total_kb as f64
    }
}

/// Free space in megabytes on the filesystem holding `path`.
pub fn free_disk_mb(path: &Path) -> Option<u64> {
    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };

    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        debug!(
            "statvfs({}) failed: {}",
            path.display(),
            io::Error::last_os_error()
        );
        return None;
    }

    let free_bytes = (stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64);
    Some(free_bytes / (1024 * 1024))
}

/// Pids of processes (other than ours) with an open descriptor on the
/// device node.
///
/// Unreadable `/proc/<pid>/fd` directories (foreign processes without
/// privileges, or pids that exited mid-scan) are skipped.
pub fn device_holders(device: &Path) -> Vec<u32> {
    let mut holders = Vec::new();
    let own_pid = std::process::id();

    let entries = match std::fs::read_dir("/proc") {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot enumerate /proc: {}", e);
            return holders;
        }
    };

    for entry in entries.flatten() {
        let pid: u32 = match entry.file_name().to_string_lossy().parse() {
            Ok(pid) => pid,
            Err(_) => continue,
        };
        if pid == own_pid {
            continue;
        }

        let fd_dir = entry.path().join("fd");
        let fds = match std::fs::read_dir(&fd_dir) {
            Ok(fds) => fds,
            Err(_) => continue,
        };

        for fd in fds.flatten() {
            if let Ok(target) = std::fs::read_link(fd.path()) {
                if target == device {
                    holders.push(pid);
                    break;
                }
            }
        }
    }

    holders
}

/// Send SIGTERM to a process.
pub fn terminate(pid: u32) -> io::Result<()> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Ask the kernel to drop page/dentry/inode caches. Needs privileges;
/// callers log a failure and move on.
pub fn drop_page_caches() -> io::Result<()> {
    std::fs::write("/proc/sys/vm/drop_caches", "3")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MEMINFO: &str = "\
MemTotal:        3884372 kB
MemFree:          170848 kB
MemAvailable:    1942186 kB
Buffers:          103072 kB
Cached:          1729788 kB
SwapTotal:        102396 kB
";

    #[test]
    fn test_parse_meminfo() {
        let info = MemoryInfo::parse(SAMPLE_MEMINFO).unwrap();
        assert_eq!(info.total_kb, 3884372);
        assert_eq!(info.available_kb, 1942186);
        assert!((info.used_percent() - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_meminfo_missing_fields() {
        assert_eq!(MemoryInfo::parse("MemTotal: 1024 kB\n"), None);
        assert_eq!(MemoryInfo::parse(""), None);
    }

    #[test]
    fn test_used_percent_zero_total() {
        let info = MemoryInfo {
            total_kb: 0,
            available_kb: 0,
        };
        assert_eq!(info.used_percent(), 0.0);
    }

    #[test]
    fn test_free_disk_on_tempdir() {
        let dir = tempfile::TempDir::new().unwrap();
        let free = free_disk_mb(dir.path());
        assert!(free.is_some());
    }

    #[test]
    fn test_free_disk_on_missing_path() {
        assert_eq!(free_disk_mb(Path::new("/nonexistent/volume")), None);
    }

    #[test]
    fn test_no_foreign_holders_of_fresh_file() {
        // Our own descriptors are excluded, so a file only we created has
        // no holders.
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(device_holders(file.path()).is_empty());
    }
}
