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

// Network reachability probe

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Answers "is the network reachable right now?".
///
/// The supervisor decides polling cadence; one call is one probe.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Bounded-timeout TCP probe against a fixed target.
///
/// Returns true only on a successful connect. Resolution failures, refused
/// connections, unreachable networks and timeouts all short-circuit to
/// false; nothing propagates.
pub struct ConnectivityMonitor {
    host: String,
    port: u16,
    timeout: Duration,
}

impl ConnectivityMonitor {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }
}

#[async_trait]
impl Probe for ConnectivityMonitor {
    async fn is_reachable(&self) -> bool {
        let target = format!("{}:{}", self.host, self.port);
        match timeout(self.timeout, TcpStream::connect(&target)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!("Probe to {} failed: {}", target, e);
                false
            }
            Err(_) => {
                debug!("Probe to {} timed out after {:?}", target, self.timeout);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_reachable_when_listener_accepts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let monitor = ConnectivityMonitor::new("127.0.0.1", port, Duration::from_secs(2));
        assert!(monitor.is_reachable().await);
    }

    #[tokio::test]
    async fn test_unreachable_when_connection_refused() {
        // Bind then drop to obtain a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let monitor = ConnectivityMonitor::new("127.0.0.1", port, Duration::from_secs(2));
        assert!(!monitor.is_reachable().await);
    }

    #[tokio::test]
    async fn test_unreachable_on_resolution_failure() {
        let monitor =
            ConnectivityMonitor::new("no-such-host.invalid", 80, Duration::from_secs(2));
        assert!(!monitor.is_reachable().await);
    }
}
