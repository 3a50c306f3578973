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

// The mode-transition controller: one supervisory loop deciding, every
// iteration, whether to publish live, buffer offline, recover, or give up

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::classify::{classify, Classification, RecoveryAction};
use crate::config::{CaptureSettings, SupervisorConfig};
use crate::connectivity::Probe;
use crate::location;
use crate::offline::{OfflineBufferManager, OfflineOutcome};
use crate::pipeline::PipelineFactory;
use crate::recovery;
use crate::session::CaptureSession;

const ACTION_HISTORY_LIMIT: usize = 64;

/// The only terminal condition; the binary maps it to exit code 1.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("fatal shutdown: {0}")]
    Fatal(String),
}

/// Entry decision for one supervisory iteration. Re-derived from the
/// probe every time, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Live,
    Offline,
}

/// Drives the capture-and-publish pipeline across outages and faults.
///
/// Single cooperative task: every operation blocks the loop for its
/// duration, and the one `CaptureSession` is owned here exclusively and
/// fully stopped before any mode transition.
pub struct Supervisor {
    config: SupervisorConfig,
    /// Working capture parameters; degradations applied by recovery
    /// actions persist across attempts of the same initialization chain.
    settings: CaptureSettings,
    publish_url: String,
    probe: Box<dyn Probe>,
    factory: Box<dyn PipelineFactory>,
    stop: watch::Receiver<bool>,
    actions_taken: VecDeque<RecoveryAction>,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        probe: Box<dyn Probe>,
        factory: Box<dyn PipelineFactory>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        let geo = location::read_location(&config.publish.location_file);
        let publish_url = location::publish_url(&config.publish.url, geo);
        let settings = config.capture.clone();

        Self {
            config,
            settings,
            publish_url,
            probe,
            factory,
            stop,
            actions_taken: VecDeque::new(),
        }
    }

    /// Run until fatal shutdown or a cooperative stop request.
    pub async fn run(&mut self) -> Result<(), SupervisorError> {
        info!("Supervisor started (publishing to {})", self.publish_url);

        loop {
            self.run_iteration().await?;

            if self.stop_requested() {
                info!("Stop requested; supervisor exiting");
                return Ok(());
            }

            // Breather between mode exits so persistent failure does not
            // spin a hot loop.
            sleep(self.config.recovery.iteration_delay()).await;
        }
    }

    /// One entry decision plus the full mode that follows it.
    pub async fn run_iteration(&mut self) -> Result<(), SupervisorError> {
        if self.stop_requested() {
            return Ok(());
        }

        let mode = if self.probe.is_reachable().await {
            Mode::Live
        } else {
            Mode::Offline
        };
        info!("Entry decision: {:?}", mode);

        match mode {
            Mode::Live => self.run_live().await,
            Mode::Offline => self.run_offline().await,
        }
    }

    /// Recent recovery actions, newest last. Bounded telemetry window.
    pub fn action_history(&self) -> impl Iterator<Item = RecoveryAction> + '_ {
        self.actions_taken.iter().copied()
    }

    /// Capture parameters currently in effect, including degradations.
    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    fn note(&mut self, action: RecoveryAction) {
        if self.actions_taken.len() == ACTION_HISTORY_LIMIT {
            self.actions_taken.pop_front();
        }
        self.actions_taken.push_back(action);
    }

    fn fatal(&mut self, reason: impl Into<String>) -> SupervisorError {
        let reason = reason.into();
        self.note(RecoveryAction::FatalShutdown);
        error!("FATAL: {}", reason);
        SupervisorError::Fatal(reason)
    }

    fn build_session(&self, mode: Mode) -> CaptureSession {
        let device = self.factory.device();
        let sink = match mode {
            Mode::Live => self
                .factory
                .live_sink(&self.publish_url, Path::new(&self.settings.pipe_path)),
            Mode::Offline => self
                .factory
                .file_sink(Path::new(&self.config.offline.buffer_path), &self.settings),
        };
        CaptureSession::new(device, sink)
    }

    /// Bounded initialization (explicit loop, never recursion).
    ///
    /// Each retryable fault consumes one try and executes its classified
    /// action chain before the next attempt; settings mutated by an
    /// action carry into that attempt. A non-retryable fault bypasses
    /// the budget entirely.
    async fn initialize_session(&mut self, mode: Mode) -> Result<CaptureSession, SupervisorError> {
        let mut tries = self.config.recovery.max_tries;
        if tries == 0 {
            return Err(self.fatal("retry budget is zero at entry"));
        }

        loop {
            let mut session = self.build_session(mode);
            match session.initialize(&self.settings).await {
                Ok(()) => return Ok(session),
                Err(fault) => {
                    session.stop_all().await;

                    let verdict = classify(&fault);
                    warn!(
                        "Initialization fault: {} -> {:?} (retryable: {})",
                        fault, verdict.action, verdict.retryable
                    );

                    if !verdict.retryable {
                        return Err(self.fatal(format!("unrecoverable fault: {}", fault)));
                    }

                    tries -= 1;
                    self.apply_before_retry(&verdict).await;

                    if tries == 0 {
                        return Err(self.fatal(format!(
                            "retry budget exhausted after {} attempts (last fault: {})",
                            self.config.recovery.max_tries, fault
                        )));
                    }
                    info!("Retrying initialization ({} tries left)", tries);
                }
            }
        }
    }

    /// Execute a classification between initialization attempts. There is
    /// no live session here, so the restart actions reduce to the delay
    /// before the next attempt rebuilds everything.
    async fn apply_before_retry(&mut self, verdict: &Classification) {
        if verdict.degrade {
            self.settings.degrade();
            info!(
                "Degraded capture settings to {}x{}@{}",
                self.settings.width, self.settings.height, self.settings.framerate
            );
        }

        self.run_detached_action(verdict.action).await;
        if let Some(then) = verdict.then {
            self.run_detached_action(then).await;
        }
    }

    async fn run_detached_action(&mut self, action: RecoveryAction) {
        self.note(action);
        match action {
            RecoveryAction::KillConflictingHolder => {
                recovery::kill_conflicting_holders(&self.settings.device).await;
            }
            RecoveryAction::FreeMemory => {
                recovery::free_memory(self.config.recovery.memory_backoff()).await;
            }
            RecoveryAction::ReconfigureDefaults => {
                recovery::reconfigure_defaults(&mut self.settings);
            }
            RecoveryAction::WaitForDiskSpace => {
                recovery::wait_for_disk_space(
                    &self.recording_volume(),
                    self.config.recovery.min_free_disk_mb,
                    self.config.recovery.disk_poll(),
                )
                .await;
            }
            RecoveryAction::RestartPipeline
            | RecoveryAction::RestartSink
            | RecoveryAction::RetryAfterDelay => {
                sleep(self.config.recovery.restart_delay()).await;
            }
            RecoveryAction::FatalShutdown => {
                // Callers route fatal verdicts before execution.
                error!("FatalShutdown reached the action executor");
            }
        }
    }

    /// Execute a classification against the live session. Restart
    /// actions operate on the session per their prescribed stop/start
    /// order; a restart failure is logged, the caller falls back to the
    /// entry decision either way.
    async fn apply_with_session(
        &mut self,
        verdict: &Classification,
        session: &mut CaptureSession,
    ) {
        if verdict.degrade {
            self.settings.degrade();
            info!(
                "Degraded capture settings to {}x{}@{}",
                self.settings.width, self.settings.height, self.settings.framerate
            );
        }

        self.run_session_action(verdict.action, session).await;
        if let Some(then) = verdict.then {
            self.run_session_action(then, session).await;
        }
    }

    async fn run_session_action(&mut self, action: RecoveryAction, session: &mut CaptureSession) {
        match action {
            RecoveryAction::RestartPipeline => {
                self.note(action);
                if let Err(e) =
                    recovery::restart_pipeline(session, self.config.recovery.restart_delay()).await
                {
                    warn!("Pipeline restart failed: {}", e);
                }
            }
            RecoveryAction::RestartSink => {
                self.note(action);
                if let Err(e) =
                    recovery::restart_sink(session, self.config.recovery.restart_delay()).await
                {
                    warn!("Sink restart failed: {}", e);
                }
            }
            other => self.run_detached_action(other).await,
        }
    }

    fn recording_volume(&self) -> PathBuf {
        Path::new(&self.config.offline.buffer_path)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"))
    }

    async fn run_live(&mut self) -> Result<(), SupervisorError> {
        let mut session = self.initialize_session(Mode::Live).await?;
        let poll = self.config.probe.poll_interval();

        loop {
            sleep(poll).await;

            if self.stop_requested() {
                session.stop_all().await;
                return Ok(());
            }

            if let Some(fault) = session.poll_fault() {
                let verdict = classify(&fault);
                error!(
                    "Fault in LIVE mode: {} -> {:?} (retryable: {})",
                    fault, verdict.action, verdict.retryable
                );

                if !verdict.retryable {
                    session.stop_all().await;
                    return Err(self.fatal(format!("unrecoverable fault: {}", fault)));
                }

                self.apply_with_session(&verdict, &mut session).await;

                // Back to the entry decision; the session never crosses a
                // mode boundary.
                session.stop_all().await;
                return Ok(());
            }

            if !self.probe.is_reachable().await {
                info!("Reachability lost; leaving LIVE mode");
                session.stop_all().await;
                return Ok(());
            }
        }
    }

    async fn run_offline(&mut self) -> Result<(), SupervisorError> {
        let session = self.initialize_session(Mode::Offline).await?;

        let manager = OfflineBufferManager::new(
            self.probe.as_ref(),
            self.factory.as_ref(),
            &self.config.offline,
            &self.publish_url,
        );
        let outcome = manager.run(session, &self.stop).await;

        match outcome {
            OfflineOutcome::Replayed => info!("Offline episode ended: buffer replayed"),
            OfflineOutcome::DiscardedStale => {
                info!("Offline episode ended: buffer too stale, discarded")
            }
            OfflineOutcome::DiscardedTimeout => {
                info!("Offline episode ended: timeout, buffer discarded")
            }
            OfflineOutcome::Interrupted => info!("Offline episode interrupted by stop request"),
        }
        Ok(())
    }
}
