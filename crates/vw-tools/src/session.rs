//! One conversion run: transcoder subprocess plus progress telemetry.
//!
//! A [`ConversionSession`] owns a fresh [`ProgressTracker`] and a
//! cancellation token. `run` acquires the transcoder's per-tool lock, spawns
//! the process, routes every output line through the parser into the
//! tracker, and drives the state machine to a terminal state from the exit
//! status. Observers consume snapshots through [`subscribe`]; cancelling the
//! token terminates the subprocess and awaits its exit.
//!
//! [`subscribe`]: ConversionSession::subscribe

use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use vw_core::{ConversionState, Error, ProgressSnapshot, Result};

use crate::coordinator::DependencyCoordinator;
use crate::locate::ToolKind;
use crate::progress::{parse_line, PhaseHint, ProgressLine, ProgressTracker};
use crate::runner::{RunOutput, ToolInvocation};

/// A single conversion run.
pub struct ConversionSession {
    id: Uuid,
    tracker: ProgressTracker,
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl ConversionSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            tracker: ProgressTracker::new(),
            cancel: CancellationToken::new(),
            timeout: None,
        }
    }

    /// Override the subprocess watchdog for this session.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Session identifier, for log correlation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Subscribe to progress snapshots for this run.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tracker.subscribe()
    }

    /// The most recently published snapshot.
    pub fn current(&self) -> ProgressSnapshot {
        self.tracker.current()
    }

    /// Token that terminates the running subprocess when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Terminate the running subprocess, if any.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run the transcoder with `args` against a source of `total_secs`
    /// duration (0 when unknown; the ratio then stays at 0).
    ///
    /// Overlapping sessions serialize on the transcoder's per-tool lock
    /// rather than racing each other for the same binary.
    pub async fn run(
        &self,
        coordinator: &DependencyCoordinator,
        args: &[String],
        total_secs: f64,
    ) -> Result<RunOutput> {
        let Some(transcoder) = coordinator.resolve(ToolKind::Transcoder) else {
            self.tracker.fail("transcoder not found");
            return Err(Error::tool_not_found(ToolKind::Transcoder.binary_name()));
        };

        let lock = coordinator.lock(ToolKind::Transcoder);
        let _guard = lock.lock().await;

        tracing::info!(session = %self.id, args = ?args, "starting conversion");
        self.tracker
            .update(ConversionState::Preparing, 0.0, total_secs, None);

        let mut invocation = ToolInvocation::new(transcoder).args(args.iter().cloned());
        if let Some(timeout) = self.timeout {
            invocation = invocation.timeout(timeout);
        }

        let out = invocation
            .run_streaming(
                |line| match parse_line(line) {
                    Some(ProgressLine::Phase(PhaseHint::Analyzing)) => {
                        self.tracker
                            .update(ConversionState::Analyzing, 0.0, total_secs, None);
                    }
                    Some(ProgressLine::Phase(PhaseHint::Converting)) => {
                        self.tracker
                            .update(ConversionState::Converting, 0.0, total_secs, None);
                    }
                    Some(ProgressLine::Timed {
                        elapsed_secs,
                        speed,
                    }) => {
                        tracing::trace!(
                            session = %self.id,
                            elapsed_secs,
                            reported_speed = ?speed,
                            "progress sample"
                        );
                        self.tracker.update(
                            ConversionState::Converting,
                            elapsed_secs,
                            total_secs,
                            None,
                        );
                    }
                    None => {}
                },
                Some(self.cancel.clone()),
            )
            .await;

        if out.success {
            self.tracker
                .update(ConversionState::Finalizing, total_secs, total_secs, None);
            self.tracker
                .update(ConversionState::Completed, total_secs, total_secs, None);
            tracing::info!(session = %self.id, "conversion completed");
        } else {
            let reason = last_line(&out.output).unwrap_or("transcoder failed");
            self.tracker.fail(reason);
            tracing::warn!(session = %self.id, reason, "conversion failed");
        }

        Ok(out)
    }
}

impl Default for ConversionSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Last non-empty line of the merged output; the transcoder puts its
/// diagnostic there.
fn last_line(output: &str) -> Option<&str> {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
}
