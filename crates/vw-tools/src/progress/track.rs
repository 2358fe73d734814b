//! Stateful progress estimation.
//!
//! [`ProgressTracker`] folds `(elapsed media time, wall-clock instant)`
//! samples into a smoothed throughput estimate and drives the conversion
//! state machine. Every update publishes a whole new snapshot through the
//! feed; between independent runs the tracker must be
//! [`reset`](ProgressTracker::reset) so stale speed samples never leak into
//! a new run's ETA.

use std::collections::VecDeque;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;

use vw_core::{ConversionState, ProgressFeed, ProgressSnapshot};

/// Maximum number of instantaneous speed samples retained.
const SPEED_WINDOW: usize = 10;

/// ETAs above this are left out of the human-readable message; a single
/// noisy early sample can suggest hours of work that will not materialize.
const ETA_MESSAGE_CEILING_SECS: f64 = 3600.0;

#[derive(Default)]
struct TrackerState {
    /// Wall-clock instant of the first update; bookkeeping only.
    started_at: Option<Instant>,
    /// Previous `(elapsed media secs, wall instant)` sample.
    prev: Option<(f64, Instant)>,
    /// FIFO of instantaneous speed samples, oldest first.
    window: VecDeque<f64>,
    state: Option<ConversionState>,
}

impl TrackerState {
    fn current_state(&self) -> ConversionState {
        self.state.unwrap_or(ConversionState::Preparing)
    }
}

/// Stateful estimator and conversion state machine.
pub struct ProgressTracker {
    feed: ProgressFeed,
    inner: Mutex<TrackerState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            feed: ProgressFeed::new(),
            inner: Mutex::new(TrackerState::default()),
        }
    }

    /// Subscribe to published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.feed.subscribe()
    }

    /// The most recently published snapshot.
    pub fn current(&self) -> ProgressSnapshot {
        self.feed.current()
    }

    /// Record a progress observation and publish a new snapshot.
    ///
    /// Updates arriving after a terminal state (`Completed` or `Failed`) are
    /// ignored; a new run must go through [`reset`](Self::reset) first.
    /// `raw_message` is only used to enrich the `Failed` message.
    pub fn update(
        &self,
        state: ConversionState,
        elapsed_secs: f64,
        total_secs: f64,
        raw_message: Option<&str>,
    ) {
        self.update_at(state, elapsed_secs, total_secs, raw_message, Instant::now());
    }

    fn update_at(
        &self,
        state: ConversionState,
        elapsed_secs: f64,
        total_secs: f64,
        raw_message: Option<&str>,
        now: Instant,
    ) {
        let mut s = self.inner.lock();

        let current = s.current_state();
        if current.is_terminal() {
            tracing::trace!(?state, "ignoring update after terminal state");
            return;
        }
        // States only move forward; Failed is reachable from anywhere.
        if state != ConversionState::Failed && rank(state) < rank(current) {
            tracing::trace!(?state, ?current, "ignoring backwards state transition");
            return;
        }

        if s.started_at.is_none() {
            s.started_at = Some(now);
        }

        let ratio = if total_secs > 0.0 {
            (elapsed_secs / total_secs).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let mut speed = None;
        let mut eta_secs = None;

        if state == ConversionState::Converting {
            if let Some((prev_elapsed, prev_at)) = s.prev {
                let wall_delta = now.duration_since(prev_at).as_secs_f64();
                let media_delta = elapsed_secs - prev_elapsed;
                if wall_delta > 0.0 && media_delta > 0.0 {
                    if s.window.len() == SPEED_WINDOW {
                        s.window.pop_front();
                    }
                    s.window.push_back(media_delta / wall_delta);
                }
            }

            if !s.window.is_empty() {
                let mean = s.window.iter().sum::<f64>() / s.window.len() as f64;
                speed = Some(mean);
                if mean > 0.0 && total_secs > 0.0 {
                    eta_secs = Some((total_secs - elapsed_secs).max(0.0) / mean);
                }
            }
        }

        s.prev = Some((elapsed_secs, now));
        s.state = Some(state);

        let message = compose_message(state, ratio, speed, eta_secs, raw_message);
        self.feed.publish(ProgressSnapshot {
            state,
            ratio,
            elapsed_secs,
            total_secs,
            eta_secs,
            speed,
            message,
            timestamp: Utc::now(),
        });
    }

    /// Shorthand for a terminal failure update.
    pub fn fail(&self, reason: &str) {
        let snap = self.current();
        self.update(
            ConversionState::Failed,
            snap.elapsed_secs,
            snap.total_secs,
            Some(reason),
        );
    }

    /// Clear all estimator state and republish the initial snapshot.
    ///
    /// Required between independent conversion runs.
    pub fn reset(&self) {
        let mut s = self.inner.lock();
        *s = TrackerState::default();
        self.feed.publish(ProgressSnapshot::initial());
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn rank(state: ConversionState) -> u8 {
    match state {
        ConversionState::Preparing => 0,
        ConversionState::Analyzing => 1,
        ConversionState::Converting => 2,
        ConversionState::Finalizing => 3,
        ConversionState::Completed => 4,
        ConversionState::Failed => 5,
    }
}

fn compose_message(
    state: ConversionState,
    ratio: f64,
    speed: Option<f64>,
    eta_secs: Option<f64>,
    raw_message: Option<&str>,
) -> String {
    match state {
        ConversionState::Preparing => "Preparing conversion".into(),
        ConversionState::Analyzing => "Analyzing source media".into(),
        ConversionState::Converting => {
            let mut msg = format!("Converting {:.0}%", ratio * 100.0);
            if let Some(v) = speed {
                msg.push_str(&format!(" at {v:.2}x"));
            }
            if let Some(eta) = eta_secs {
                if eta <= ETA_MESSAGE_CEILING_SECS {
                    msg.push_str(&format!(", about {} left", format_eta(eta)));
                }
            }
            msg
        }
        ConversionState::Finalizing => "Finalizing output".into(),
        ConversionState::Completed => "Conversion complete".into(),
        ConversionState::Failed => match raw_message {
            Some(reason) => format!("Conversion failed: {reason}"),
            None => "Conversion failed".into(),
        },
    }
}

fn format_eta(secs: f64) -> String {
    let secs = secs.round() as u64;
    if secs >= 60 {
        format!("{} min {} s", secs / 60, secs % 60)
    } else {
        format!("{secs} s")
    }
}
