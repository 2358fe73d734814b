//! Conversion progress types and the snapshot feed.
//!
//! [`ProgressFeed`] wraps a `tokio::sync::watch` channel: each published
//! [`ProgressSnapshot`] replaces the previous one whole, so readers never
//! observe a half-updated value. Consumers either `subscribe()` and await
//! changes, or read `current()` at their own pace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// ConversionState
// ---------------------------------------------------------------------------

/// Discrete phase of a conversion run.
///
/// States progress strictly forward: `Preparing → Analyzing → Converting →
/// Finalizing → Completed`, with `Failed` reachable from any non-terminal
/// state. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionState {
    Preparing,
    Analyzing,
    Converting,
    Finalizing,
    Completed,
    Failed,
}

impl ConversionState {
    /// Whether no further state transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversionState::Completed | ConversionState::Failed)
    }
}

// ---------------------------------------------------------------------------
// ProgressSnapshot
// ---------------------------------------------------------------------------

/// A single published view of conversion progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Current phase.
    pub state: ConversionState,
    /// Completion ratio, always clamped to `[0.0, 1.0]`.
    pub ratio: f64,
    /// Elapsed media time in seconds.
    pub elapsed_secs: f64,
    /// Total media duration in seconds (0 when unknown).
    pub total_secs: f64,
    /// Estimated seconds remaining, when a throughput estimate exists.
    pub eta_secs: Option<f64>,
    /// Smoothed conversion speed as a realtime multiplier.
    pub speed: Option<f64>,
    /// Human-readable status line.
    pub message: String,
    /// When this snapshot was published.
    pub timestamp: DateTime<Utc>,
}

impl ProgressSnapshot {
    /// The snapshot a fresh (or reset) run starts from.
    pub fn initial() -> Self {
        Self {
            state: ConversionState::Preparing,
            ratio: 0.0,
            elapsed_secs: 0.0,
            total_secs: 0.0,
            eta_secs: None,
            speed: None,
            message: "Preparing conversion".into(),
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressFeed
// ---------------------------------------------------------------------------

/// Watch channel carrying the latest [`ProgressSnapshot`].
pub struct ProgressFeed {
    tx: watch::Sender<ProgressSnapshot>,
}

impl ProgressFeed {
    /// Create a feed holding the initial snapshot.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ProgressSnapshot::initial());
        Self { tx }
    }

    /// Replace the current snapshot. Succeeds whether or not anyone is
    /// subscribed.
    pub fn publish(&self, snapshot: ProgressSnapshot) {
        self.tx.send_replace(snapshot);
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    /// Clone of the most recently published snapshot.
    pub fn current(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }
}

impl Default for ProgressFeed {
    fn default() -> Self {
        Self::new()
    }
}
