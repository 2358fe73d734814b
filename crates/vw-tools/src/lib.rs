//! # vw-tools
//!
//! Bundled tool management and subprocess orchestration for the vidwall
//! engine.
//!
//! This crate provides:
//!
//! - **Tool location** ([`ToolLocator`]) -- resolve the downloader,
//!   transcoder, and prober across bundle-relative and system paths, with
//!   nothing cached between calls.
//! - **Permission repair** ([`permissions`]) -- clear execution quarantine
//!   and restore execute bits, idempotently.
//! - **Command execution** ([`ToolInvocation`]) -- async builder capturing
//!   merged output, with streaming, timeout, and cancellation support.
//! - **Dependency coordination** ([`DependencyCoordinator`]) -- one-shot
//!   locate-and-repair pass, availability snapshots, per-tool locks, and a
//!   diagnostic report.
//! - **Progress telemetry** ([`progress`]) -- stateless parsing of the
//!   transcoder's output stream and a windowed ETA estimator publishing
//!   atomic snapshots.
//! - **Operations** ([`ConversionSession`], [`download`](download::download),
//!   [`probe_duration`](probe::probe_duration)) -- the engine's three tool
//!   invocations wired through the pieces above.

pub mod coordinator;
pub mod download;
pub mod locate;
pub mod permissions;
pub mod probe;
pub mod progress;
pub mod runner;
pub mod session;

// ---- Re-exports for convenience ----

pub use coordinator::{DependencyCoordinator, DependencyStatus, ToolStatus};
pub use locate::{default_system_prefixes, ToolKind, ToolLocator};
pub use progress::{parse_line, PhaseHint, ProgressLine, ProgressTracker};
pub use runner::{RunOutput, ToolInvocation};
pub use session::ConversionSession;
