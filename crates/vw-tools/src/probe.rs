//! Media duration probing.
//!
//! The progress tracker needs the source's total duration to turn elapsed
//! media time into a completion ratio; this shells out to the bundled prober
//! for it.

use std::path::Path;
use std::time::Duration;

use vw_core::{Error, Result};

use crate::coordinator::DependencyCoordinator;
use crate::locate::ToolKind;
use crate::runner::ToolInvocation;

/// Probes rarely take more than a second even on network volumes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Total duration of `media` in seconds, via the bundled prober.
pub async fn probe_duration(
    coordinator: &DependencyCoordinator,
    media: &Path,
) -> Result<f64> {
    let prober = coordinator
        .resolve(ToolKind::Prober)
        .ok_or_else(|| Error::tool_not_found(ToolKind::Prober.binary_name()))?;

    let lock = coordinator.lock(ToolKind::Prober);
    let _guard = lock.lock().await;

    let out = ToolInvocation::new(prober)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(media.to_string_lossy())
        .timeout(PROBE_TIMEOUT)
        .run()
        .await;

    if !out.success {
        return Err(Error::probe(format!(
            "prober failed on {}: {}",
            media.display(),
            out.output.trim()
        )));
    }

    let raw = out.output.trim();
    raw.parse::<f64>().map_err(|_| {
        Error::probe(format!(
            "unparseable duration {raw:?} for {}",
            media.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::ToolLocator;

    #[cfg(unix)]
    fn coordinator_with_fake_prober(script: &str) -> (tempfile::TempDir, DependencyCoordinator) {
        use std::os::unix::fs::PermissionsExt;

        let bundle = tempfile::TempDir::new().unwrap();
        let path = bundle.path().join("ffprobe");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let locator = ToolLocator::new(bundle.path(), vec![]);
        (bundle, DependencyCoordinator::new(locator))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn parses_duration_from_prober_output() {
        let (_bundle, coordinator) = coordinator_with_fake_prober("echo 150.250000");
        let secs = probe_duration(&coordinator, Path::new("/tmp/in.mp4"))
            .await
            .unwrap();
        assert!((secs - 150.25).abs() < 1e-9);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn prober_failure_is_a_probe_error() {
        let (_bundle, coordinator) =
            coordinator_with_fake_prober("echo 'in.mp4: No such file' >&2; exit 1");
        let err = probe_duration(&coordinator, Path::new("/tmp/in.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn garbage_output_is_a_probe_error() {
        let (_bundle, coordinator) = coordinator_with_fake_prober("echo N/A");
        let err = probe_duration(&coordinator, Path::new("/tmp/in.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
    }

    #[tokio::test]
    async fn missing_prober_is_tool_not_found() {
        let bundle = tempfile::TempDir::new().unwrap();
        let coordinator =
            DependencyCoordinator::new(ToolLocator::new(bundle.path(), vec![]));
        let err = probe_duration(&coordinator, Path::new("/tmp/in.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
    }
}
