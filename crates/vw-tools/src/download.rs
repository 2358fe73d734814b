//! Downloader invocation.
//!
//! Runs the bundled downloader against a URL. Its output format is not part
//! of the engine's telemetry contract, so the merged output is returned
//! as-is for the caller to surface.

use std::path::Path;

use vw_core::{Error, Result};

use crate::coordinator::DependencyCoordinator;
use crate::locate::ToolKind;
use crate::runner::{RunOutput, ToolInvocation};

/// Download `url` into `dest_dir`, passing `extra_args` through to the tool.
pub async fn download(
    coordinator: &DependencyCoordinator,
    url: &str,
    dest_dir: &Path,
    extra_args: &[String],
) -> Result<RunOutput> {
    let downloader = coordinator
        .resolve(ToolKind::Downloader)
        .ok_or_else(|| Error::tool_not_found(ToolKind::Downloader.binary_name()))?;

    let lock = coordinator.lock(ToolKind::Downloader);
    let _guard = lock.lock().await;

    tracing::info!(url, dest = %dest_dir.display(), "starting download");

    let out = ToolInvocation::new(downloader)
        .args(["-P".to_string(), dest_dir.to_string_lossy().to_string()])
        .args(extra_args.iter().cloned())
        .arg(url)
        .run()
        .await;

    if out.success {
        tracing::info!(url, "download finished");
    } else {
        tracing::warn!(url, "download failed");
    }

    Ok(out)
}
