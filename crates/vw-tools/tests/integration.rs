//! End-to-end coordinator behavior against a fake bundle on disk.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use vw_tools::{DependencyCoordinator, ToolKind, ToolLocator};

fn write_tool(dir: &Path, name: &str, mode: u32) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, "#!/bin/sh\necho \"$0 $@\"\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    path
}

fn full_bundle() -> (TempDir, DependencyCoordinator) {
    let bundle = TempDir::new().unwrap();
    for kind in ToolKind::ALL {
        write_tool(bundle.path(), kind.binary_name(), 0o755);
    }
    let locator = ToolLocator::new(bundle.path(), vec![]);
    (bundle, DependencyCoordinator::new(locator))
}

#[tokio::test]
async fn status_reports_full_bundle_available() {
    let (_bundle, coordinator) = full_bundle();
    let status = coordinator.check_status();
    assert!(status.all_available());
    assert!(status.missing().is_empty());
    assert_eq!(status.tools.len(), 3);
}

#[tokio::test]
async fn status_reports_missing_tools() {
    let bundle = TempDir::new().unwrap();
    write_tool(bundle.path(), "ffmpeg", 0o755);
    let coordinator = DependencyCoordinator::new(ToolLocator::new(bundle.path(), vec![]));

    let status = coordinator.check_status();
    assert!(!status.all_available());
    assert_eq!(
        status.missing(),
        vec![ToolKind::Downloader, ToolKind::Prober]
    );
}

#[tokio::test]
async fn initialize_once_runs_the_fix_pass_exactly_once() {
    let (_bundle, coordinator) = full_bundle();
    let coordinator = Arc::new(coordinator);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(
            async move { coordinator.initialize_once().await },
        ));
    }

    let mut performed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            performed += 1;
        }
    }
    assert_eq!(performed, 1);

    // Later calls remain no-ops.
    assert!(!coordinator.initialize_once().await);
}

#[tokio::test]
async fn fix_pass_makes_a_stripped_binary_resolvable() {
    let bundle = TempDir::new().unwrap();
    // Shipped without the execute bit, as extraction sometimes leaves it.
    write_tool(bundle.path(), "yt-dlp", 0o644);
    write_tool(bundle.path(), "ffmpeg", 0o755);
    write_tool(bundle.path(), "ffprobe", 0o755);

    let coordinator = DependencyCoordinator::new(ToolLocator::new(bundle.path(), vec![]));
    assert!(!coordinator.check_status().all_available());

    assert!(coordinator.initialize_once().await);

    let status = coordinator.check_status();
    assert!(status.all_available(), "missing: {:?}", status.missing());
}

#[tokio::test]
async fn test_executable_accepts_a_healthy_tool() {
    let (_bundle, coordinator) = full_bundle();
    assert!(coordinator.test_executable(ToolKind::Transcoder).await);
}

#[tokio::test]
async fn test_executable_rejects_error_output_despite_exit_zero() {
    let bundle = TempDir::new().unwrap();
    let path = bundle.path().join("yt-dlp");
    fs::write(&path, "#!/bin/sh\necho 'ERROR: unable to load configuration'\nexit 0\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

    let coordinator = DependencyCoordinator::new(ToolLocator::new(bundle.path(), vec![]));
    assert!(!coordinator.test_executable(ToolKind::Downloader).await);
}

#[tokio::test]
async fn test_executable_rejects_nonzero_exit() {
    let bundle = TempDir::new().unwrap();
    let path = bundle.path().join("ffprobe");
    fs::write(&path, "#!/bin/sh\nexit 2\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

    let coordinator = DependencyCoordinator::new(ToolLocator::new(bundle.path(), vec![]));
    assert!(!coordinator.test_executable(ToolKind::Prober).await);
}

#[tokio::test]
async fn test_executable_fails_for_unresolved_tool() {
    let bundle = TempDir::new().unwrap();
    let coordinator = DependencyCoordinator::new(ToolLocator::new(bundle.path(), vec![]));
    assert!(!coordinator.test_executable(ToolKind::Transcoder).await);
}

#[tokio::test]
async fn diagnostic_report_lists_every_tool() {
    let bundle = TempDir::new().unwrap();
    write_tool(bundle.path(), "ffmpeg", 0o755);
    let coordinator = DependencyCoordinator::new(ToolLocator::new(bundle.path(), vec![]));

    let report = coordinator.diagnostic_report();
    assert!(report.contains("ffmpeg: available"));
    assert!(report.contains("mode: 755"));
    assert!(report.contains("size:"));
    assert!(report.contains("yt-dlp: MISSING"));
    assert!(report.contains("ffprobe: MISSING"));
}
