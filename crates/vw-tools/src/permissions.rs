//! Executable permission repair.
//!
//! Bundled tools ship unsigned, so the OS marks them with an execution
//! quarantine attribute on first download and the packaging step sometimes
//! loses the execute bit. Both repairs are idempotent, touch only filesystem
//! metadata, and are safe to run concurrently.

use std::path::Path;

/// The quarantine attribute macOS places on downloaded executables.
#[cfg(target_os = "macos")]
const QUARANTINE_ATTR: &str = "com.apple.quarantine";

/// Remove the execution-quarantine attribute from `path`.
///
/// Two mechanisms are tried in order: a targeted `xattr -d` of the
/// quarantine attribute, then a full `xattr -c` clear. "No such xattr" from
/// the first mechanism means the attribute was already absent and counts as
/// success. On platforms without quarantine semantics this is a no-op that
/// reports success.
#[cfg(target_os = "macos")]
pub fn remove_quarantine(path: &Path) -> bool {
    let output = std::process::Command::new("xattr")
        .args(["-d", QUARANTINE_ATTR])
        .arg(path)
        .output();

    match output {
        Ok(out) if out.status.success() => {
            tracing::info!(path = %path.display(), "removed quarantine attribute");
            true
        }
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            if stderr.contains("No such xattr") {
                tracing::debug!(path = %path.display(), "quarantine attribute already absent");
                return true;
            }
            tracing::debug!(
                path = %path.display(),
                error = %stderr.trim(),
                "targeted removal failed, clearing all extended attributes"
            );
            clear_attributes(path)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "could not run xattr: {e}");
            false
        }
    }
}

#[cfg(not(target_os = "macos"))]
pub fn remove_quarantine(path: &Path) -> bool {
    tracing::debug!(path = %path.display(), "no quarantine semantics on this platform");
    true
}

/// Second mechanism: clear every extended attribute on the file.
#[cfg(target_os = "macos")]
fn clear_attributes(path: &Path) -> bool {
    let output = std::process::Command::new("xattr")
        .arg("-c")
        .arg(path)
        .output();

    match output {
        Ok(out) if out.status.success() => {
            tracing::info!(path = %path.display(), "cleared extended attributes");
            true
        }
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            tracing::warn!(
                path = %path.display(),
                error = %stderr.trim(),
                "failed to clear extended attributes"
            );
            false
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "could not run xattr: {e}");
            false
        }
    }
}

/// Ensure the execute bits are set on `path`. Idempotent.
#[cfg(unix)]
pub fn make_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) => {
            tracing::warn!(path = %path.display(), "cannot stat: {e}");
            return false;
        }
    };

    let mut perms = meta.permissions();
    let mode = perms.mode();
    perms.set_mode(mode | 0o755);

    match std::fs::set_permissions(path, perms) {
        Ok(()) => {
            if mode & 0o111 == 0 {
                tracing::info!(path = %path.display(), "set execute permissions");
            }
            true
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "cannot set permissions: {e}");
            false
        }
    }
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> bool {
    true
}
