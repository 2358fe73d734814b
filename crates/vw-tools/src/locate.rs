//! Bundled tool location.
//!
//! [`ToolLocator`] resolves a logical tool name to a concrete executable
//! path, trying bundle-relative locations first and fixed system prefixes
//! second. Nothing is cached: every call re-probes the filesystem, so
//! permission or quarantine changes made between two calls are always
//! re-observed.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vw_core::EngineConfig;

/// Bundle-relative subdirectories searched in order. The empty entry is the
/// bundle root itself.
const BUNDLE_SUBDIRS: &[&str] = &["", "Executables", "bin", "tools"];

/// The fixed set of tools the engine manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Media downloader (yt-dlp).
    Downloader,
    /// Transcoder (ffmpeg).
    Transcoder,
    /// Media prober (ffprobe).
    Prober,
}

impl ToolKind {
    /// Every managed tool, in fix-pass order.
    pub const ALL: [ToolKind; 3] = [
        ToolKind::Downloader,
        ToolKind::Transcoder,
        ToolKind::Prober,
    ];

    /// File name of the tool's executable.
    pub fn binary_name(&self) -> &'static str {
        match self {
            ToolKind::Downloader => "yt-dlp",
            ToolKind::Transcoder => "ffmpeg",
            ToolKind::Prober => "ffprobe",
        }
    }

    /// Flag used to ask the tool for its version. The downloader follows
    /// GNU conventions; the transcoder and prober use a single dash.
    pub fn version_flag(&self) -> &'static str {
        match self {
            ToolKind::Downloader => "--version",
            ToolKind::Transcoder | ToolKind::Prober => "-version",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Built-in system prefix order: package-manager prefixes first, then the
/// classic system directories.
pub fn default_system_prefixes() -> Vec<PathBuf> {
    ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin", "/bin"]
        .iter()
        .map(PathBuf::from)
        .collect()
}

/// Resolves tool names to executable paths.
///
/// Search configuration is constructor-injected; there is no ambient global
/// state. An explicit per-tool override wins only when the override path
/// exists.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    bundle_dir: PathBuf,
    system_prefixes: Vec<PathBuf>,
    overrides: Vec<(ToolKind, PathBuf)>,
}

impl ToolLocator {
    /// Create a locator for the given bundle directory and prefix order.
    pub fn new(bundle_dir: impl Into<PathBuf>, system_prefixes: Vec<PathBuf>) -> Self {
        Self {
            bundle_dir: bundle_dir.into(),
            system_prefixes,
            overrides: Vec::new(),
        }
    }

    /// Build a locator from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        let prefixes = if config.system_prefixes.is_empty() {
            default_system_prefixes()
        } else {
            config.system_prefixes.clone()
        };

        let mut locator = Self::new(config.effective_bundle_dir(), prefixes);
        let overrides = [
            (ToolKind::Downloader, &config.tools.downloader_path),
            (ToolKind::Transcoder, &config.tools.transcoder_path),
            (ToolKind::Prober, &config.tools.prober_path),
        ];
        for (kind, path) in overrides {
            if let Some(p) = path {
                locator.overrides.push((kind, p.clone()));
            }
        }
        locator
    }

    /// Add an explicit path override for one tool.
    pub fn with_override(mut self, kind: ToolKind, path: impl Into<PathBuf>) -> Self {
        self.overrides.push((kind, path.into()));
        self
    }

    /// Resolve a tool to an existing, executable path.
    ///
    /// Search order: explicit override (when it exists), bundle-relative
    /// subdirectories, then the system prefixes. Returns `None` when no
    /// candidate both exists and carries the execute bit -- absence is a
    /// reportable condition, not a defect, so this never errors.
    pub fn resolve(&self, kind: ToolKind) -> Option<PathBuf> {
        let name = kind.binary_name();

        if let Some(path) = self.override_for(kind) {
            if is_executable(path) {
                tracing::debug!(tool = %kind, path = %path.display(), "resolved via override");
                return Some(path.to_path_buf());
            }
        }

        for subdir in BUNDLE_SUBDIRS {
            let candidate = if subdir.is_empty() {
                self.bundle_dir.join(name)
            } else {
                self.bundle_dir.join(subdir).join(name)
            };
            if is_executable(&candidate) {
                tracing::debug!(tool = %kind, path = %candidate.display(), "resolved in bundle");
                return Some(candidate);
            }
        }

        self.search_prefixes(name).map(|path| {
            tracing::debug!(tool = %kind, path = %path.display(), "resolved in system prefix");
            path
        })
    }

    /// First *existing* candidate for a tool, whether or not it is currently
    /// executable. The permission fix pass uses this to repair binaries that
    /// cannot yet be resolved.
    pub fn locate_candidate(&self, kind: ToolKind) -> Option<PathBuf> {
        let name = kind.binary_name();

        if let Some(path) = self.override_for(kind) {
            if path.is_file() {
                return Some(path.to_path_buf());
            }
        }

        for subdir in BUNDLE_SUBDIRS {
            let candidate = if subdir.is_empty() {
                self.bundle_dir.join(name)
            } else {
                self.bundle_dir.join(subdir).join(name)
            };
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        self.system_prefixes
            .iter()
            .map(|prefix| prefix.join(name))
            .find(|candidate| candidate.is_file())
    }

    fn override_for(&self, kind: ToolKind) -> Option<&Path> {
        self.overrides
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, p)| p.as_path())
    }

    /// Search the configured prefixes, in order, through `which`. The prefix
    /// list is handed to `which_in` as the search path, so the ambient `PATH`
    /// environment variable is never consulted.
    fn search_prefixes(&self, name: &str) -> Option<PathBuf> {
        if self.system_prefixes.is_empty() {
            return None;
        }
        let search_path = std::env::join_paths(&self.system_prefixes).ok()?;
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        which::which_in(name, Some(search_path), cwd).ok()
    }
}

/// Whether the path points at an existing file with the execute bit set.
#[cfg(unix)]
pub(crate) fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub(crate) fn is_executable(path: &Path) -> bool {
    path.is_file()
}
