//! Engine configuration.
//!
//! [`EngineConfig`] is deserialized from JSON. Every field defaults sensibly
//! so a completely empty `{}` file is valid, and a missing file falls back to
//! defaults with a log line rather than an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// Default subprocess watchdog: 24 hours, to handle very long conversions.
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 86_400;

/// Root engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bundle resource directory searched before system prefixes.
    /// `None` means "directory of the running executable, else cwd".
    pub bundle_dir: Option<PathBuf>,

    /// Ordered system installation prefixes searched after the bundle.
    /// An empty list restores the built-in default order.
    #[serde(default)]
    pub system_prefixes: Vec<PathBuf>,

    /// Explicit per-tool path overrides. An override wins only when the
    /// path actually exists.
    pub tools: ToolOverrides,

    /// Maximum subprocess execution time in seconds.
    pub run_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bundle_dir: None,
            system_prefixes: Vec::new(),
            tools: ToolOverrides::default(),
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
        }
    }
}

/// Optional explicit paths for each bundled tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolOverrides {
    pub downloader_path: Option<PathBuf>,
    pub transcoder_path: Option<PathBuf>,
    pub prober_path: Option<PathBuf>,
}

impl EngineConfig {
    /// Deserialize an `EngineConfig` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Resolve the effective bundle directory.
    pub fn effective_bundle_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.bundle_dir {
            return dir.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(ref dir) = self.bundle_dir {
            if !dir.is_dir() {
                warnings.push(format!("bundle_dir {} does not exist", dir.display()));
            }
        }

        for (i, prefix) in self.system_prefixes.iter().enumerate() {
            if prefix.is_relative() {
                warnings.push(format!(
                    "system_prefixes[{i}] {} is relative; search results depend on cwd",
                    prefix.display()
                ));
            }
        }

        if self.run_timeout_secs == 0 {
            warnings.push("run_timeout_secs is 0; subprocesses will be killed immediately".into());
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_valid() {
        let cfg = EngineConfig::from_json("{}").unwrap();
        assert!(cfg.bundle_dir.is_none());
        assert!(cfg.system_prefixes.is_empty());
        assert_eq!(cfg.run_timeout_secs, DEFAULT_RUN_TIMEOUT_SECS);
    }

    #[test]
    fn parse_overrides() {
        let cfg = EngineConfig::from_json(
            r#"{"tools": {"transcoder_path": "/opt/ffmpeg/bin/ffmpeg"}, "run_timeout_secs": 600}"#,
        )
        .unwrap();
        assert_eq!(
            cfg.tools.transcoder_path.as_deref(),
            Some(Path::new("/opt/ffmpeg/bin/ffmpeg"))
        );
        assert_eq!(cfg.run_timeout_secs, 600);
    }

    #[test]
    fn invalid_json_is_a_validation_error() {
        let err = EngineConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let cfg = EngineConfig::load_or_default(Some(Path::new("/nonexistent/vidwall.json")));
        assert!(cfg.bundle_dir.is_none());
    }

    #[test]
    fn validate_flags_zero_timeout() {
        let cfg = EngineConfig {
            run_timeout_secs: 0,
            ..Default::default()
        };
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("run_timeout_secs")));
    }

    #[test]
    fn validate_flags_missing_bundle_dir() {
        let cfg = EngineConfig {
            bundle_dir: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("bundle_dir")));
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = EngineConfig {
            bundle_dir: Some(PathBuf::from("/Applications/Vidwall.app/Contents/Resources")),
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back = EngineConfig::from_json(&json).unwrap();
        assert_eq!(back.bundle_dir, cfg.bundle_dir);
    }
}
