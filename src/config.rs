//! Centralized configuration for ShadowMount sessions.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - `ShadowConfig::from_env()` reads the SHADOWMOUNT_* variables once; sessions never
//!   consult the environment afterwards.
//! - Fluent `with_*` setters for callers that configure in code.
//!
//! ENV:
//!   SHADOWMOUNT_ROOT        - mount root directory (default: see `default_mount_root`)
//!   SHADOWMOUNT_LOG_MODE    - plain | highlighted | auto (default auto = probe the host)
//!   SHADOWMOUNT_PATTERN     - default extraction glob (default "*.log")
//!   SHADOWMOUNT_POWERSHELL  - PowerShell executable used by the CIM service

use std::fmt;
use std::path::PathBuf;

use crate::logsink::LoggingMode;

/// Default extraction pattern.
pub const DEFAULT_PATTERN: &str = "*.log";

/// Default PowerShell executable for the CIM-backed snapshot service.
pub const DEFAULT_POWERSHELL: &str = "powershell.exe";

/// Fixed default mount root.
pub fn default_mount_root() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\ShadowCopyMounts")
    } else {
        std::env::temp_dir().join("ShadowCopyMounts")
    }
}

#[derive(Clone, Debug)]
pub struct ShadowConfig {
    /// Base directory for per-session mount points.
    /// Env: SHADOWMOUNT_ROOT
    pub mount_root: PathBuf,

    /// Forced logging mode; None means "probe the host once at construction".
    /// Env: SHADOWMOUNT_LOG_MODE = plain|highlighted|auto
    pub log_mode: Option<LoggingMode>,

    /// Glob used by `copy_logs_from_shadow_copy`.
    /// Env: SHADOWMOUNT_PATTERN
    pub default_pattern: String,

    /// PowerShell executable for `CimShadowService`.
    /// Env: SHADOWMOUNT_POWERSHELL
    pub powershell: String,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            mount_root: default_mount_root(),
            log_mode: None,
            default_pattern: DEFAULT_PATTERN.to_string(),
            powershell: DEFAULT_POWERSHELL.to_string(),
        }
    }
}

impl ShadowConfig {
    /// Load configuration from environment variables on top of defaults.
    /// Unparsable values are ignored (defaults stay).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("SHADOWMOUNT_ROOT") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.mount_root = PathBuf::from(s);
            }
        }

        if let Ok(v) = std::env::var("SHADOWMOUNT_LOG_MODE") {
            if let Some(mode) = parse_log_mode(&v) {
                cfg.log_mode = mode;
            }
        }

        if let Ok(v) = std::env::var("SHADOWMOUNT_PATTERN") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.default_pattern = s.to_string();
            }
        }

        if let Ok(v) = std::env::var("SHADOWMOUNT_POWERSHELL") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.powershell = s.to_string();
            }
        }

        cfg
    }

    pub fn with_mount_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.mount_root = root.into();
        self
    }

    /// Some(mode) forces the mode, None re-enables probing.
    pub fn with_log_mode(mut self, mode: Option<LoggingMode>) -> Self {
        self.log_mode = mode;
        self
    }

    pub fn with_default_pattern<S: Into<String>>(mut self, pattern: S) -> Self {
        self.default_pattern = pattern.into();
        self
    }

    pub fn with_powershell<S: Into<String>>(mut self, exe: S) -> Self {
        self.powershell = exe.into();
        self
    }
}

/// "plain" / "highlighted" -> Some(Some(mode)), "auto" -> Some(None), junk -> None.
fn parse_log_mode(v: &str) -> Option<Option<LoggingMode>> {
    match v.trim().to_ascii_lowercase().as_str() {
        "plain" | "console" => Some(Some(LoggingMode::Plain)),
        "highlighted" | "ci" => Some(Some(LoggingMode::Highlighted)),
        "auto" | "" => Some(None),
        _ => None,
    }
}

impl fmt::Display for ShadowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ShadowConfig {{ \
             mount_root: {}, \
             log_mode: {}, \
             default_pattern: {}, \
             powershell: {} \
             }}",
            self.mount_root.display(),
            self.log_mode
                .map(|m| m.to_string())
                .unwrap_or_else(|| "auto".to_string()),
            self.default_pattern,
            self.powershell,
        )
    }
}
