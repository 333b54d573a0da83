//! Session trace sink: plain `log` output or CI-highlighted markers.
//!
//! Режим определяется один раз при создании сессии (конфиг или `CapabilityProbe`)
//! и дальше не меняется. Ошибка пробы тихо деградирует до `Plain`.

use std::fmt;

use anyhow::Result;
use log::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// Plain console output through the `log` facade.
    Plain,
    /// CI build log with section/warning/error markers on stdout.
    Highlighted,
}

impl fmt::Display for LoggingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingMode::Plain => f.write_str("plain"),
            LoggingMode::Highlighted => f.write_str("highlighted"),
        }
    }
}

/// Detects whether the calling context provides a highlighted log.
pub trait CapabilityProbe: Send + Sync {
    fn highlighted_logging_available(&self) -> Result<bool>;
}

/// Probe by well-known CI environment markers.
#[derive(Debug, Clone, Default)]
pub struct EnvCapabilityProbe;

const CI_MARKERS: &[&str] = &["TF_BUILD", "GITHUB_ACTIONS", "TEAMCITY_VERSION"];

impl CapabilityProbe for EnvCapabilityProbe {
    fn highlighted_logging_available(&self) -> Result<bool> {
        for name in CI_MARKERS {
            if let Ok(v) = std::env::var(name) {
                let s = v.trim().to_ascii_lowercase();
                if !s.is_empty() && s != "0" && s != "false" {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// Fixed answer (tests, embedding).
#[derive(Debug, Clone)]
pub struct FixedCapabilityProbe(pub bool);

impl CapabilityProbe for FixedCapabilityProbe {
    fn highlighted_logging_available(&self) -> Result<bool> {
        Ok(self.0)
    }
}

/// Resolve the mode: explicit value wins, otherwise ask the probe.
pub fn resolve_logging_mode(
    forced: Option<LoggingMode>,
    probe: &dyn CapabilityProbe,
) -> LoggingMode {
    if let Some(m) = forced {
        return m;
    }
    match probe.highlighted_logging_available() {
        Ok(true) => LoggingMode::Highlighted,
        Ok(false) => LoggingMode::Plain,
        Err(e) => {
            debug!("logging capability probe failed, using plain output: {e:#}");
            LoggingMode::Plain
        }
    }
}

/// Trace writer bound to one logging mode.
#[derive(Debug, Clone, Copy)]
pub struct SessionLog {
    mode: LoggingMode,
}

impl SessionLog {
    pub fn new(mode: LoggingMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> LoggingMode {
        self.mode
    }

    /// Step headline (section in CI logs).
    pub fn step(&self, msg: &str) {
        match self.mode {
            LoggingMode::Plain => info!("{msg}"),
            LoggingMode::Highlighted => {
                println!("##[section]{msg}");
                debug!("{msg}");
            }
        }
    }

    pub fn info(&self, msg: &str) {
        match self.mode {
            LoggingMode::Plain => info!("{msg}"),
            LoggingMode::Highlighted => {
                println!("{msg}");
                debug!("{msg}");
            }
        }
    }

    pub fn warn(&self, msg: &str) {
        match self.mode {
            LoggingMode::Plain => warn!("{msg}"),
            LoggingMode::Highlighted => {
                println!("##[warning]{msg}");
                debug!("{msg}");
            }
        }
    }

    pub fn error(&self, msg: &str) {
        match self.mode {
            LoggingMode::Plain => error!("{msg}"),
            LoggingMode::Highlighted => {
                println!("##[error]{msg}");
                debug!("{msg}");
            }
        }
    }
}
