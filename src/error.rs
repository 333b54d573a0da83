//! Session error model.
//!
//! Коллабораторы (service/binder/probe) возвращают `anyhow::Result`;
//! сессия переводит их ошибки в `ShadowError`, чтобы вызывающий код мог
//! различать стадии (setup / creation / extraction / teardown / fleet).

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, ShadowError>;

/// Stage of `create_shadow_copy` that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationStage {
    Volume,
    Create,
    Resolve,
    Bind,
}

impl fmt::Display for CreationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CreationStage::Volume => "resolve volume",
            CreationStage::Create => "create snapshot",
            CreationStage::Resolve => "resolve device path",
            CreationStage::Bind => "bind link",
        };
        f.write_str(s)
    }
}

/// One teardown step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    DeleteSnapshot,
    Unbind,
    RemoveMountPoint,
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TeardownStep::DeleteSnapshot => "delete snapshot",
            TeardownStep::Unbind => "remove link",
            TeardownStep::RemoveMountPoint => "remove mount point",
        };
        f.write_str(s)
    }
}

/// A failed teardown step; the remaining steps still ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownStepFailure {
    pub step: TeardownStep,
    /// Snapshot id or path the step acted on.
    pub target: String,
    pub message: String,
}

impl fmt::Display for TeardownStepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.step, self.target, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ShadowError {
    #[error("setup failed at {}: {source}", .path.display())]
    SetupFailure {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("shadow copy creation failed ({stage}): {source}")]
    CreationFailure {
        stage: CreationStage,
        #[source]
        source: BoxError,
    },

    #[error(
        "shadow source missing: {} (expected at {})",
        .source_path.display(),
        display_shadow_path(.shadow_path)
    )]
    MissingShadowSource {
        source_path: PathBuf,
        shadow_path: Option<PathBuf>,
    },

    #[error("invalid file pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("copy failed for {} ({failed} failed, {copied} copied): {source}", .path.display())]
    CopyFailure {
        path: PathBuf,
        failed: usize,
        copied: usize,
        #[source]
        source: BoxError,
    },

    #[error("teardown incomplete: {}", join_failures(.0))]
    TeardownIncomplete(Vec<TeardownStepFailure>),

    #[error("snapshot service query failed ({op}): {source}")]
    ServiceQueryFailure {
        op: &'static str,
        #[source]
        source: BoxError,
    },
}

impl ShadowError {
    pub(crate) fn setup(path: impl Into<PathBuf>, e: impl Into<BoxError>) -> Self {
        ShadowError::SetupFailure {
            path: path.into(),
            source: e.into(),
        }
    }

    pub(crate) fn creation(stage: CreationStage, e: impl Into<BoxError>) -> Self {
        ShadowError::CreationFailure {
            stage,
            source: e.into(),
        }
    }

    pub(crate) fn query(op: &'static str, e: impl Into<BoxError>) -> Self {
        ShadowError::ServiceQueryFailure {
            op,
            source: e.into(),
        }
    }
}

fn display_shadow_path(p: &Option<PathBuf>) -> String {
    match p {
        Some(p) => p.display().to_string(),
        None => "<not mapped to a bound snapshot>".to_string(),
    }
}

fn join_failures(l: &[TeardownStepFailure]) -> String {
    l.iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
