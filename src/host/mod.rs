//! Host collaborators of a snapshot session.
//!
//! - `ShadowService`: create/resolve/delete/enumerate snapshots of a volume.
//! - `LinkBinder`: expose a snapshot device path as a directory-like link.
//! - volume.rs: volume root resolution and original -> shadow path mapping.
//!
//! Implementations:
//! - cim.rs:  `CimShadowService` (Win32_ShadowCopy through PowerShell, JSON output).
//! - dir.rs:  `DirShadowService` (directory-backed snapshots, tests and dry runs).
//! - link.rs: `SymlinkBinder` (directory symlink on Windows, symlink on Unix).

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::config::ShadowConfig;

pub mod cim;
pub mod dir;
pub mod link;
pub mod volume;

pub use cim::CimShadowService;
pub use dir::DirShadowService;
pub use link::{link_exists, SymlinkBinder};

/// One snapshot as reported by the host service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowRecord {
    /// Opaque snapshot identifier (e.g. "{GUID}").
    pub id: String,
    /// Low-level device path of the snapshot storage.
    pub device_object: String,
    /// Volume the snapshot was taken of.
    pub volume_name: String,
    pub install_date: Option<DateTime<FixedOffset>>,
    pub client_accessible: bool,
}

/// Host snapshot service. Calls are synchronous and may block for a long time
/// (copy-on-write setup happens inside `create`).
pub trait ShadowService: Send + Sync {
    /// Create a snapshot of the volume whose root is `volume_root`; returns its id.
    fn create(&self, volume_root: &Path) -> Result<String>;

    /// Look up one snapshot by id. Unknown id is an error.
    fn resolve(&self, id: &str) -> Result<ShadowRecord>;

    /// Delete one snapshot by id.
    fn delete(&self, id: &str) -> Result<()>;

    /// All snapshots on the host in the service's native order.
    fn enumerate(&self) -> Result<Vec<ShadowRecord>>;
}

impl<T: ShadowService + ?Sized> ShadowService for Arc<T> {
    fn create(&self, volume_root: &Path) -> Result<String> {
        (**self).create(volume_root)
    }
    fn resolve(&self, id: &str) -> Result<ShadowRecord> {
        (**self).resolve(id)
    }
    fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id)
    }
    fn enumerate(&self) -> Result<Vec<ShadowRecord>> {
        (**self).enumerate()
    }
}

/// Filesystem exposure primitive.
pub trait LinkBinder: Send + Sync {
    /// Make `device_path` reachable as the directory `link_path`.
    fn bind(&self, device_path: &str, link_path: &Path) -> Result<()>;

    /// Remove the binding itself (never the content behind it).
    fn unbind(&self, link_path: &Path) -> Result<()>;
}

impl<T: LinkBinder + ?Sized> LinkBinder for Arc<T> {
    fn bind(&self, device_path: &str, link_path: &Path) -> Result<()> {
        (**self).bind(device_path, link_path)
    }
    fn unbind(&self, link_path: &Path) -> Result<()> {
        (**self).unbind(link_path)
    }
}

/// Pair of collaborators a session runs against.
pub struct Host {
    pub service: Box<dyn ShadowService>,
    pub binder: Box<dyn LinkBinder>,
}

impl Host {
    pub fn new(
        service: impl ShadowService + 'static,
        binder: impl LinkBinder + 'static,
    ) -> Self {
        Self {
            service: Box::new(service),
            binder: Box::new(binder),
        }
    }

    /// Platform snapshot service + symlink binder.
    pub fn system(cfg: &ShadowConfig) -> Result<Self> {
        if cfg!(windows) {
            Ok(Self::new(
                CimShadowService::new(cfg.powershell.clone()),
                SymlinkBinder,
            ))
        } else {
            Err(anyhow!(
                "no host snapshot service on this platform (volume shadow copies are Windows-only)"
            ))
        }
    }

    /// Directory-backed service rooted at `root` + symlink binder.
    pub fn directory(root: &Path) -> Result<Self> {
        Ok(Self::new(DirShadowService::open(root)?, SymlinkBinder))
    }
}
