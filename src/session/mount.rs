//! Mount root / mount point allocation.
//!
//! Имя каталога: `ShadowCopy_<yyyyMMdd_HHmmss>` (локальное время). Если две сессии
//! стартуют в одну секунду, вторая получает `ShadowCopy_<ts>_1`, `_2`, ...
//! Выбор имени и create_dir выполняются под локом mount root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use log::debug;

use crate::lock::lock_mount_root;

pub const MOUNT_DIR_PREFIX: &str = "ShadowCopy_";
pub const LINK_NAME: &str = "Volume";

const MAX_SUFFIX: u32 = 10_000;

pub fn mount_dir_name(ts: &DateTime<Local>) -> String {
    format!("{}{}", MOUNT_DIR_PREFIX, ts.format("%Y%m%d_%H%M%S"))
}

/// Ensure `mount_root` exists and create a fresh mount point inside it.
pub fn allocate_mount_point(mount_root: &Path, now: &DateTime<Local>) -> Result<PathBuf> {
    fs::create_dir_all(mount_root)
        .with_context(|| format!("create mount root {}", mount_root.display()))?;

    let _lock = lock_mount_root(mount_root)?;
    let base = mount_dir_name(now);

    for n in 0..=MAX_SUFFIX {
        let name = if n == 0 {
            base.clone()
        } else {
            format!("{base}_{n}")
        };
        let candidate = mount_root.join(&name);
        match fs::create_dir(&candidate) {
            Ok(()) => {
                debug!("mount point allocated: {}", candidate.display());
                return Ok(candidate);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("create mount point {}", candidate.display()))
            }
        }
    }
    Err(anyhow!(
        "no free mount point name for {} under {}",
        base,
        mount_root.display()
    ))
}
