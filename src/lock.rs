//! Mount-root lock for mount-point allocation.
//!
//! Cross-platform (fs2) advisory lock on `<mount_root>/.shadowmount.lock`.
//! Сессии на одном хосте делят mount root; выбор имени `ShadowCopy_<ts>` и
//! создание каталога выполняются под этим локом. Lock is released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub const LOCK_FILE_NAME: &str = ".shadowmount.lock";

pub struct MountRootLock {
    file: std::fs::File,
}

impl Drop for MountRootLock {
    fn drop(&mut self) {
        // unlock errors on drop are ignored
        let _ = self.file.unlock();
    }
}

fn lock_file_path(root: &Path) -> PathBuf {
    root.join(LOCK_FILE_NAME)
}

/// Acquire the exclusive allocation lock. Blocks until acquired.
pub fn lock_mount_root(root: &Path) -> Result<MountRootLock> {
    let path = lock_file_path(root);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    file.lock_exclusive()
        .with_context(|| format!("lock_exclusive {}", path.display()))?;
    Ok(MountRootLock { file })
}
