//! Symbolic-link exposure of snapshot device paths.
//!
//! Windows: directory symlink to `\\?\GLOBALROOT\Device\HarddiskVolumeShadowCopyN\`
//! (the trailing separator is required for the device to resolve as a directory).
//! Unix: plain symlink (directory-backed snapshots).

use std::fs;
use std::io;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::debug;

use super::LinkBinder;

#[derive(Debug, Clone, Copy, Default)]
pub struct SymlinkBinder;

/// True if something (link or entry) exists at `path`, without following links.
pub fn link_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

impl LinkBinder for SymlinkBinder {
    fn bind(&self, device_path: &str, link_path: &Path) -> Result<()> {
        if device_path.trim().is_empty() {
            return Err(anyhow!("empty device path"));
        }
        debug!("bind: {} -> {}", link_path.display(), device_path);
        create_dir_link(device_path, link_path).with_context(|| {
            format!("link {} -> {}", link_path.display(), device_path)
        })
    }

    fn unbind(&self, link_path: &Path) -> Result<()> {
        debug!("unbind: {}", link_path.display());
        remove_dir_link(link_path).with_context(|| format!("remove link {}", link_path.display()))
    }
}

#[cfg(windows)]
fn create_dir_link(device_path: &str, link_path: &Path) -> io::Result<()> {
    let mut target = device_path.to_string();
    if !target.ends_with('\\') {
        target.push('\\');
    }
    std::os::windows::fs::symlink_dir(target, link_path)
}

#[cfg(unix)]
fn create_dir_link(device_path: &str, link_path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(device_path, link_path)
}

#[cfg(not(any(unix, windows)))]
fn create_dir_link(_device_path: &str, _link_path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are unsupported on this platform",
    ))
}

// Directory symlinks are removed with RemoveDirectory; the target is untouched.
#[cfg(windows)]
fn remove_dir_link(link_path: &Path) -> io::Result<()> {
    fs::remove_dir(link_path)
}

#[cfg(not(windows))]
fn remove_dir_link(link_path: &Path) -> io::Result<()> {
    fs::remove_file(link_path)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_dir(prefix: &str) -> PathBuf {
        let t = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("shadowmount-link-{prefix}-{}-{t}", std::process::id()))
    }

    #[test]
    fn unbind_removes_link_but_not_target() {
        let root = unique_dir("unbind");
        let target = root.join("device");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("a.log"), b"x").unwrap();

        let link = root.join("Volume");
        SymlinkBinder
            .bind(target.to_str().unwrap(), &link)
            .unwrap();
        assert!(link_exists(&link));
        assert!(link.join("a.log").is_file());

        SymlinkBinder.unbind(&link).unwrap();
        assert!(!link_exists(&link));
        assert!(target.join("a.log").is_file(), "target content must survive");

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn bind_rejects_empty_device_path() {
        let root = unique_dir("empty");
        assert!(SymlinkBinder.bind("  ", &root.join("Volume")).is_err());
    }
}
