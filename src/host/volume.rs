//! Volume roots and original -> shadow path mapping (lexical, no I/O).
//!
//! `C:\Data\Logs` -> volume root `C:\`, remainder `Data\Logs`.
//! `/var/log/app` -> volume root `/`,   remainder `var/log/app`.

use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context, Result};

/// Join relative paths onto the current directory.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("current_dir")?;
    Ok(cwd.join(path))
}

/// Root of the volume containing `path` (prefix + root dir).
pub fn volume_root_of(path: &Path) -> Result<PathBuf> {
    let mut root = PathBuf::new();
    for c in path.components() {
        match c {
            Component::Prefix(p) => root.push(p.as_os_str()),
            Component::RootDir => {
                root.push(c.as_os_str());
                return Ok(root);
            }
            _ => break,
        }
    }
    Err(anyhow!("path has no volume root: {}", path.display()))
}

/// Path of `path` below its volume root, with `.`/`..` folded lexically.
pub fn relative_to_volume(path: &Path) -> PathBuf {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for c in path.components() {
        match c {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(s) => parts.push(s),
        }
    }
    parts.iter().collect()
}

/// Volume roots compare case-insensitively on Windows (`c:\` == `C:\`).
pub fn same_volume(a: &Path, b: &Path) -> bool {
    if cfg!(windows) {
        a.to_string_lossy()
            .eq_ignore_ascii_case(&b.to_string_lossy())
    } else {
        a == b
    }
}

/// Equivalent of `source` under a link that exposes its volume.
pub fn shadow_path_for(link_path: &Path, source: &Path) -> PathBuf {
    link_path.join(relative_to_volume(source))
}
