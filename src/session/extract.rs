//! Scoped extraction helpers: glob filter over one directory level + overwrite copy.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use log::debug;

use crate::error::ShadowError;
use crate::logsink::SessionLog;
use crate::metrics::{record_file_copied, record_file_failed};

/// Compile a file-name glob; case-insensitive on Windows like the host filesystem.
pub(crate) fn compile_pattern(pattern: &str) -> Result<GlobMatcher, ShadowError> {
    GlobBuilder::new(pattern)
        .case_insensitive(cfg!(windows))
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| ShadowError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Regular files directly under `dir` whose name matches, sorted by name.
pub(crate) fn list_matching(dir: &Path, matcher: &GlobMatcher) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if !matcher.is_match(Path::new(&name)) {
            continue;
        }
        let path = entry.path();
        if path.is_file() {
            out.push(path);
        } else {
            debug!("extract: skip non-file match {}", path.display());
        }
    }
    out.sort();
    Ok(out)
}

/// Copy every file into `dest`, overwriting. All files are attempted; the first
/// failure is reported together with the failed/copied counts.
pub(crate) fn copy_all(files: &[PathBuf], dest: &Path, log: &SessionLog) -> Result<usize, ShadowError> {
    let mut copied = 0usize;
    let mut failed = 0usize;
    let mut first_err: Option<(PathBuf, std::io::Error)> = None;

    for src in files {
        let Some(name) = src.file_name() else {
            continue;
        };
        let to = dest.join(name);
        match fs::copy(src, &to) {
            Ok(bytes) => {
                record_file_copied(bytes);
                copied += 1;
                debug!("extract: {} -> {} ({} B)", src.display(), to.display(), bytes);
            }
            Err(e) => {
                record_file_failed();
                failed += 1;
                log.warn(&format!("Failed to copy {}: {}", src.display(), e));
                if first_err.is_none() {
                    first_err = Some((src.clone(), e));
                }
            }
        }
    }

    match first_err {
        None => Ok(copied),
        Some((path, e)) => Err(ShadowError::CopyFailure {
            path,
            failed,
            copied,
            source: e.into(),
        }),
    }
}
