//! Directory-backed snapshot service.
//!
//! Снапшот - полная копия каталога, сопоставленного тому (`map_volume`), сделанная
//! в момент `create`. Удобно для тестов и dry-run на хостах без VSS.
//!
//! Layout under the service root:
//!   registry.json          - {"next_index":N,"entries":[{"index":..,"record":{..}}]}
//!   snapshots/<index>/      - frozen content; its path is the record's device_object
//!
//! Registry writes are atomic (tmp + rename).

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use log::debug;
use serde::{Deserialize, Serialize};

use super::volume::same_volume;
use super::{ShadowRecord, ShadowService};

/// Operation selector for `fail_next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirOp {
    Create,
    Resolve,
    Delete,
    Enumerate,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Registry {
    next_index: u64,
    entries: Vec<RegEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegEntry {
    index: u64,
    record: ShadowRecord,
}

pub struct DirShadowService {
    root: PathBuf,
    volumes: Mutex<Vec<(PathBuf, PathBuf)>>,
    failing: Mutex<HashSet<DirOp>>,
    // serializes registry read-modify-write within the process
    registry_lock: Mutex<()>,
}

impl DirShadowService {
    /// Open (or create) a service rooted at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join("snapshots"))
            .with_context(|| format!("create {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
            volumes: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            registry_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Declare `backing_dir` as the live content of the volume `volume_root`.
    pub fn map_volume(&self, volume_root: &Path, backing_dir: &Path) {
        let mut v = self.volumes.lock().unwrap_or_else(|p| p.into_inner());
        v.retain(|(vr, _)| !same_volume(vr, volume_root));
        v.push((volume_root.to_path_buf(), backing_dir.to_path_buf()));
    }

    /// Make the next call of `op` fail once.
    pub fn fail_next(&self, op: DirOp) {
        self.failing
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(op);
    }

    fn take_failure(&self, op: DirOp) -> Result<()> {
        let hit = self
            .failing
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&op);
        if hit {
            return Err(anyhow!("injected {:?} failure", op));
        }
        Ok(())
    }

    fn backing_for(&self, volume_root: &Path) -> Option<PathBuf> {
        let v = self.volumes.lock().unwrap_or_else(|p| p.into_inner());
        v.iter()
            .find(|(vr, _)| same_volume(vr, volume_root))
            .map(|(_, b)| b.clone())
    }

    fn registry_path(&self) -> PathBuf {
        self.root.join("registry.json")
    }

    fn registry_load(&self) -> Result<Registry> {
        let p = self.registry_path();
        if !p.exists() {
            return Ok(Registry::default());
        }
        let bytes = fs::read(&p).with_context(|| format!("read {}", p.display()))?;
        let reg: Registry = serde_json::from_slice(&bytes).context("parse registry.json")?;
        Ok(reg)
    }

    fn registry_save(&self, reg: &Registry) -> Result<()> {
        let path = self.registry_path();
        let tmp = self.root.join("registry.json.tmp");

        let mut f = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .with_context(|| format!("open {}", tmp.display()))?;

        let data = serde_json::to_vec_pretty(reg).context("serialize registry.json")?;
        f.write_all(&data)?;
        let _ = f.sync_all();

        fs::rename(&tmp, &path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
        Ok(())
    }
}

impl ShadowService for DirShadowService {
    fn create(&self, volume_root: &Path) -> Result<String> {
        self.take_failure(DirOp::Create)?;
        let backing = self
            .backing_for(volume_root)
            .ok_or_else(|| anyhow!("specified volume not found: {}", volume_root.display()))?;

        let _g = self.registry_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut reg = self.registry_load()?;
        reg.next_index += 1;
        let index = reg.next_index;

        let snap_dir = self.root.join("snapshots").join(index.to_string());
        // остатки неудачного create с тем же индексом
        if snap_dir.exists() {
            fs::remove_dir_all(&snap_dir)
                .with_context(|| format!("remove stale {}", snap_dir.display()))?;
        }
        // the service root may live inside the volume it snapshots
        let skip = fs::canonicalize(&self.root).ok();
        if let Err(e) = copy_tree(&backing, &snap_dir, skip.as_deref()) {
            let _ = fs::remove_dir_all(&snap_dir);
            return Err(e).with_context(|| {
                format!("freeze {} into {}", backing.display(), snap_dir.display())
            });
        }

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let id = format!(
            "{{{:08X}-5348-4144-4F57-{:012X}}}",
            index,
            nanos & 0xFFFF_FFFF_FFFF
        );

        reg.entries.push(RegEntry {
            index,
            record: ShadowRecord {
                id: id.clone(),
                device_object: snap_dir.to_string_lossy().into_owned(),
                volume_name: volume_root.to_string_lossy().into_owned(),
                install_date: Some(Local::now().fixed_offset()),
                client_accessible: true,
            },
        });
        if let Err(e) = self.registry_save(&reg) {
            let _ = fs::remove_dir_all(&snap_dir);
            return Err(e);
        }
        debug!("dir-service: created {} at {}", id, snap_dir.display());
        Ok(id)
    }

    fn resolve(&self, id: &str) -> Result<ShadowRecord> {
        self.take_failure(DirOp::Resolve)?;
        let _g = self.registry_lock.lock().unwrap_or_else(|p| p.into_inner());
        let reg = self.registry_load()?;
        reg.entries
            .into_iter()
            .find(|e| e.record.id == id)
            .map(|e| e.record)
            .ok_or_else(|| anyhow!("shadow copy {id} not found"))
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.take_failure(DirOp::Delete)?;
        let _g = self.registry_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut reg = self.registry_load()?;
        let pos = reg
            .entries
            .iter()
            .position(|e| e.record.id == id)
            .ok_or_else(|| anyhow!("shadow copy {id} not found"))?;
        let entry = reg.entries.remove(pos);
        self.registry_save(&reg)?;

        let snap_dir = PathBuf::from(&entry.record.device_object);
        if snap_dir.exists() {
            fs::remove_dir_all(&snap_dir)
                .with_context(|| format!("remove {}", snap_dir.display()))?;
        }
        debug!("dir-service: deleted {}", id);
        Ok(())
    }

    fn enumerate(&self) -> Result<Vec<ShadowRecord>> {
        self.take_failure(DirOp::Enumerate)?;
        let _g = self.registry_lock.lock().unwrap_or_else(|p| p.into_inner());
        let reg = self.registry_load()?;
        Ok(reg.entries.into_iter().map(|e| e.record).collect())
    }
}

/// Recursive copy of regular files and directories (symlinks are skipped).
/// `skip` is a canonical directory path left out of the copy.
fn copy_tree(src: &Path, dst: &Path, skip: Option<&Path>) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("create {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("read_dir {}", src.display()))? {
        let entry = entry?;
        let ft = entry.file_type()?;
        let to = dst.join(entry.file_name());
        if ft.is_dir() {
            if let Some(skip) = skip {
                if fs::canonicalize(entry.path()).is_ok_and(|p| p == skip) {
                    debug!("dir-service: skip service root {}", entry.path().display());
                    continue;
                }
            }
            copy_tree(&entry.path(), &to, skip)?;
        } else if ft.is_file() {
            fs::copy(entry.path(), &to)
                .with_context(|| format!("copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_dir(prefix: &str) -> PathBuf {
        let t = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "shadowmount-dirsvc-{prefix}-{}-{t}",
            std::process::id()
        ))
    }

    #[test]
    fn snapshot_is_frozen_at_create_time() -> Result<()> {
        let root = unique_dir("frozen");
        let live = root.join("live");
        fs::create_dir_all(live.join("sub"))?;
        fs::write(live.join("sub/app.log"), b"before")?;

        let svc = DirShadowService::open(&root.join("svc"))?;
        svc.map_volume(Path::new("/"), &live);

        let id = svc.create(Path::new("/"))?;
        fs::write(live.join("sub/app.log"), b"after")?;

        let rec = svc.resolve(&id)?;
        let frozen = fs::read(Path::new(&rec.device_object).join("sub/app.log"))?;
        assert_eq!(frozen, b"before");
        assert!(rec.client_accessible);
        assert_eq!(svc.enumerate()?.len(), 1);

        svc.delete(&id)?;
        assert!(svc.enumerate()?.is_empty());
        assert!(!Path::new(&rec.device_object).exists());
        assert!(svc.resolve(&id).is_err());

        fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn unknown_volume_and_injected_failures() -> Result<()> {
        let root = unique_dir("fail");
        let svc = DirShadowService::open(&root)?;
        assert!(svc.create(Path::new("/")).is_err());

        svc.fail_next(DirOp::Enumerate);
        assert!(svc.enumerate().is_err());
        assert!(svc.enumerate()?.is_empty(), "failure fires only once");

        fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn service_root_inside_volume_is_not_copied() -> Result<()> {
        let root = unique_dir("nested");
        fs::create_dir_all(&root)?;
        fs::write(root.join("app.log"), b"x")?;

        // сервис живёт внутри каталога тома
        let svc = DirShadowService::open(&root.join("svc"))?;
        svc.map_volume(Path::new("/"), &root);

        let id = svc.create(Path::new("/"))?;
        let dev = PathBuf::from(svc.resolve(&id)?.device_object);
        assert_eq!(fs::read(dev.join("app.log"))?, b"x");
        assert!(!dev.join("svc").exists(), "service root must be skipped");

        fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn failed_freeze_leaves_no_partial_snapshot() -> Result<()> {
        let root = unique_dir("partial");
        let live = root.join("live");
        let svc = DirShadowService::open(&root.join("svc"))?;

        // backing dir does not exist yet -> read_dir fails after the target was created
        svc.map_volume(Path::new("/"), &live);
        assert!(svc.create(Path::new("/")).is_err());
        assert!(!svc.root().join("snapshots").join("1").exists());
        assert!(svc.enumerate()?.is_empty());

        // leftover from a crashed create under the index that will be reused
        let stale = svc.root().join("snapshots").join("1");
        fs::create_dir_all(&stale)?;
        fs::write(stale.join("stale.log"), b"old")?;

        fs::create_dir_all(&live)?;
        fs::write(live.join("fresh.log"), b"new")?;
        let id = svc.create(Path::new("/"))?;
        let dev = PathBuf::from(svc.resolve(&id)?.device_object);
        assert_eq!(dev, stale);
        assert!(dev.join("fresh.log").is_file());
        assert!(!dev.join("stale.log").exists(), "stale content must not leak in");

        fs::remove_dir_all(&root)?;
        Ok(())
    }
}
