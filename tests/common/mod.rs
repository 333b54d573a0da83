#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use ShadowMount::host::volume::{relative_to_volume, volume_root_of};
use ShadowMount::{
    DirShadowService, FixedCapabilityProbe, Host, LoggingMode, ShadowConfig, SnapshotSession,
    SymlinkBinder,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

// Global lock to serialize tests that mutate ENV.
static TEST_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    TEST_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|p| p.into_inner())
}

pub fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("smtest-{prefix}-{pid}-{t}-{id}"))
}

/// Test host: a directory-backed snapshot service whose "live volume" is `volume`.
///
///   <root>/volume   - live content of the volume containing `<root>`
///   <root>/service  - DirShadowService (registry + frozen snapshots)
///   <root>/mounts   - mount root for sessions
pub struct Fixture {
    pub root: PathBuf,
    pub volume: PathBuf,
    pub mounts: PathBuf,
    pub svc: Arc<DirShadowService>,
}

impl Fixture {
    pub fn new(prefix: &str) -> Result<Self> {
        let root = unique_root(prefix);
        let volume = root.join("volume");
        let mounts = root.join("mounts");
        fs::create_dir_all(&volume)?;

        let svc = Arc::new(DirShadowService::open(&root.join("service"))?);
        svc.map_volume(&volume_root_of(&root)?, &volume);

        Ok(Self {
            root,
            volume,
            mounts,
            svc,
        })
    }

    pub fn config(&self) -> ShadowConfig {
        ShadowConfig::default()
            .with_mount_root(&self.mounts)
            .with_log_mode(Some(LoggingMode::Plain))
    }

    pub fn host(&self) -> Host {
        Host::new(self.svc.clone(), SymlinkBinder)
    }

    pub fn open(&self) -> Result<SnapshotSession> {
        Ok(SnapshotSession::open_with(
            self.config(),
            self.host(),
            &FixedCapabilityProbe(false),
        )?)
    }

    /// Path on the "original volume" (what callers pass as source).
    pub fn source(&self, rel: &str) -> PathBuf {
        self.root.join("live").join(rel)
    }

    /// Where the live content of `source` is stored on disk.
    pub fn live_path(&self, source: &Path) -> PathBuf {
        self.volume.join(relative_to_volume(source))
    }

    /// Write a file under `source` on the live volume.
    pub fn write_live(&self, source: &Path, name: &str, body: &[u8]) -> Result<PathBuf> {
        let dir = self.live_path(source);
        fs::create_dir_all(&dir)?;
        let p = dir.join(name);
        fs::write(&p, body)?;
        Ok(p)
    }

    pub fn cleanup(&self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

pub fn sorted_names(dir: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for e in fs::read_dir(dir)? {
        out.push(e?.file_name().to_string_lossy().into_owned());
    }
    out.sort();
    Ok(out)
}
