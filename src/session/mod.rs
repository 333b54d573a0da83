//! Snapshot session: one shadow copy, one link, one mount point.
//!
//! Lifecycle:
//!   open (mount point + logging mode)
//!     -> create_shadow_copy (create -> resolve -> bind, all-or-nothing)
//!     -> copy_files_from_shadow_copy* (read-only on the snapshot)
//!     -> cleanup / dispose / Drop (best-effort, idempotent)
//!
//! Teardown order: delete snapshot -> remove link -> remove mount point. A failing
//! step never skips the following ones; the session always ends `Unbound`.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::warn;

use crate::config::ShadowConfig;
use crate::error::{CreationStage, Result, ShadowError, TeardownStep, TeardownStepFailure};
use crate::fleet::{self, FleetCleanupSummary};
use crate::host::volume::{absolutize, same_volume, shadow_path_for, volume_root_of};
use crate::host::{link_exists, Host, LinkBinder, ShadowRecord, ShadowService};
use crate::logsink::{resolve_logging_mode, CapabilityProbe, EnvCapabilityProbe, LoggingMode, SessionLog};
use crate::metrics::{
    record_link_bound, record_link_unbound, record_snapshot_created, record_snapshot_deleted,
    record_teardown_step_failure,
};

mod extract;
mod mount;
mod state;

pub use mount::{mount_dir_name, LINK_NAME, MOUNT_DIR_PREFIX};
pub use state::{BoundSnapshot, SessionState};

use extract::{compile_pattern, copy_all, list_matching};
use mount::allocate_mount_point;

pub struct SnapshotSession {
    mount_root: PathBuf,
    mount_point: PathBuf,
    state: SessionState,
    log: SessionLog,
    default_pattern: String,
    service: Box<dyn ShadowService>,
    binder: Box<dyn LinkBinder>,
}

impl SnapshotSession {
    /// Session against the platform snapshot service; logging mode from config or
    /// CI environment markers.
    pub fn open(cfg: ShadowConfig) -> Result<Self> {
        let host = Host::system(&cfg).map_err(|e| ShadowError::setup(&cfg.mount_root, e))?;
        Self::open_with(cfg, host, &EnvCapabilityProbe)
    }

    /// Session against explicit collaborators.
    pub fn open_with(cfg: ShadowConfig, host: Host, probe: &dyn CapabilityProbe) -> Result<Self> {
        let log = SessionLog::new(resolve_logging_mode(cfg.log_mode, probe));

        let mount_point = allocate_mount_point(&cfg.mount_root, &Local::now())
            .map_err(|e| ShadowError::setup(&cfg.mount_root, e))?;
        log.info(&format!("Mount point created: {}", mount_point.display()));

        Ok(Self {
            mount_root: cfg.mount_root,
            mount_point,
            state: SessionState::Unbound,
            log,
            default_pattern: cfg.default_pattern,
            service: host.service,
            binder: host.binder,
        })
    }

    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_bound(&self) -> bool {
        self.state.is_bound()
    }

    pub fn snapshot_id(&self) -> Option<&str> {
        self.state.snapshot_id()
    }

    pub fn device_path(&self) -> Option<&str> {
        self.state.device_path()
    }

    pub fn link_path(&self) -> Option<&Path> {
        self.state.link_path()
    }

    pub fn logging_mode(&self) -> LoggingMode {
        self.log.mode()
    }

    // ----------------- creation -----------------

    /// Snapshot the volume containing `source` and bind it at `<mount_point>/Volume`.
    ///
    /// On failure the session stays `Unbound`; a snapshot created before the failing
    /// step is deleted again. A session that is already bound releases its previous
    /// snapshot and link first.
    pub fn create_shadow_copy(&mut self, source: impl AsRef<Path>) -> Result<()> {
        let source = source.as_ref();

        if let Some(prev) = self.state.bound() {
            self.log.warn(&format!(
                "Session already holds shadow copy {}; releasing it before creating a new one",
                prev.snapshot_id
            ));
            // failures are logged inside; the old binding is dropped either way
            let _ = self.release_snapshot();
        }

        self.log
            .step(&format!("Creating shadow copy for {}", source.display()));

        let abs = absolutize(source).map_err(|e| ShadowError::creation(CreationStage::Volume, e))?;
        let volume_root =
            volume_root_of(&abs).map_err(|e| ShadowError::creation(CreationStage::Volume, e))?;

        let id = self
            .service
            .create(&volume_root)
            .map_err(|e| ShadowError::creation(CreationStage::Create, e))?;
        record_snapshot_created();
        self.log.info(&format!(
            "Shadow copy {} created for volume {}",
            id,
            volume_root.display()
        ));

        match self.bind_created(&id, volume_root) {
            Ok(bound) => {
                self.state = SessionState::Bound(bound);
                Ok(())
            }
            Err(e) => {
                self.rollback_created(&id);
                Err(e)
            }
        }
    }

    fn bind_created(&self, id: &str, volume_root: PathBuf) -> Result<BoundSnapshot> {
        let record = self
            .service
            .resolve(id)
            .map_err(|e| ShadowError::creation(CreationStage::Resolve, e))?;
        if record.device_object.trim().is_empty() {
            return Err(ShadowError::creation(
                CreationStage::Resolve,
                format!("shadow copy {id} has no device path"),
            ));
        }
        self.log
            .info(&format!("Shadow copy device: {}", record.device_object));

        fs::create_dir_all(&self.mount_point)
            .map_err(|e| ShadowError::creation(CreationStage::Bind, e))?;
        let link_path = self.mount_point.join(LINK_NAME);
        self.binder
            .bind(&record.device_object, &link_path)
            .map_err(|e| ShadowError::creation(CreationStage::Bind, e))?;
        record_link_bound();
        self.log
            .info(&format!("Shadow copy mounted at {}", link_path.display()));

        Ok(BoundSnapshot {
            snapshot_id: id.to_string(),
            device_path: record.device_object,
            link_path,
            volume_root,
        })
    }

    fn rollback_created(&self, id: &str) {
        match self.service.delete(id) {
            Ok(()) => {
                record_snapshot_deleted();
                self.log
                    .warn(&format!("Shadow copy {id} deleted after failed mount"));
            }
            Err(e) => self
                .log
                .error(&format!("Failed to delete shadow copy {id} after failed mount: {e:#}")),
        }
    }

    // ----------------- extraction -----------------

    /// Copy files matching `pattern` from the snapshot's view of `source` (one level,
    /// no recursion) into `dest`. Returns the number of files copied.
    pub fn copy_files_from_shadow_copy(
        &self,
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        pattern: &str,
    ) -> Result<usize> {
        let source = source.as_ref();
        let dest = dest.as_ref();
        let matcher = compile_pattern(pattern)?;

        fs::create_dir_all(dest).map_err(|e| ShadowError::CopyFailure {
            path: dest.to_path_buf(),
            failed: 0,
            copied: 0,
            source: e.into(),
        })?;

        let shadow_dir = self.shadow_path_of(source)?;
        self.log.step(&format!(
            "Copying {} from {} to {}",
            pattern,
            shadow_dir.display(),
            dest.display()
        ));

        let files = list_matching(&shadow_dir, &matcher).map_err(|e| ShadowError::CopyFailure {
            path: shadow_dir.clone(),
            failed: 0,
            copied: 0,
            source: e.into(),
        })?;
        if files.is_empty() {
            self.log
                .info(&format!("No files matching {pattern} in {}", shadow_dir.display()));
            return Ok(0);
        }

        let n = copy_all(&files, dest, &self.log)?;
        self.log
            .info(&format!("Copied {n} file(s) to {}", dest.display()));
        Ok(n)
    }

    /// `copy_files_from_shadow_copy` with the configured default pattern (`*.log`).
    pub fn copy_logs_from_shadow_copy(
        &self,
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
    ) -> Result<usize> {
        self.copy_files_from_shadow_copy(source, dest, &self.default_pattern)
    }

    /// Existing equivalent of `source` under the bound snapshot.
    fn shadow_path_of(&self, source: &Path) -> Result<PathBuf> {
        let missing = |shadow_path: Option<PathBuf>| ShadowError::MissingShadowSource {
            source_path: source.to_path_buf(),
            shadow_path,
        };

        let bound = self.state.bound().ok_or_else(|| missing(None))?;
        let abs = absolutize(source).map_err(|_| missing(None))?;
        let on_volume = volume_root_of(&abs)
            .map(|vr| same_volume(&vr, &bound.volume_root))
            .unwrap_or(false);
        if !on_volume {
            return Err(missing(None));
        }

        let p = shadow_path_for(&bound.link_path, &abs);
        if !p.exists() {
            return Err(missing(Some(p)));
        }
        Ok(p)
    }

    // ----------------- teardown -----------------

    /// Delete the snapshot, remove the link and the mount point.
    ///
    /// Every step is attempted; failures are logged and returned together as
    /// `TeardownIncomplete`. The session is `Unbound` afterwards in all cases, and a
    /// repeated call is a no-op.
    pub fn cleanup(&mut self) -> Result<()> {
        let mut failures = self.release_snapshot();

        if self.mount_point.exists() {
            match fs::remove_dir(&self.mount_point) {
                Ok(()) => self.log.info(&format!(
                    "Mount point removed: {}",
                    self.mount_point.display()
                )),
                Err(e) => failures.push(self.step_failed(
                    TeardownStep::RemoveMountPoint,
                    self.mount_point.display().to_string(),
                    e,
                )),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ShadowError::TeardownIncomplete(failures))
        }
    }

    /// Alias of [`cleanup`](Self::cleanup).
    pub fn dispose(&mut self) -> Result<()> {
        self.cleanup()
    }

    /// Steps 1-2 of teardown; leaves the session `Unbound`.
    fn release_snapshot(&mut self) -> Vec<TeardownStepFailure> {
        let SessionState::Bound(b) = std::mem::take(&mut self.state) else {
            return Vec::new();
        };
        let mut failures = Vec::new();

        self.log
            .step(&format!("Deleting shadow copy {}", b.snapshot_id));
        match self.service.delete(&b.snapshot_id) {
            Ok(()) => {
                record_snapshot_deleted();
                self.log
                    .info(&format!("Shadow copy {} deleted", b.snapshot_id));
            }
            Err(e) => failures.push(self.step_failed(
                TeardownStep::DeleteSnapshot,
                b.snapshot_id.clone(),
                format!("{e:#}"),
            )),
        }

        if link_exists(&b.link_path) {
            match self.binder.unbind(&b.link_path) {
                Ok(()) => {
                    record_link_unbound();
                    self.log
                        .info(&format!("Link removed: {}", b.link_path.display()));
                }
                Err(e) => failures.push(self.step_failed(
                    TeardownStep::Unbind,
                    b.link_path.display().to_string(),
                    format!("{e:#}"),
                )),
            }
        }

        failures
    }

    fn step_failed(&self, step: TeardownStep, target: String, e: impl Display) -> TeardownStepFailure {
        record_teardown_step_failure();
        let f = TeardownStepFailure {
            step,
            target,
            message: e.to_string(),
        };
        self.log.warn(&format!("Teardown step failed: {f}"));
        f
    }

    /// Give up ownership without teardown: the snapshot, link and mount point stay
    /// on the host. Returns the mount point and the bound snapshot, if any.
    pub fn detach(mut self) -> (PathBuf, Option<BoundSnapshot>) {
        let mount_point = std::mem::take(&mut self.mount_point);
        let bound = match std::mem::take(&mut self.state) {
            SessionState::Bound(b) => Some(b),
            SessionState::Unbound => None,
        };
        self.log.warn(&format!(
            "Session detached; {} must be cleaned up manually",
            mount_point.display()
        ));
        (mount_point, bound)
    }

    // ----------------- fleet (host-wide, outside session ownership) -----------------

    pub fn list_all_shadow_copies(&self) -> Result<Vec<ShadowRecord>> {
        fleet::list_all(self.service.as_ref())
    }

    pub fn list_all_shadow_copies_with_logging(&self) -> Result<Vec<ShadowRecord>> {
        fleet::list_all_with_logging(self.service.as_ref(), &self.log)
    }

    /// Deletes every snapshot on the host, including ones this session did not create.
    pub fn cleanup_all_shadow_copies(&self) -> Result<FleetCleanupSummary> {
        fleet::cleanup_all(self.service.as_ref(), &self.log)
    }
}

impl Drop for SnapshotSession {
    fn drop(&mut self) {
        if !self.state.is_bound() && !self.mount_point.exists() {
            return;
        }
        if let Err(e) = self.cleanup() {
            warn!("session drop: {e}");
        }
    }
}
