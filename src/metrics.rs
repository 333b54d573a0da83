//! Lightweight global metrics for ShadowMount.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - Snapshots (create/delete, live per process)
//! - Links (bind/unbind)
//! - Extraction (files copied / failed, bytes)
//! - Teardown (step failures)
//! - Fleet (bulk deletions)

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// ----- Snapshots -----
static SNAPSHOTS_CREATED: AtomicU64 = AtomicU64::new(0);
static SNAPSHOTS_DELETED: AtomicU64 = AtomicU64::new(0);
static SNAPSHOTS_LIVE: AtomicU64 = AtomicU64::new(0);

// ----- Links -----
static LINKS_BOUND: AtomicU64 = AtomicU64::new(0);
static LINKS_UNBOUND: AtomicU64 = AtomicU64::new(0);

// ----- Extraction -----
static FILES_COPIED: AtomicU64 = AtomicU64::new(0);
static FILES_FAILED: AtomicU64 = AtomicU64::new(0);
static BYTES_COPIED: AtomicU64 = AtomicU64::new(0);

// ----- Teardown -----
static TEARDOWN_STEP_FAILURES: AtomicU64 = AtomicU64::new(0);

// ----- Fleet -----
static FLEET_DELETIONS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    // Snapshots
    pub snapshots_created: u64,
    pub snapshots_deleted: u64,
    pub snapshots_live: u64,

    // Links
    pub links_bound: u64,
    pub links_unbound: u64,

    // Extraction
    pub files_copied: u64,
    pub files_failed: u64,
    pub bytes_copied: u64,

    // Teardown
    pub teardown_step_failures: u64,

    // Fleet
    pub fleet_deletions: u64,
}

impl MetricsSnapshot {
    pub fn copy_failure_ratio(&self) -> f64 {
        let total = self.files_copied + self.files_failed;
        if total == 0 {
            0.0
        } else {
            self.files_failed as f64 / total as f64
        }
    }
}

// ----- Recorders (Snapshots) -----
pub fn record_snapshot_created() {
    SNAPSHOTS_CREATED.fetch_add(1, Ordering::Relaxed);
    SNAPSHOTS_LIVE.fetch_add(1, Ordering::Relaxed);
}

pub fn record_snapshot_deleted() {
    SNAPSHOTS_DELETED.fetch_add(1, Ordering::Relaxed);
    SNAPSHOTS_LIVE
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)))
        .ok();
}

// ----- Recorders (Links) -----
pub fn record_link_bound() {
    LINKS_BOUND.fetch_add(1, Ordering::Relaxed);
}

pub fn record_link_unbound() {
    LINKS_UNBOUND.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Extraction) -----
pub fn record_file_copied(bytes: u64) {
    FILES_COPIED.fetch_add(1, Ordering::Relaxed);
    BYTES_COPIED.fetch_add(bytes, Ordering::Relaxed);
}

pub fn record_file_failed() {
    FILES_FAILED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Teardown / Fleet) -----
pub fn record_teardown_step_failure() {
    TEARDOWN_STEP_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_fleet_deletion() {
    FLEET_DELETIONS.fetch_add(1, Ordering::Relaxed);
    SNAPSHOTS_LIVE
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)))
        .ok();
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        snapshots_created: SNAPSHOTS_CREATED.load(Ordering::Relaxed),
        snapshots_deleted: SNAPSHOTS_DELETED.load(Ordering::Relaxed),
        snapshots_live: SNAPSHOTS_LIVE.load(Ordering::Relaxed),

        links_bound: LINKS_BOUND.load(Ordering::Relaxed),
        links_unbound: LINKS_UNBOUND.load(Ordering::Relaxed),

        files_copied: FILES_COPIED.load(Ordering::Relaxed),
        files_failed: FILES_FAILED.load(Ordering::Relaxed),
        bytes_copied: BYTES_COPIED.load(Ordering::Relaxed),

        teardown_step_failures: TEARDOWN_STEP_FAILURES.load(Ordering::Relaxed),

        fleet_deletions: FLEET_DELETIONS.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    SNAPSHOTS_CREATED.store(0, Ordering::Relaxed);
    SNAPSHOTS_DELETED.store(0, Ordering::Relaxed);
    SNAPSHOTS_LIVE.store(0, Ordering::Relaxed);

    LINKS_BOUND.store(0, Ordering::Relaxed);
    LINKS_UNBOUND.store(0, Ordering::Relaxed);

    FILES_COPIED.store(0, Ordering::Relaxed);
    FILES_FAILED.store(0, Ordering::Relaxed);
    BYTES_COPIED.store(0, Ordering::Relaxed);

    TEARDOWN_STEP_FAILURES.store(0, Ordering::Relaxed);

    FLEET_DELETIONS.store(0, Ordering::Relaxed);
}
