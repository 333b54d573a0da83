//! Host-wide snapshot queries.
//!
//! Эти операции не смотрят на состояние сессии и работают со ВСЕМИ снапшотами хоста,
//! включая чужие (другие сессии, другие процессы, системные точки восстановления).
//! `cleanup_all` - разрушительная операция без фильтра; нужна выборочность -
//! фильтруйте результат `list_all` сами.

use log::debug;
use serde::Serialize;

use crate::error::{Result, ShadowError};
use crate::host::{ShadowRecord, ShadowService};
use crate::logsink::SessionLog;
use crate::metrics::record_fleet_deletion;

/// Counts reported by `cleanup_all`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FleetCleanupSummary {
    /// Snapshots enumerated before deletion.
    pub found: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Snapshots enumerated after deletion; None if that enumeration failed.
    pub remaining: Option<usize>,
}

/// Every snapshot known to the host, in the service's order. Empty is Ok.
pub fn list_all(service: &dyn ShadowService) -> Result<Vec<ShadowRecord>> {
    let l = service
        .enumerate()
        .map_err(|e| ShadowError::query("enumerate", e))?;
    debug!("fleet: {} shadow copies", l.len());
    Ok(l)
}

/// `list_all` plus one log line per snapshot.
pub fn list_all_with_logging(
    service: &dyn ShadowService,
    log: &SessionLog,
) -> Result<Vec<ShadowRecord>> {
    log.step("Listing all shadow copies");
    let l = list_all(service)?;
    if l.is_empty() {
        log.info("No shadow copies found");
        return Ok(l);
    }
    log.info(&format!("Found {} shadow copies", l.len()));
    for r in &l {
        log.info(&describe(r));
    }
    Ok(l)
}

/// Delete every snapshot on the host. Individual delete failures are logged and
/// counted. A failing first enumeration aborts with `ServiceQueryFailure`; a failing
/// final one is logged and leaves `remaining` unknown.
pub fn cleanup_all(service: &dyn ShadowService, log: &SessionLog) -> Result<FleetCleanupSummary> {
    log.step("Deleting ALL shadow copies on this host");
    let before = list_all(service)?;
    let mut summary = FleetCleanupSummary {
        found: before.len(),
        ..Default::default()
    };
    log.info(&format!("Shadow copies before cleanup: {}", summary.found));

    for r in &before {
        match service.delete(&r.id) {
            Ok(()) => {
                record_fleet_deletion();
                summary.deleted += 1;
                log.info(&format!("Deleted shadow copy {}", r.id));
            }
            Err(e) => {
                summary.failed += 1;
                log.warn(&format!("Failed to delete shadow copy {}: {e:#}", r.id));
            }
        }
    }

    match list_all(service) {
        Ok(after) => {
            summary.remaining = Some(after.len());
            log.info(&format!(
                "Shadow copies after cleanup: {} (deleted {}, failed {})",
                after.len(),
                summary.deleted,
                summary.failed
            ));
        }
        Err(e) => log.warn(&format!(
            "Could not count shadow copies after cleanup (deleted {}, failed {}): {e}",
            summary.deleted, summary.failed
        )),
    }
    Ok(summary)
}

/// One-line human description of a record.
pub fn describe(r: &ShadowRecord) -> String {
    format!(
        "{} device={} volume={} created={} client_accessible={}",
        r.id,
        r.device_object,
        r.volume_name,
        r.install_date
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "-".to_string()),
        r.client_accessible
    )
}
