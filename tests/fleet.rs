mod common;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use ShadowMount::fleet;
use ShadowMount::host::dir::DirOp;
use ShadowMount::{
    DirShadowService, FleetCleanupSummary, LoggingMode, SessionLog, ShadowError, ShadowRecord,
    ShadowService,
};

use common::Fixture;

#[test]
fn empty_host_lists_nothing() -> Result<()> {
    let fx = Fixture::new("fleet-empty")?;
    let s = fx.open()?;
    assert!(s.list_all_shadow_copies()?.is_empty());
    assert!(s.list_all_shadow_copies_with_logging()?.is_empty());

    let sum = s.cleanup_all_shadow_copies()?;
    assert_eq!(
        sum,
        FleetCleanupSummary {
            remaining: Some(0),
            ..Default::default()
        }
    );
    drop(s);
    fx.cleanup();
    Ok(())
}

#[test]
fn list_includes_snapshots_of_other_sessions() -> Result<()> {
    let fx = Fixture::new("fleet-list")?;
    let src = fx.source("logs");
    fx.write_live(&src, "a.log", b"x")?;

    let mut a = fx.open()?;
    let mut b = fx.open()?;
    a.create_shadow_copy(&src)?;
    b.create_shadow_copy(&src)?;

    let observer = fx.open()?;
    let ids: Vec<String> = observer
        .list_all_shadow_copies()?
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().any(|i| i == a.snapshot_id().unwrap()));
    assert!(ids.iter().any(|i| i == b.snapshot_id().unwrap()));
    // host order (creation order for the directory service)
    assert_eq!(ids[0], a.snapshot_id().unwrap());

    a.cleanup()?;
    b.cleanup()?;
    drop(observer);
    fx.cleanup();
    Ok(())
}

#[test]
fn cleanup_all_deletes_foreign_snapshots() -> Result<()> {
    let fx = Fixture::new("fleet-del")?;
    let src = fx.source("logs");
    fx.write_live(&src, "a.log", b"x")?;

    let mut owner = fx.open()?;
    owner.create_shadow_copy(&src)?;
    // one more created directly on the host, outside any session
    fx.svc.create(&ShadowMount::host::volume::volume_root_of(&src)?)?;

    let janitor = fx.open()?;
    let sum = janitor.cleanup_all_shadow_copies()?;
    assert_eq!(
        sum,
        FleetCleanupSummary {
            found: 2,
            deleted: 2,
            failed: 0,
            remaining: Some(0)
        }
    );
    assert!(fx.svc.enumerate()?.is_empty());

    // the owner's snapshot is gone underneath it: its delete step now fails,
    // link and mount point are still removed
    assert!(owner.is_bound());
    let err = owner.cleanup().unwrap_err();
    assert!(matches!(err, ShadowError::TeardownIncomplete(_)), "got {err}");
    assert!(!owner.is_bound());
    assert!(!owner.mount_point().exists());

    drop(janitor);
    fx.cleanup();
    Ok(())
}

#[test]
fn cleanup_all_counts_individual_failures() -> Result<()> {
    let fx = Fixture::new("fleet-partial")?;
    let vr = ShadowMount::host::volume::volume_root_of(&fx.root)?;
    fx.svc.create(&vr)?;
    fx.svc.create(&vr)?;

    fx.svc.fail_next(DirOp::Delete);
    let log = SessionLog::new(LoggingMode::Plain);
    let sum = fleet::cleanup_all(&*fx.svc, &log)?;
    assert_eq!(sum.found, 2);
    assert_eq!(sum.deleted, 1);
    assert_eq!(sum.failed, 1);
    assert_eq!(sum.remaining, Some(1));

    fx.cleanup();
    Ok(())
}

#[test]
fn enumerate_failure_is_a_query_failure() -> Result<()> {
    let fx = Fixture::new("fleet-query")?;
    let s = fx.open()?;

    fx.svc.fail_next(DirOp::Enumerate);
    let err = s.list_all_shadow_copies().unwrap_err();
    assert!(
        matches!(err, ShadowError::ServiceQueryFailure { op: "enumerate", .. }),
        "got {err}"
    );

    fx.svc.fail_next(DirOp::Enumerate);
    let err = s.cleanup_all_shadow_copies().unwrap_err();
    assert!(matches!(err, ShadowError::ServiceQueryFailure { .. }), "got {err}");

    drop(s);
    fx.cleanup();
    Ok(())
}

#[test]
fn describe_mentions_id_and_device() -> Result<()> {
    let fx = Fixture::new("fleet-describe")?;
    let vr = ShadowMount::host::volume::volume_root_of(&fx.root)?;
    let id = fx.svc.create(&vr)?;
    let rec = fx.svc.resolve(&id)?;

    let line = fleet::describe(&rec);
    assert!(line.contains(&id));
    assert!(line.contains(&rec.device_object));

    fx.cleanup();
    Ok(())
}

/// Host whose enumeration works only for the first `ok_lists` calls.
struct FlakyListing {
    inner: Arc<DirShadowService>,
    ok_lists: usize,
    lists: AtomicUsize,
}

impl ShadowService for FlakyListing {
    fn create(&self, volume_root: &Path) -> Result<String> {
        self.inner.create(volume_root)
    }
    fn resolve(&self, id: &str) -> Result<ShadowRecord> {
        self.inner.resolve(id)
    }
    fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id)
    }
    fn enumerate(&self) -> Result<Vec<ShadowRecord>> {
        if self.lists.fetch_add(1, Ordering::Relaxed) >= self.ok_lists {
            return Err(anyhow!("enumeration unavailable"));
        }
        self.inner.enumerate()
    }
}

#[test]
fn cleanup_all_keeps_counts_when_final_listing_fails() -> Result<()> {
    let fx = Fixture::new("fleet-recount")?;
    let vr = ShadowMount::host::volume::volume_root_of(&fx.root)?;
    fx.svc.create(&vr)?;
    fx.svc.create(&vr)?;

    let flaky = FlakyListing {
        inner: fx.svc.clone(),
        ok_lists: 1,
        lists: AtomicUsize::new(0),
    };
    let log = SessionLog::new(LoggingMode::Plain);
    let sum = fleet::cleanup_all(&flaky, &log)?;
    assert_eq!(
        sum,
        FleetCleanupSummary {
            found: 2,
            deleted: 2,
            failed: 0,
            remaining: None
        }
    );
    assert!(fx.svc.enumerate()?.is_empty());

    fx.cleanup();
    Ok(())
}
