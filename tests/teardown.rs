mod common;

use anyhow::Result;

use ShadowMount::host::dir::DirOp;
use ShadowMount::host::link_exists;
use ShadowMount::{ShadowError, ShadowService, TeardownStep};

use common::Fixture;

#[test]
fn failed_delete_does_not_stop_remaining_steps() -> Result<()> {
    let fx = Fixture::new("delfail")?;
    let src = fx.source("logs");
    fx.write_live(&src, "a.log", b"x")?;

    let mut s = fx.open()?;
    s.create_shadow_copy(&src)?;
    let id = s.snapshot_id().unwrap().to_string();
    let link = s.link_path().unwrap().to_path_buf();
    let mp = s.mount_point().to_path_buf();

    fx.svc.fail_next(DirOp::Delete);
    let err = s.cleanup().unwrap_err();
    match &err {
        ShadowError::TeardownIncomplete(failures) => {
            assert_eq!(failures.len(), 1, "{err}");
            assert_eq!(failures[0].step, TeardownStep::DeleteSnapshot);
            assert_eq!(failures[0].target, id);
        }
        other => panic!("unexpected error: {other}"),
    }

    // link and mount point are gone, the session forgot the snapshot
    assert!(!link_exists(&link));
    assert!(!mp.exists());
    assert!(!s.is_bound());
    assert!(s.snapshot_id().is_none());

    // the snapshot leaked on the host; a second cleanup does not retry it
    assert_eq!(fx.svc.enumerate()?.len(), 1);
    s.cleanup()?;

    fx.svc.delete(&id)?;
    drop(s);
    fx.cleanup();
    Ok(())
}

#[test]
fn dispose_is_cleanup() -> Result<()> {
    let fx = Fixture::new("dispose")?;
    let src = fx.source("logs");
    fx.write_live(&src, "a.log", b"x")?;

    let mut s = fx.open()?;
    s.create_shadow_copy(&src)?;
    let mp = s.mount_point().to_path_buf();

    s.dispose()?;
    assert!(!s.is_bound());
    assert!(!mp.exists());
    assert!(fx.svc.enumerate()?.is_empty());
    s.dispose()?;

    drop(s);
    fx.cleanup();
    Ok(())
}

#[test]
fn cleanup_without_create_removes_mount_point() -> Result<()> {
    let fx = Fixture::new("nocreate")?;
    let mut s = fx.open()?;
    let mp = s.mount_point().to_path_buf();
    assert!(mp.is_dir());

    s.cleanup()?;
    assert!(!mp.exists());
    s.cleanup()?;

    drop(s);
    fx.cleanup();
    Ok(())
}

#[test]
fn non_empty_mount_point_is_reported_not_deleted() -> Result<()> {
    let fx = Fixture::new("nonempty")?;
    let mut s = fx.open()?;
    let mp = s.mount_point().to_path_buf();
    let stray = mp.join("stray.txt");
    std::fs::write(&stray, b"not ours")?;

    let err = s.cleanup().unwrap_err();
    match &err {
        ShadowError::TeardownIncomplete(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].step, TeardownStep::RemoveMountPoint);
        }
        other => panic!("unexpected error: {other}"),
    }
    // foreign content survives
    assert!(stray.is_file());

    std::fs::remove_file(&stray)?;
    s.cleanup()?;
    assert!(!mp.exists());
    fx.cleanup();
    Ok(())
}
