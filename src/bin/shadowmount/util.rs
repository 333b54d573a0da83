use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use ShadowMount::host::volume::{absolutize, volume_root_of};
use ShadowMount::logsink::resolve_logging_mode;
use ShadowMount::metrics;
use ShadowMount::{
    DirShadowService, EnvCapabilityProbe, Host, LoggingMode, SessionLog, ShadowConfig,
    ShadowService, SymlinkBinder,
};

/// Host for the chosen backend. With a directory service, `volume_for` maps the
/// volume of that path onto `volume_dir`.
pub fn open_host(
    cfg: &ShadowConfig,
    dir_service: Option<&Path>,
    volume_for: Option<(&Path, &Path)>,
) -> Result<Host> {
    let Some(root) = dir_service else {
        return Host::system(cfg);
    };
    let svc = DirShadowService::open(root)?;
    if let Some((source, volume_dir)) = volume_for {
        let vr = volume_root_of(&absolutize(source)?)?;
        svc.map_volume(&vr, volume_dir);
    }
    Ok(Host::new(svc, SymlinkBinder))
}

/// Snapshot service only (fleet commands).
pub fn open_service(cfg: &ShadowConfig, dir_service: Option<PathBuf>) -> Result<Box<dyn ShadowService>> {
    Ok(open_host(cfg, dir_service.as_deref(), None)?.service)
}

/// Trace sink for commands that run without a session.
pub fn fleet_log(cfg: &ShadowConfig) -> SessionLog {
    SessionLog::new(resolve_logging_mode(cfg.log_mode, &EnvCapabilityProbe))
}

pub fn parse_log_mode_arg(s: &str) -> Result<Option<LoggingMode>> {
    match s.trim().to_ascii_lowercase().as_str() {
        "plain" => Ok(Some(LoggingMode::Plain)),
        "highlighted" => Ok(Some(LoggingMode::Highlighted)),
        "auto" => Ok(None),
        other => Err(anyhow!("unknown log mode '{other}' (plain|highlighted|auto)")),
    }
}

/// Counters of this process (what the command just did).
pub fn print_metrics() {
    let ms = metrics::snapshot();
    println!("Metrics:");
    println!("  snapshots created/deleted/live = {}/{}/{}", ms.snapshots_created, ms.snapshots_deleted, ms.snapshots_live);
    println!("  links bound/unbound            = {}/{}", ms.links_bound, ms.links_unbound);
    println!(
        "  files copied/failed            = {}/{} ({} B, failure ratio {:.2})",
        ms.files_copied,
        ms.files_failed,
        ms.bytes_copied,
        ms.copy_failure_ratio()
    );
    println!("  teardown step failures         = {}", ms.teardown_step_failures);
    println!("  fleet deletions                = {}", ms.fleet_deletions);
}
