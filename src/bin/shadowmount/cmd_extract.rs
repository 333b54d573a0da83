use anyhow::{anyhow, Context, Result};
use log::warn;
use std::path::PathBuf;

use ShadowMount::{EnvCapabilityProbe, ShadowConfig, SnapshotSession};

use super::util::{open_host, parse_log_mode_arg, print_metrics};

pub struct ExtractArgs {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub pattern: Option<String>,
    pub mount_root: Option<PathBuf>,
    pub log_mode: Option<String>,
    pub dir_service: Option<PathBuf>,
    pub volume_dir: Option<PathBuf>,
    pub keep: bool,
    pub metrics: bool,
}

/// Полный цикл: open -> create -> copy -> cleanup (cleanup пропускается при --keep).
pub fn exec(args: ExtractArgs) -> Result<()> {
    let mut cfg = ShadowConfig::from_env();
    if let Some(root) = args.mount_root {
        cfg = cfg.with_mount_root(root);
    }
    if let Some(m) = args.log_mode.as_deref() {
        cfg = cfg.with_log_mode(parse_log_mode_arg(m)?);
    }
    if args.volume_dir.is_some() && args.dir_service.is_none() {
        return Err(anyhow!("--volume-dir requires --dir-service"));
    }
    let pattern = args.pattern.unwrap_or_else(|| cfg.default_pattern.clone());

    let volume_for = args
        .volume_dir
        .as_deref()
        .map(|v| (args.source.as_path(), v));
    let host = open_host(&cfg, args.dir_service.as_deref(), volume_for)?;

    let mut session = SnapshotSession::open_with(cfg, host, &EnvCapabilityProbe)
        .context("open shadow copy session")?;

    let copied = session
        .create_shadow_copy(&args.source)
        .map_err(anyhow::Error::from)
        .and_then(|()| {
            session
                .copy_files_from_shadow_copy(&args.source, &args.dest, &pattern)
                .map_err(anyhow::Error::from)
        });

    if args.keep {
        let (mount_point, bound) = session.detach();
        println!(
            "extract: kept mount point {} (snapshot {})",
            mount_point.display(),
            bound.as_ref().map(|b| b.snapshot_id.as_str()).unwrap_or("-")
        );
    } else if let Err(e) = session.cleanup() {
        warn!("extract: {e}");
    }

    if args.metrics {
        print_metrics();
    }
    let n = copied?;
    println!("extract: copied {} file(s) to {}", n, args.dest.display());
    Ok(())
}
