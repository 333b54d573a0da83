use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use ShadowMount::fleet::cleanup_all;
use ShadowMount::ShadowConfig;

use super::util::{fleet_log, open_service, print_metrics};

/// Удаление ВСЕХ shadow copies хоста (включая чужие). Требует --yes.
pub fn exec(dir_service: Option<PathBuf>, yes: bool, json: bool, metrics: bool) -> Result<()> {
    if !yes {
        return Err(anyhow!(
            "delete-all removes every shadow copy on this host, including ones created by \
             other tools; re-run with --yes"
        ));
    }
    let cfg = ShadowConfig::from_env();
    let service = open_service(&cfg, dir_service)?;
    let log = fleet_log(&cfg);

    let summary = cleanup_all(service.as_ref(), &log)?;
    if json {
        let s = serde_json::to_string(&summary).context("serialize summary")?;
        println!("{s}");
    } else {
        println!(
            "delete-all: found={} deleted={} failed={} remaining={}",
            summary.found,
            summary.deleted,
            summary.failed,
            summary
                .remaining
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string())
        );
    }
    if metrics {
        print_metrics();
    }
    if summary.failed > 0 {
        return Err(anyhow!("{} shadow copies could not be deleted", summary.failed));
    }
    Ok(())
}
