use anyhow::{Context, Result};
use std::path::PathBuf;

use ShadowMount::fleet::{describe, list_all_with_logging};
use ShadowMount::ShadowConfig;

use super::util::{fleet_log, open_service};

/// Список всех shadow copies хоста, опционально JSON.
pub fn exec(dir_service: Option<PathBuf>, json: bool) -> Result<()> {
    let cfg = ShadowConfig::from_env();
    let service = open_service(&cfg, dir_service)?;
    let log = fleet_log(&cfg);

    let records = list_all_with_logging(service.as_ref(), &log)?;
    if json {
        let s = serde_json::to_string_pretty(&records).context("serialize shadow copy list")?;
        println!("{s}");
        return Ok(());
    }
    if records.is_empty() {
        println!("(no shadow copies)");
        return Ok(());
    }
    for r in &records {
        println!("{}", describe(r));
    }
    Ok(())
}
