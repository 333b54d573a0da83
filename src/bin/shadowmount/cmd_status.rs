use anyhow::{Context, Result};
use serde_json::json;

use ShadowMount::logsink::{resolve_logging_mode, EnvCapabilityProbe};
use ShadowMount::ShadowConfig;

/// Эффективная конфигурация (ENV + дефолты) и выбранный snapshot service.
pub fn exec(json_out: bool) -> Result<()> {
    let cfg = ShadowConfig::from_env();
    let mode = resolve_logging_mode(cfg.log_mode, &EnvCapabilityProbe);

    if json_out {
        let v = json!({
            "mount_root": cfg.mount_root.display().to_string(),
            "log_mode": mode.to_string(),
            "log_mode_forced": cfg.log_mode.is_some(),
            "default_pattern": cfg.default_pattern,
            "powershell": cfg.powershell,
            "host_service": if cfg!(windows) { "cim" } else { "none" },
        });
        let s = serde_json::to_string_pretty(&v).context("serialize status")?;
        println!("{s}");
        return Ok(());
    }

    println!("{cfg}");
    println!("  effective log mode = {mode}");
    println!(
        "  host service       = {}",
        if cfg!(windows) { "Win32_ShadowCopy (CIM)" } else { "none (use --dir-service)" }
    );
    Ok(())
}
