//! Win32_ShadowCopy through PowerShell CIM cmdlets.
//!
//! Each call runs one `powershell -NoProfile -NonInteractive -Command <script>` and
//! reads compact JSON from stdout:
//! - create:    Invoke-CimMethod Win32_ShadowCopy.Create -> {ReturnValue, ShadowID}
//! - resolve:   Get-CimInstance -Filter "ID='..'"        -> one shadow object
//! - enumerate: Get-CimInstance (wrapped in @())        -> array (or object/empty, see parse)
//! - delete:    Get-CimInstance ... | Remove-CimInstance
//!
//! InstallDate is emitted as ISO-8601 ('o') so both PowerShell 5.1 and 7 agree.

use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, FixedOffset};
use log::debug;
use serde::Deserialize;

use super::{ShadowRecord, ShadowService};

const SELECT_PROJECTION: &str = "Select-Object ID, DeviceObject, VolumeName, \
     @{n='InstallDate';e={ if ($_.InstallDate) { $_.InstallDate.ToString('o') } else { $null } }}, \
     ClientAccessible";

#[derive(Debug, Clone)]
pub struct CimShadowService {
    powershell: String,
}

impl CimShadowService {
    pub fn new<S: Into<String>>(powershell: S) -> Self {
        Self {
            powershell: powershell.into(),
        }
    }

    fn run(&self, script: &str) -> Result<String> {
        debug!("cim: {}", script);
        let out = Command::new(&self.powershell)
            .args(["-NoProfile", "-NonInteractive", "-Command", script])
            .output()
            .with_context(|| format!("spawn {}", self.powershell))?;
        let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.powershell,
                out.status,
                stderr.trim()
            ));
        }
        Ok(stdout)
    }
}

impl ShadowService for CimShadowService {
    fn create(&self, volume_root: &Path) -> Result<String> {
        let volume = volume_arg(volume_root)?;
        let script = format!(
            "$r = Invoke-CimMethod -ClassName Win32_ShadowCopy -MethodName Create \
             -Arguments @{{ Volume = '{volume}'; Context = 'ClientAccessible' }}; \
             $r | Select-Object ReturnValue, ShadowID | ConvertTo-Json -Compress"
        );
        let out = self.run(&script)?;
        parse_create_output(&out).with_context(|| format!("create shadow copy of {volume}"))
    }

    fn resolve(&self, id: &str) -> Result<ShadowRecord> {
        check_shadow_id(id)?;
        let script = format!(
            "Get-CimInstance -ClassName Win32_ShadowCopy -Filter \"ID='{id}'\" | \
             {SELECT_PROJECTION} | ConvertTo-Json -Compress"
        );
        let out = self.run(&script)?;
        let mut l = parse_shadow_list(&out).with_context(|| format!("resolve {id}"))?;
        match l.len() {
            0 => Err(anyhow!("shadow copy {id} not found")),
            _ => Ok(l.swap_remove(0)),
        }
    }

    fn delete(&self, id: &str) -> Result<()> {
        check_shadow_id(id)?;
        let script = format!(
            "Get-CimInstance -ClassName Win32_ShadowCopy -Filter \"ID='{id}'\" | Remove-CimInstance"
        );
        self.run(&script).with_context(|| format!("delete {id}"))?;
        Ok(())
    }

    fn enumerate(&self) -> Result<Vec<ShadowRecord>> {
        let script = format!(
            "ConvertTo-Json -Compress -InputObject @(Get-CimInstance -ClassName Win32_ShadowCopy | \
             {SELECT_PROJECTION})"
        );
        let out = self.run(&script)?;
        parse_shadow_list(&out).context("enumerate shadow copies")
    }
}

// ----------------- parsing -----------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateResult {
    return_value: u32,
    #[serde(rename = "ShadowID")]
    shadow_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CimShadow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    device_object: Option<String>,
    #[serde(default)]
    volume_name: Option<String>,
    #[serde(default)]
    install_date: Option<String>,
    #[serde(default)]
    client_accessible: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Win32_ShadowCopy.Create return codes.
fn create_error_text(code: u32) -> &'static str {
    match code {
        1 => "access denied",
        2 => "invalid argument",
        3 => "specified volume not found",
        4 => "specified volume not supported",
        5 => "unsupported shadow copy context",
        6 => "insufficient storage",
        7 => "volume is in use",
        8 => "maximum number of shadow copies reached",
        9 => "another shadow copy operation is already in progress",
        10 => "shadow copy provider vetoed the operation",
        11 => "shadow copy provider not registered",
        12 => "shadow copy provider failure",
        _ => "unknown error",
    }
}

pub(crate) fn parse_create_output(out: &str) -> Result<String> {
    let r: CreateResult =
        serde_json::from_str(out.trim()).context("parse Win32_ShadowCopy.Create output")?;
    if r.return_value != 0 {
        return Err(anyhow!(
            "Win32_ShadowCopy.Create returned {} ({})",
            r.return_value,
            create_error_text(r.return_value)
        ));
    }
    match r.shadow_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(anyhow!("Win32_ShadowCopy.Create succeeded without ShadowID")),
    }
}

/// Empty output, a single object and an array are all valid.
pub(crate) fn parse_shadow_list(out: &str) -> Result<Vec<ShadowRecord>> {
    let s = out.trim();
    if s.is_empty() || s == "null" {
        return Ok(Vec::new());
    }
    let parsed: OneOrMany<CimShadow> =
        serde_json::from_str(s).context("parse Win32_ShadowCopy JSON")?;
    let raw = match parsed {
        OneOrMany::Many(v) => v,
        OneOrMany::One(one) => vec![one],
    };
    Ok(raw.into_iter().map(into_record).collect())
}

fn into_record(c: CimShadow) -> ShadowRecord {
    ShadowRecord {
        install_date: c.install_date.as_deref().and_then(parse_install_date),
        id: c.id,
        device_object: c.device_object.unwrap_or_default(),
        volume_name: c.volume_name.unwrap_or_default(),
        client_accessible: c.client_accessible.unwrap_or(false),
    }
}

fn parse_install_date(s: &str) -> Option<DateTime<FixedOffset>> {
    match DateTime::parse_from_rfc3339(s.trim()) {
        Ok(d) => Some(d),
        Err(e) => {
            debug!("cim: unparsable InstallDate '{s}': {e}");
            None
        }
    }
}

/// Ids are interpolated into WQL; accept only GUID-shaped text.
fn check_shadow_id(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_hexdigit() || c == '{' || c == '}' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(anyhow!("invalid shadow copy id '{id}'"))
    }
}

/// Volume argument for Create: `C:\` style, quotes rejected.
fn volume_arg(volume_root: &Path) -> Result<String> {
    let mut s = volume_root.to_string_lossy().into_owned();
    if s.contains('\'') || s.contains('"') {
        return Err(anyhow!("invalid volume '{s}'"));
    }
    if !s.ends_with('\\') {
        s.push('\\');
    }
    Ok(s)
}
