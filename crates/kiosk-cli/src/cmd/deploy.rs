use anyhow::{Context, Result};
use kiosk_core::Engine;
use std::path::Path;

/// Deploy a manifest from `manifest_path`, copying payloads out of `source`.
pub fn deploy(engine: &Engine, manifest_path: &Path, source: &Path) -> Result<bool> {
    let report = engine
        .deploy(manifest_path, source)
        .with_context(|| format!("deploying {}", manifest_path.display()))?;
    println!("{report}");
    Ok(report.success())
}
