use anyhow::Result;
use kiosk_core::Engine;

/// Validate one or all deployed manifests.
pub fn validate(engine: &Engine, name: Option<&str>) -> Result<bool> {
    let report = engine.validate(name)?;
    println!("{report}");
    Ok(report.success())
}
