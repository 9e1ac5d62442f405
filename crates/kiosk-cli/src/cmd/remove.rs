use anyhow::{Context, Result};
use kiosk_core::Engine;

/// Remove a deployed manifest by name.
pub fn remove(engine: &Engine, name: &str) -> Result<bool> {
    let report = engine
        .remove(name)
        .with_context(|| format!("removing {name}"))?;
    println!("{report}");
    Ok(report.success())
}
