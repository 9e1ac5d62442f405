use anyhow::{Context, Result};
use kiosk_core::Engine;

/// Activate a quiesced manifest by name.
pub fn activate(engine: &Engine, name: &str) -> Result<bool> {
    let report = engine
        .activate(name)
        .with_context(|| format!("activating {name}"))?;
    println!("{report}");
    Ok(report.success())
}
