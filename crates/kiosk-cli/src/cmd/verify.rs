use anyhow::Result;
use kiosk_core::Engine;

/// Check deployed state, optionally recomputing payload checksums.
pub fn verify(engine: &Engine, name: Option<&str>, checksums: bool) -> Result<bool> {
    let report = engine.verify(name, checksums)?;
    println!("{report}");
    Ok(report.success())
}
