use anyhow::{Context, Result};
use kiosk_core::Engine;

/// Report the bytes removing a manifest would free versus keep.
pub fn size(engine: &Engine, name: &str) -> Result<bool> {
    let (footprint, report) = engine
        .removal_footprint(name)
        .with_context(|| format!("sizing {name}"))?;
    println!(
        "Removing {name} would free {} ({} shared with other manifests stays).",
        human_bytes(footprint.freed_bytes),
        human_bytes(footprint.shared_bytes)
    );
    if !report.success() {
        println!("{report}");
    }
    Ok(report.success())
}

/// Binary-unit rendering, one decimal place above bytes.
fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
