use anyhow::Result;
use kiosk_core::Engine;
use kiosk_schema::{DeployState, Manifest};

/// List deployed manifests with their state and description.
pub fn list(engine: &Engine) -> Result<bool> {
    let entries = engine.list()?;
    if entries.is_empty() {
        println!("No manifests deployed.");
        return Ok(true);
    }
    for entry in &entries {
        let state = match entry.state() {
            DeployState::Active => "active  ",
            DeployState::Quiesced => "quiesced",
        };
        let description = match Manifest::load(&entry.path) {
            Ok(m) => m.course.description,
            Err(_) => String::from("(invalid manifest)"),
        };
        println!(
            "{state}  {:<48}  {description}",
            entry.parsed.active_file_name()
        );
    }
    Ok(true)
}
