//! Manifest filename grammar.
//!
//! A manifest's identity is its generated file name:
//!
//! ```text
//! <name>-<technology>-<release>-<modality{+modality}>-<generation>-<locale{+locale}>.cmf
//! ```
//!
//! An inactive copy carries the literal `_quiesced` suffix after the
//! extension. Deployment state lives only in the file name on disk;
//! it is re-derived on every read and never held as a mutable flag.

use crate::error::ValidationError;
use std::fmt;
use std::str::FromStr;

/// Manifest file extension (without the dot).
pub const MANIFEST_EXT: &str = "cmf";

/// Literal suffix appended to the file name of a quiesced manifest.
pub const QUIESCED_SUFFIX: &str = "_quiesced";

/// Reserved course-name prefix of the infrastructure manifest, which is
/// always Active and exempt from the one-active-manifest rule.
pub const INFRASTRUCTURE_PREFIX: &str = "INFRA";

/// Deployment state of a manifest, expressed purely by its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    /// Artifacts are mounted/installed.
    Active,
    /// Artifacts are on disk but deactivated.
    Quiesced,
}

/// A parsed manifest file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFileName {
    /// Course name (first encoded field).
    pub name: String,
    /// Technology code.
    pub technology: String,
    /// Release string.
    pub release: String,
    /// Ordered modalities, `+`-joined in the file name.
    pub modalities: Vec<String>,
    /// Generation number.
    pub generation: u32,
    /// Ordered locales, `+`-joined in the file name.
    pub locales: Vec<String>,
    /// State encoded by the presence of the `_quiesced` suffix.
    pub state: DeployState,
}

/// True if the given file name looks like a manifest file (active or
/// quiesced), without validating the full grammar.
pub fn is_manifest_file(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower.ends_with(&format!(".{MANIFEST_EXT}"))
        || lower.ends_with(&format!(".{MANIFEST_EXT}{QUIESCED_SUFFIX}"))
}

/// True if the file name belongs to the designated infrastructure
/// manifest (reserved name prefix, compared case-insensitively).
pub fn is_infrastructure(file_name: &str) -> bool {
    file_name
        .to_uppercase()
        .starts_with(INFRASTRUCTURE_PREFIX)
}

/// Strip a known deployment-state suffix, yielding the active file name.
pub fn active_name(file_name: &str) -> &str {
    file_name
        .strip_suffix(QUIESCED_SUFFIX)
        .unwrap_or(file_name)
}

impl ManifestFileName {
    /// Parse a manifest file name, enforcing the full grammar.
    pub fn parse(file_name: &str) -> Result<Self, ValidationError> {
        let malformed = |reason: &str| ValidationError::FileName {
            name: file_name.to_string(),
            reason: reason.to_string(),
        };

        let (stem, state) = if let Some(s) =
            file_name.strip_suffix(&format!(".{MANIFEST_EXT}{QUIESCED_SUFFIX}"))
        {
            (s, DeployState::Quiesced)
        } else if let Some(s) = file_name.strip_suffix(&format!(".{MANIFEST_EXT}")) {
            (s, DeployState::Active)
        } else {
            return Err(ValidationError::Extension(file_name.to_string()));
        };

        let parts: Vec<&str> = stem.split('-').collect();
        if parts.len() != 6 {
            return Err(malformed(&format!(
                "expected 6 dash-separated fields, found {}",
                parts.len()
            )));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(malformed("empty field"));
        }

        let split_plus = |s: &str| -> Vec<String> { s.split('+').map(str::to_string).collect() };
        let modalities = split_plus(parts[3]);
        let locales = split_plus(parts[5]);
        if modalities.iter().any(String::is_empty) {
            return Err(malformed("empty modality"));
        }
        if locales.iter().any(String::is_empty) {
            return Err(malformed("empty locale"));
        }

        let generation: u32 = parts[4]
            .parse()
            .map_err(|_| malformed(&format!("generation '{}' is not an integer", parts[4])))?;

        Ok(Self {
            name: parts[0].to_string(),
            technology: parts[1].to_string(),
            release: parts[2].to_string(),
            modalities,
            generation,
            locales,
            state,
        })
    }

    /// The file name in its current deployment state.
    pub fn file_name(&self) -> String {
        match self.state {
            DeployState::Active => self.active_file_name(),
            DeployState::Quiesced => self.quiesced_file_name(),
        }
    }

    /// The file name of the active form.
    pub fn active_file_name(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}-{}.{MANIFEST_EXT}",
            self.name,
            self.technology,
            self.release,
            self.modalities.join("+"),
            self.generation,
            self.locales.join("+")
        )
    }

    /// The file name of the quiesced form.
    pub fn quiesced_file_name(&self) -> String {
        format!("{}{QUIESCED_SUFFIX}", self.active_file_name())
    }

    /// The course name encoded in the file name.
    pub fn course(&self) -> &str {
        &self.name
    }

    /// True for the reserved infrastructure manifest.
    pub fn is_infrastructure(&self) -> bool {
        is_infrastructure(&self.name)
    }
}

impl fmt::Display for ManifestFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

impl FromStr for ManifestFileName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
