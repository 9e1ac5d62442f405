//! Cross-manifest reference resolution.
//!
//! Before any artifact file or hard link is torn down, the resolver is
//! asked whether another manifest still claims it. It is the single
//! authority for that question: callers never count references
//! themselves. Sibling manifests are re-read from disk on every call,
//! so answers always reflect the current directory contents.
//!
//! Matching is by artifact file name equality only. Two manifests that
//! declare the same file name share the deployed file, whatever their
//! checksums say; checksum disagreement is a verification concern, not
//! a reference one.

use kiosk_schema::{Artifact, Manifest, ValidationError};
use std::path::PathBuf;

/// Artifacts in the given sibling manifests that reference
/// `artifact_filename`, in listing order.
pub fn references(
    artifact_filename: &str,
    sibling_paths: &[PathBuf],
) -> Result<Vec<Artifact>, ValidationError> {
    let mut found = Vec::new();
    for path in sibling_paths {
        let manifest = Manifest::load(path)?;
        found.extend(
            manifest
                .artifacts
                .iter()
                .filter(|a| a.filename == artifact_filename)
                .cloned(),
        );
    }
    Ok(found)
}

/// True if any sibling manifest still references `artifact_filename`.
pub fn is_referenced(
    artifact_filename: &str,
    sibling_paths: &[PathBuf],
) -> Result<bool, ValidationError> {
    Ok(!references(artifact_filename, sibling_paths)?.is_empty())
}

/// True if any sibling manifest declares `link_name` among its
/// artifacts' hard link names. Shared link names keep the link alive
/// after its original declaring manifest is removed.
pub fn hardlink_references(
    link_name: &str,
    sibling_paths: &[PathBuf],
) -> Result<bool, ValidationError> {
    for path in sibling_paths {
        let manifest = Manifest::load(path)?;
        if manifest
            .artifacts
            .iter()
            .any(|a| a.hardlink_names.iter().any(|n| n == link_name))
        {
            return Ok(true);
        }
    }
    Ok(false)
}
