//! Manifest validation errors.

use std::path::PathBuf;
use thiserror::Error;

/// A manifest failed schema or filename/header consistency checks.
///
/// Validation is all-or-nothing: any variant invalidates the whole
/// manifest and no partial manifest object is ever returned.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The backing file could not be read.
    #[error("failed to read manifest {path}: {source}")]
    Read {
        /// Path of the manifest file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file name does not carry the manifest extension.
    #[error("manifest '{0}' does not end with .cmf or .cmf_quiesced")]
    Extension(String),

    /// The file name does not follow the manifest filename grammar.
    #[error("malformed manifest filename '{name}': {reason}")]
    FileName {
        /// The offending file name.
        name: String,
        /// What part of the grammar was violated.
        reason: String,
    },

    /// The document is not well-formed TOML or is missing required keys.
    #[error("failed to parse manifest: {0}")]
    Parse(String),

    /// A required course header field is missing or blank.
    #[error("missing or blank course field: {0}")]
    BlankField(&'static str),

    /// The publish date does not match the required timestamp grammar.
    #[error("invalid publish date (expected %Y-%m-%d %H:%M:%S%z): {0}")]
    PublishDate(String),

    /// A filename-encoded field disagrees with the course header.
    #[error("filename {field} '{encoded}' does not match header '{header}'")]
    FieldMismatch {
        /// Which of the six encoded fields mismatched.
        field: &'static str,
        /// Value encoded in the file name.
        encoded: String,
        /// Value declared in the course header.
        header: String,
    },

    /// A required artifact field is missing or blank.
    #[error("artifact '{filename}': missing or blank field '{field}'")]
    ArtifactField {
        /// Filename of the offending artifact.
        filename: String,
        /// Name of the missing field.
        field: &'static str,
    },

    /// An artifact declaration is inconsistent.
    #[error("artifact '{filename}': {reason}")]
    Artifact {
        /// Filename of the offending artifact.
        filename: String,
        /// Human-readable description of the inconsistency.
        reason: String,
    },
}
