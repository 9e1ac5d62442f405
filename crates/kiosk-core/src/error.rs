//! Engine error taxonomy.
//!
//! Two propagation classes exist. Validation and duplicate-manifest
//! errors are fatal: the manifest-level operation aborts before any
//! mutation. Side-effect and corrupt-state errors are recorded into
//! the operation's [`Session`](crate::session::Session) and processing
//! continues with the remaining artifacts.

use kiosk_schema::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A manifest failed validation; fatal to the operation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// More than one existing manifest matches a course during deploy.
    /// Fatal; requires manual cleanup before retrying.
    #[error("more than one manifest matches course '{course}': {matches:?}; remove the extras manually and retry")]
    DuplicateManifest {
        /// Course name of the incoming manifest.
        course: String,
        /// The conflicting manifest file names.
        matches: Vec<String>,
    },

    /// The deployment root has no manifests directory.
    #[error("no manifests directory under {0}")]
    MissingManifestsDir(PathBuf),

    /// The named manifest does not exist in the deployment directory.
    #[error("no manifest named '{0}' is deployed")]
    ManifestNotFound(String),

    /// An individual mutating action failed. Recorded, not fatal.
    #[error("{action} failed for {path}: {source}")]
    SideEffect {
        /// What was being attempted (copy, mount, install, ...).
        action: &'static str,
        /// The path or name the action targeted.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// An artifact expected on disk is missing. Recorded, not fatal.
    #[error("expected artifact missing: {0}")]
    CorruptState(PathBuf),

    /// A deployed file's digest disagrees with its manifest. Recorded
    /// during verification, not fatal.
    #[error("checksum mismatch for {path}: manifest declares {expected}, file hashes to {actual}")]
    ChecksumMismatch {
        /// Deployed file that was hashed.
        path: PathBuf,
        /// Digest declared by the manifest.
        expected: String,
        /// Digest computed from the file.
        actual: String,
    },

    /// On-disk or mount/package state disagrees with what a manifest's
    /// deployment state implies. Recorded during verification.
    #[error("inconsistent state for {subject}: {problem}")]
    Inconsistent {
        /// What was checked (path, mount point, package name).
        subject: String,
        /// How it disagrees.
        problem: String,
    },

    /// Any other I/O failure at the operation level.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Shorthand for a [`EngineError::SideEffect`] record.
    pub fn side_effect(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::SideEffect {
            action,
            path: path.into(),
            source,
        }
    }
}
