//! Shared manifest types and validation for kiosk.
//!
//! A manifest declares a course's deployable artifact set and its
//! identity. Identity is the generated file name (see [`name`]); the
//! document body is TOML (see [`types`]). Validation is strict and
//! all-or-nothing: schema errors, blank fields, a malformed publish
//! date, or any filename/header disagreement invalidate the whole
//! manifest.

pub mod checksum;
pub mod error;
pub mod name;
pub mod types;

pub use checksum::{Checksum, NOCHECK};
pub use error::ValidationError;
pub use name::{
    active_name, is_infrastructure, is_manifest_file, DeployState, ManifestFileName,
    INFRASTRUCTURE_PREFIX, MANIFEST_EXT, QUIESCED_SUFFIX,
};
pub use types::{Artifact, ArtifactType, ContentFields, ContentType, Course, Manifest};
