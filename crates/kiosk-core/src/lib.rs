//! Reference-counted course-content deployment engine.
//!
//! A deployment root holds a `manifests/` directory of course manifest
//! files plus the artifact payloads those manifests describe. This
//! crate implements the engine that moves a root between states:
//! deploying new manifests, activating and quiescing them, removing
//! them, and verifying that the directory still matches what the
//! manifests claim.
//!
//! Artifacts may be shared between manifests by file name. Every
//! destructive step therefore goes through the [`resolver`], which
//! re-reads sibling manifests from disk and answers whether anything
//! still claims the file. The side effects themselves (copies, loop
//! mounts, package installs) run through the narrow traits in
//! [`system`], so the whole engine is testable against in-memory
//! fakes.

pub mod catalog;
pub mod deployer;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod session;
pub mod system;
pub mod verify;

pub use catalog::CatalogEntry;
pub use deployer::Deployer;
pub use engine::{Engine, MANIFESTS_DIR};
pub use error::EngineError;
pub use session::{OpReport, Session};
pub use system::System;
pub use verify::RemovalFootprint;
