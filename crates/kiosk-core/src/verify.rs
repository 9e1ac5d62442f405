//! Deployment verification and sizing.
//!
//! Nothing here mutates. Verification reports every way the directory
//! disagrees with its manifests (missing payloads, digest mismatches,
//! absent mounts or packages); repairs are left to the operator.

use crate::engine::Engine;
use crate::error::EngineError;
use crate::session::{OpReport, Session};
use kiosk_schema::{ContentType, DeployState, Manifest};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::PathBuf;

/// Bytes a manifest removal would affect.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemovalFootprint {
    /// Bytes in payloads no other manifest references; removal frees these.
    pub freed_bytes: u64,
    /// Bytes in payloads shared with other manifests; removal keeps these.
    pub shared_bytes: u64,
}

impl Engine {
    /// Check deployed state against one manifest, or against all of
    /// them. With `deep` set, payload digests are recomputed and
    /// compared to the declared checksums; shared payloads are hashed
    /// only once per run.
    ///
    /// Invalid manifests are reported and skipped rather than aborting,
    /// so one broken file does not hide problems in the rest.
    pub fn verify(&self, name: Option<&str>, deep: bool) -> Result<OpReport, EngineError> {
        let entries = self.select(name)?;
        let mut session = Session::new("verify");
        let deployer = self.deployer();

        for entry in &entries {
            let manifest = match Manifest::load(&entry.path) {
                Ok(m) => m,
                Err(e) => {
                    session.record(e.into());
                    continue;
                }
            };
            let active = entry.state() == DeployState::Active;
            for artifact in manifest.content_artifacts() {
                if !deployer.eligible(artifact) {
                    continue;
                }
                let Some(content) = artifact.content() else {
                    continue;
                };
                let payload = deployer.deployed_path(artifact, &content);
                if !self.system().fs.exists(&payload) {
                    session.record(EngineError::CorruptState(payload));
                    continue;
                }
                if deep && !artifact.checksum.is_nocheck() && session.first_check(&payload) {
                    self.check_digest(&payload, artifact, &mut session);
                }
                for link in &artifact.hardlink_names {
                    let link_path = deployer.path_in_root(link);
                    if !self.system().fs.exists(&link_path) {
                        session.record(EngineError::Inconsistent {
                            subject: link_path.display().to_string(),
                            problem: String::from("declared hard link missing"),
                        });
                    }
                }
                if active {
                    self.check_active_state(&deployer, artifact, &content, &payload, &mut session);
                }
            }
        }
        Ok(session.into_report())
    }

    /// Load and validate one manifest, or every deployed manifest,
    /// reporting each failure without stopping at the first.
    pub fn validate(&self, name: Option<&str>) -> Result<OpReport, EngineError> {
        let entries = self.select(name)?;
        let mut session = Session::new("validate");
        for entry in &entries {
            if let Err(e) = Manifest::load(&entry.path) {
                session.record(e.into());
            }
        }
        Ok(session.into_report())
    }

    /// Bytes that removing the named manifest would free versus keep.
    /// Payloads expected but absent are reported as corrupt state and
    /// counted as zero.
    pub fn removal_footprint(
        &self,
        name: &str,
    ) -> Result<(RemovalFootprint, OpReport), EngineError> {
        let entries = self.list()?;
        let target = entries
            .iter()
            .find(|e| {
                kiosk_schema::active_name(&e.file_name) == kiosk_schema::active_name(name)
            })
            .ok_or_else(|| EngineError::ManifestNotFound(name.to_string()))?;
        let others: Vec<PathBuf> = entries
            .iter()
            .filter(|e| e.file_name != target.file_name)
            .map(|e| e.path.clone())
            .collect();

        let mut session = Session::new("size");
        let deployer = self.deployer();
        let manifest = Manifest::load(&target.path)?;
        let mut footprint = RemovalFootprint::default();

        for artifact in manifest.content_artifacts() {
            if !deployer.eligible(artifact) {
                continue;
            }
            let Some(content) = artifact.content() else {
                continue;
            };
            let payload = deployer.deployed_path(artifact, &content);
            if !self.system().fs.exists(&payload) {
                session.record(EngineError::CorruptState(payload));
                continue;
            }
            let size = match self.system().fs.file_size(&payload) {
                Ok(size) => size,
                Err(e) => {
                    session.record(EngineError::side_effect("stat", payload, e));
                    continue;
                }
            };
            let refs = crate::resolver::references(&artifact.filename, &others)?;
            if deployer.payload_shared(artifact, &refs) {
                footprint.shared_bytes += size;
            } else {
                footprint.freed_bytes += size;
            }
        }
        Ok((footprint, session.into_report()))
    }

    fn select(
        &self,
        name: Option<&str>,
    ) -> Result<Vec<crate::catalog::CatalogEntry>, EngineError> {
        let entries = self.list()?;
        match name {
            None => Ok(entries),
            Some(name) => {
                let entry = entries
                    .into_iter()
                    .find(|e| {
                        kiosk_schema::active_name(&e.file_name) == kiosk_schema::active_name(name)
                    })
                    .ok_or_else(|| EngineError::ManifestNotFound(name.to_string()))?;
                Ok(vec![entry])
            }
        }
    }

    fn check_digest(
        &self,
        payload: &std::path::Path,
        artifact: &kiosk_schema::Artifact,
        session: &mut Session,
    ) {
        match self.system().fs.open(payload) {
            Ok(mut reader) => match sha256_hex(reader.as_mut()) {
                Ok(actual) if artifact.checksum.matches(&actual) => {}
                Ok(actual) => session.record(EngineError::ChecksumMismatch {
                    path: payload.to_path_buf(),
                    expected: artifact.checksum.to_string(),
                    actual,
                }),
                Err(e) => session.record(EngineError::side_effect(
                    "hash",
                    payload.to_path_buf(),
                    e,
                )),
            },
            Err(e) => session.record(EngineError::side_effect(
                "open",
                payload.to_path_buf(),
                e,
            )),
        }
    }

    /// For an Active manifest, the iso mounts and rpm installs its
    /// artifacts imply must actually be in place.
    fn check_active_state(
        &self,
        deployer: &crate::deployer::Deployer<'_>,
        artifact: &kiosk_schema::Artifact,
        content: &kiosk_schema::ContentFields<'_>,
        payload: &std::path::Path,
        session: &mut Session,
    ) {
        match content.content_type {
            ContentType::Iso => {
                let Some(final_name) = content.final_name else {
                    return;
                };
                let mountpoint = deployer.path_in_root(final_name);
                match self.system().mounts.contains(payload, &mountpoint) {
                    Ok(true) => {}
                    Ok(false) => session.record(EngineError::Inconsistent {
                        subject: mountpoint.display().to_string(),
                        problem: String::from("expected mount entry missing"),
                    }),
                    Err(e) => session.record(EngineError::side_effect(
                        "query-mounts",
                        mountpoint,
                        e,
                    )),
                }
            }
            ContentType::Rpm => {
                let name = crate::deployer::package_name(&artifact.filename);
                match self.system().packages.is_installed(name) {
                    Ok(true) => {}
                    Ok(false) => session.record(EngineError::Inconsistent {
                        subject: name.to_string(),
                        problem: String::from("package not installed"),
                    }),
                    Err(e) => session.record(EngineError::side_effect(
                        "query-package",
                        payload.to_path_buf(),
                        e,
                    )),
                }
            }
            _ => {}
        }
    }
}

/// Hex-encoded SHA-256 digest of a stream.
pub fn sha256_hex(reader: &mut dyn Read) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
