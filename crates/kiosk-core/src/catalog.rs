//! Directory listing of deployed manifests.
//!
//! The catalog is read fresh from the manifests directory on every
//! call. Nothing here caches: deployment state is whatever the
//! directory says right now.

use crate::error::EngineError;
use kiosk_schema::{is_manifest_file, DeployState, ManifestFileName};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// One manifest file found in the manifests directory.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// File name on disk, including any state suffix.
    pub file_name: String,
    /// Full path to the manifest file.
    pub path: PathBuf,
    /// Parsed identity fields.
    pub parsed: ManifestFileName,
}

impl CatalogEntry {
    /// Deployment state encoded in the file name.
    pub fn state(&self) -> DeployState {
        self.parsed.state
    }

    /// True for the reserved infrastructure manifest.
    pub fn is_infrastructure(&self) -> bool {
        self.parsed.is_infrastructure()
    }
}

/// List every manifest file in `manifests_dir`, naturally sorted by
/// file name. A manifest file whose name fails the grammar is an
/// error: a file the catalog cannot account for may still claim
/// artifacts, so mutations must not proceed past it.
pub fn all_manifests(manifests_dir: &Path) -> Result<Vec<CatalogEntry>, EngineError> {
    scan(manifests_dir, true)
}

/// Lenient variant of [`all_manifests`] for read-only browsing: files
/// failing the name grammar are skipped with a warning instead of
/// failing the whole listing.
pub fn listed_manifests(manifests_dir: &Path) -> Result<Vec<CatalogEntry>, EngineError> {
    scan(manifests_dir, false)
}

fn scan(manifests_dir: &Path, strict: bool) -> Result<Vec<CatalogEntry>, EngineError> {
    if !manifests_dir.is_dir() {
        return Err(EngineError::MissingManifestsDir(
            manifests_dir.to_path_buf(),
        ));
    }
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(manifests_dir)? {
        let entry = entry?;
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        if !is_manifest_file(&file_name) {
            continue;
        }
        match ManifestFileName::parse(&file_name) {
            Ok(parsed) => entries.push(CatalogEntry {
                path: entry.path(),
                file_name,
                parsed,
            }),
            Err(e) if strict => return Err(e.into()),
            Err(e) => tracing::warn!("skipping unparseable manifest file {file_name}: {e}"),
        }
    }
    entries.sort_by(|a, b| natural_cmp(&a.file_name, &b.file_name));
    Ok(entries)
}

/// Manifests currently in the Active state.
pub fn active_manifests(manifests_dir: &Path) -> Result<Vec<CatalogEntry>, EngineError> {
    Ok(all_manifests(manifests_dir)?
        .into_iter()
        .filter(|e| e.state() == DeployState::Active)
        .collect())
}

/// Manifests currently in the Quiesced state.
pub fn quiesced_manifests(manifests_dir: &Path) -> Result<Vec<CatalogEntry>, EngineError> {
    Ok(all_manifests(manifests_dir)?
        .into_iter()
        .filter(|e| e.state() == DeployState::Quiesced)
        .collect())
}

/// Active manifests excluding the infrastructure manifest. At most one
/// of these should exist at any time.
pub fn active_course_manifests(manifests_dir: &Path) -> Result<Vec<CatalogEntry>, EngineError> {
    Ok(active_manifests(manifests_dir)?
        .into_iter()
        .filter(|e| !e.is_infrastructure())
        .collect())
}

/// Compare two names treating digit runs as numbers, so `GEN-2` sorts
/// before `GEN-10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ac = a.chars().peekable();
    let mut bc = b.chars().peekable();
    loop {
        match (ac.peek().copied(), bc.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                if x.is_ascii_digit() && y.is_ascii_digit() {
                    let xn = take_number(&mut ac);
                    let yn = take_number(&mut bc);
                    match xn.cmp(&yn) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                } else {
                    match x.cmp(&y) {
                        Ordering::Equal => {
                            ac.next();
                            bc.next();
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u64 {
    let mut n: u64 = 0;
    while let Some(c) = chars.peek().copied() {
        let Some(d) = c.to_digit(10) else { break };
        n = n.saturating_mul(10).saturating_add(u64::from(d));
        chars.next();
    }
    n
}
