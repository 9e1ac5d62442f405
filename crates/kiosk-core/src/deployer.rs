//! Artifact-level side effects.
//!
//! The deployer turns one artifact into filesystem, mount-table, and
//! package-manager actions. It never reads other manifests itself; the
//! engine resolves the sibling artifacts sharing a file name through
//! the [resolver](crate::resolver) and passes them in, and the deployer
//! checks each resource it is about to touch (mountpoint, payload
//! path, installed package) against that set.
//!
//! Every action failure is recorded into the operation's [`Session`]
//! and processing continues, so one broken artifact never blocks the
//! rest of a manifest.

use crate::error::EngineError;
use crate::session::Session;
use crate::system::{MountEntry, System};
use kiosk_schema::{Artifact, ContentFields, ContentType};
use std::path::{Path, PathBuf};

/// Usage tag that always passes the gate.
const USAGE_CLASSROOM: &str = "classroom";

/// Usage tag that passes the gate only on foundation hosts.
const USAGE_FOUNDATION: &str = "foundation";

/// Substring a host name must carry for foundation artifacts.
const FOUNDATION_HOST_MARKER: &str = "foundation";

/// Executes per-artifact actions under a deployment root.
#[derive(Debug)]
pub struct Deployer<'a> {
    root: &'a Path,
    system: &'a System,
}

impl<'a> Deployer<'a> {
    /// Deployer over the given root and system collaborators.
    pub fn new(root: &'a Path, system: &'a System) -> Self {
        Self { root, system }
    }

    /// Resolve a root-relative manifest path to an absolute one. A
    /// leading slash in manifest data is tolerated and stripped.
    pub fn path_in_root(&self, relative: &str) -> PathBuf {
        self.root.join(relative.trim_start_matches('/'))
    }

    /// Absolute path an artifact's payload file deploys to.
    ///
    /// File and pdf content with a final-name is copied directly to
    /// that name; everything else lands in its target directory under
    /// the artifact's own file name.
    pub fn deployed_path(&self, artifact: &Artifact, content: &ContentFields<'_>) -> PathBuf {
        match (content.content_type, content.final_name) {
            (ContentType::File | ContentType::Pdf, Some(final_name)) => {
                self.path_in_root(final_name)
            }
            _ => self
                .path_in_root(content.target_directory)
                .join(&artifact.filename),
        }
    }

    /// Usage gate: an artifact is handled on this host if it is tagged
    /// for the classroom, or tagged for the foundation and this host is
    /// one. Artifacts failing the gate are skipped silently.
    pub fn eligible(&self, artifact: &Artifact) -> bool {
        if artifact.has_usage(USAGE_CLASSROOM) {
            return true;
        }
        artifact.has_usage(USAGE_FOUNDATION)
            && self.system.host.current().contains(FOUNDATION_HOST_MARKER)
    }

    /// Copy an artifact's payload from `source_dir` to its deployed
    /// path and create its declared hard links.
    ///
    /// A payload already present on disk is kept as-is: a same-named
    /// file is the same artifact, whatever its bytes, so content shared
    /// with another manifest is never re-copied. Missing hard links are
    /// created, existing ones left alone.
    ///
    /// Returns `false` if the copy failed (recorded in the session);
    /// callers skip activation for such artifacts.
    pub fn place(&self, artifact: &Artifact, source_dir: &Path, session: &mut Session) -> bool {
        let Some(content) = artifact.content() else {
            return false;
        };
        if !self.eligible(artifact) {
            tracing::debug!("skipping {} - not for this host", artifact.filename);
            return false;
        }
        let src = source_dir.join(&artifact.filename);
        let dst = self.deployed_path(artifact, &content);
        if self.system.fs.exists(&dst) {
            tracing::debug!("{} already deployed", dst.display());
        } else {
            tracing::info!("placing {} at {}", artifact.filename, dst.display());
            if let Err(e) = self.system.fs.copy(&src, &dst) {
                session.record(EngineError::side_effect("copy", src, e));
                return false;
            }
        }
        for link_name in &artifact.hardlink_names {
            let link = self.path_in_root(link_name);
            if self.system.fs.exists(&link) {
                continue;
            }
            if let Err(e) = self.system.fs.hard_link(&dst, &link) {
                session.record(EngineError::side_effect("hard-link", link, e));
            }
        }
        true
    }

    /// Bring a placed artifact into active service: mount an iso or
    /// install an rpm. Other content types are fully handled by
    /// placement, so activating them does nothing.
    ///
    /// `others` are the sibling artifacts sharing this file name. An
    /// iso whose mountpoint one of them already claims is not mounted
    /// again, and an rpm another of them keeps installed is not
    /// reinstalled; the install itself is also skipped when the
    /// package manager reports it present, which is what makes
    /// repeated activation safe.
    pub fn activate(&self, artifact: &Artifact, others: &[Artifact], session: &mut Session) {
        let Some(content) = artifact.content() else {
            return;
        };
        if !self.eligible(artifact) {
            return;
        }
        let dst = self.deployed_path(artifact, &content);
        match content.content_type {
            ContentType::Iso => {
                // Validation guarantees final-name for iso content.
                let Some(final_name) = content.final_name else {
                    return;
                };
                if mountpoint_shared(final_name, others) {
                    tracing::debug!("{final_name} already claimed by a sharing manifest");
                    return;
                }
                let mountpoint = self.path_in_root(final_name);
                tracing::info!("mounting {} at {}", dst.display(), mountpoint.display());
                let entry = MountEntry::loop_mount(dst, mountpoint.clone());
                if let Err(e) = self.system.mounts.add(&entry) {
                    session.record(EngineError::side_effect("mount", mountpoint, e));
                }
            }
            ContentType::Rpm => {
                if package_shared(others) {
                    tracing::debug!("{} installed via a sharing manifest", artifact.filename);
                    return;
                }
                let name = package_name(&artifact.filename);
                match self.system.packages.is_installed(name) {
                    Ok(true) => {
                        tracing::debug!("package {name} already installed");
                    }
                    Ok(false) => {
                        tracing::info!("installing package {name}");
                        if let Err(e) = self.system.packages.install(&dst) {
                            session.record(EngineError::side_effect("install", dst, e));
                        }
                    }
                    Err(e) => session.record(EngineError::side_effect("query-package", dst, e)),
                }
            }
            ContentType::File | ContentType::Pdf | ContentType::Tar | ContentType::Boot => {}
        }
    }

    /// Take an active artifact out of service, leaving its payload file
    /// in place: unmount an iso, uninstall an rpm.
    ///
    /// Each resource stays in service while a sibling in `others`
    /// claims it: the mount entry survives if another iso reference
    /// declares the same final-name, the package if any rpm reference
    /// remains.
    pub fn deactivate(&self, artifact: &Artifact, others: &[Artifact], session: &mut Session) {
        let Some(content) = artifact.content() else {
            return;
        };
        if !self.eligible(artifact) {
            return;
        }
        let dst = self.deployed_path(artifact, &content);
        match content.content_type {
            ContentType::Iso => {
                let Some(final_name) = content.final_name else {
                    return;
                };
                if mountpoint_shared(final_name, others) {
                    tracing::debug!("{final_name} still claimed by a sharing manifest");
                    return;
                }
                let mountpoint = self.path_in_root(final_name);
                tracing::info!("unmounting {}", mountpoint.display());
                if let Err(e) = self.system.mounts.remove(&dst, &mountpoint) {
                    session.record(EngineError::side_effect("unmount", mountpoint, e));
                }
            }
            ContentType::Rpm => {
                if package_shared(others) {
                    tracing::debug!("{} stays installed for a sharing manifest", artifact.filename);
                    return;
                }
                let name = package_name(&artifact.filename);
                match self.system.packages.is_installed(name) {
                    Ok(true) => {
                        tracing::info!("uninstalling package {name}");
                        if let Err(e) = self.system.packages.uninstall(name) {
                            session.record(EngineError::side_effect("uninstall", dst, e));
                        }
                    }
                    Ok(false) => {
                        tracing::debug!("package {name} not installed");
                    }
                    Err(e) => session.record(EngineError::side_effect("query-package", dst, e)),
                }
            }
            ContentType::File | ContentType::Pdf | ContentType::Tar | ContentType::Boot => {}
        }
    }

    /// True if a sibling reference deploys to the same payload path, in
    /// which case the file must outlive this artifact's manifest.
    pub fn payload_shared(&self, artifact: &Artifact, others: &[Artifact]) -> bool {
        let Some(content) = artifact.content() else {
            return false;
        };
        let dst = self.deployed_path(artifact, &content);
        others
            .iter()
            .any(|o| o.content().is_some_and(|c| self.deployed_path(o, &c) == dst))
    }

    /// Delete an artifact's payload file from its target directory.
    pub fn remove_file(&self, artifact: &Artifact, session: &mut Session) {
        let Some(content) = artifact.content() else {
            return;
        };
        let dst = self.deployed_path(artifact, &content);
        tracing::info!("removing {}", dst.display());
        if let Err(e) = self.system.fs.delete(&dst) {
            session.record(EngineError::side_effect("delete", dst, e));
        }
    }

    /// Delete one of an artifact's declared hard links.
    pub fn remove_hardlink(&self, link_name: &str, session: &mut Session) {
        let link = self.path_in_root(link_name);
        if let Err(e) = self.system.fs.delete(&link) {
            session.record(EngineError::side_effect("unlink", link, e));
        }
    }

    /// Recursively clear a boot artifact's target directory. Reserved
    /// for the infrastructure manifest, whose boot trees accumulate
    /// extracted state beyond the payload file itself.
    pub fn clear_boot_tree(&self, artifact: &Artifact, session: &mut Session) {
        let Some(content) = artifact.content() else {
            return;
        };
        let dir = self.path_in_root(content.target_directory);
        tracing::info!("clearing boot tree {}", dir.display());
        if let Err(e) = self.system.fs.remove_tree(&dir) {
            session.record(EngineError::side_effect("clear-tree", dir, e));
        }
    }
}

/// Package name an rpm artifact installs as: the file name without its
/// `.rpm` extension.
pub fn package_name(filename: &str) -> &str {
    filename.strip_suffix(".rpm").unwrap_or(filename)
}

/// True if a sibling iso reference mounts at the same final-name.
fn mountpoint_shared(final_name: &str, others: &[Artifact]) -> bool {
    others.iter().any(|a| {
        a.content().is_some_and(|c| {
            c.content_type == ContentType::Iso && c.final_name == Some(final_name)
        })
    })
}

/// True if a sibling rpm reference keeps the package installed.
fn package_shared(others: &[Artifact]) -> bool {
    others
        .iter()
        .any(|a| a.content().is_some_and(|c| c.content_type == ContentType::Rpm))
}
