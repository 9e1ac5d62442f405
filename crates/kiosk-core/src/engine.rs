//! Manifest-level state machine.
//!
//! The engine sequences the three manifest transitions (deploy,
//! activate, remove) over a deployment root, asking the
//! [resolver](crate::resolver) before every destructive step and
//! driving the [`Deployer`] for the actual side effects.
//!
//! Two rules shape every transition. At most one non-infrastructure
//! manifest may be Active in a deployment directory; the reserved
//! infrastructure manifest is always Active and exempt. And a manifest
//! file is only written, renamed, or deleted after all of its
//! artifacts' side effects for that transition have completed, so an
//! interrupted run leaves the manifest file describing the old state,
//! detectable by a later verification pass.

use crate::catalog::{self, CatalogEntry};
use crate::deployer::Deployer;
use crate::error::EngineError;
use crate::resolver;
use crate::session::{OpReport, Session};
use crate::system::System;
use kiosk_schema::{active_name, Artifact, ContentType, DeployState, Manifest};
use std::path::{Path, PathBuf};

/// Name of the manifests directory under the deployment root.
pub const MANIFESTS_DIR: &str = "manifests";

/// The deployment engine for one root directory.
#[derive(Debug)]
pub struct Engine {
    root: PathBuf,
    system: System,
}

impl Engine {
    /// Engine over the given root with explicit collaborators.
    pub fn new(root: impl Into<PathBuf>, system: System) -> Self {
        Self {
            root: root.into(),
            system,
        }
    }

    /// Engine over the given root, talking to the real system.
    pub fn with_real_system(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let system = System::real(&root);
        Self { root, system }
    }

    /// The deployment root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory holding deployed manifest files.
    pub fn manifests_dir(&self) -> PathBuf {
        self.root.join(MANIFESTS_DIR)
    }

    pub(crate) fn system(&self) -> &System {
        &self.system
    }

    pub(crate) fn deployer(&self) -> Deployer<'_> {
        Deployer::new(&self.root, &self.system)
    }

    /// Every deployed manifest, naturally sorted. Lenient: files with
    /// unparseable names are skipped so the listing stays usable while
    /// a broken directory is being repaired. Mutating operations go
    /// through [`Self::preflight`] instead, which refuses them.
    pub fn list(&self) -> Result<Vec<CatalogEntry>, EngineError> {
        catalog::listed_manifests(&self.manifests_dir())
    }

    /// Load and validate every deployed manifest, failing on the first
    /// invalid one. Run before any mutation so a broken sibling aborts
    /// the operation while the directory is still untouched.
    fn preflight(&self) -> Result<Vec<CatalogEntry>, EngineError> {
        let entries = catalog::all_manifests(&self.manifests_dir())?;
        for entry in &entries {
            Manifest::load(&entry.path)?;
        }
        Ok(entries)
    }

    /// Deploy a new manifest: replace any same-course predecessor,
    /// place the new artifact set, and write the manifest file last.
    ///
    /// Artifact payloads are copied out of `source_dir`. The new
    /// manifest lands Active when no other course manifest currently
    /// is, otherwise Quiesced.
    pub fn deploy(&self, manifest_path: &Path, source_dir: &Path) -> Result<OpReport, EngineError> {
        let new_manifest = Manifest::load(manifest_path)?;
        let course = new_manifest.course.name.clone();
        std::fs::create_dir_all(self.manifests_dir())?;
        let entries = self.preflight()?;

        let matches: Vec<&CatalogEntry> = entries
            .iter()
            .filter(|e| e.parsed.name == course)
            .collect();
        if matches.len() > 1 {
            return Err(EngineError::DuplicateManifest {
                course,
                matches: matches.iter().map(|e| e.file_name.clone()).collect(),
            });
        }
        let old = matches.first().copied();

        let mut session = Session::new("deploy");
        let deployer = self.deployer();
        let kept_paths: Vec<PathBuf> = entries
            .iter()
            .filter(|e| old.map_or(true, |o| e.file_name != o.file_name))
            .map(|e| e.path.clone())
            .collect();

        // Tear down the predecessor's artifacts before placing the new
        // set. Each resource check runs against the union of the new
        // manifest's artifacts and the surviving siblings, so shared
        // payloads, mounts, and packages stay in service.
        if let Some(old) = old {
            tracing::info!("replacing {}", old.file_name);
            let old_manifest = Manifest::load(&old.path)?;
            for artifact in old_manifest.content_artifacts() {
                if !deployer.eligible(artifact) {
                    continue;
                }
                for link in &artifact.hardlink_names {
                    let declared_by_new = new_manifest
                        .artifacts
                        .iter()
                        .any(|a| a.hardlink_names.contains(link));
                    if !declared_by_new && !resolver::hardlink_references(link, &kept_paths)? {
                        deployer.remove_hardlink(link, &mut session);
                    }
                }
                let mut others: Vec<Artifact> = new_manifest
                    .artifacts
                    .iter()
                    .filter(|a| a.filename == artifact.filename)
                    .cloned()
                    .collect();
                others.extend(resolver::references(&artifact.filename, &kept_paths)?);
                deployer.deactivate(artifact, &others, &mut session);
                self.tear_down_payload(
                    &deployer,
                    artifact,
                    &others,
                    old.is_infrastructure(),
                    &mut session,
                );
            }
            if let Err(e) = self.system.fs.delete(&old.path) {
                session.record(EngineError::side_effect("delete", old.path.clone(), e));
            }
        }

        let another_active = entries.iter().any(|e| {
            e.state() == DeployState::Active
                && !e.is_infrastructure()
                && old.map_or(true, |o| o.file_name != e.file_name)
        });
        let state = if kiosk_schema::is_infrastructure(&course) || !another_active {
            DeployState::Active
        } else {
            DeployState::Quiesced
        };

        for artifact in new_manifest.content_artifacts() {
            if deployer.place(artifact, source_dir, &mut session) && state == DeployState::Active {
                let others = resolver::references(&artifact.filename, &kept_paths)?;
                deployer.activate(artifact, &others, &mut session);
            }
        }

        // The manifest file is written only once all side effects are in.
        let dest = self
            .manifests_dir()
            .join(new_manifest.file_name(state).file_name());
        if let Err(e) = self.system.fs.copy(manifest_path, &dest) {
            session.record(EngineError::side_effect("write-manifest", dest, e));
        }
        Ok(session.into_report())
    }

    /// Activate a quiesced manifest, quiescing whichever course
    /// manifest is currently Active first.
    ///
    /// Activating a manifest that is already Active is a successful
    /// no-op, which makes the operation idempotent.
    pub fn activate(&self, name: &str) -> Result<OpReport, EngineError> {
        let entries = self.preflight()?;
        let target = Self::find(&entries, name)?;
        if target.state() == DeployState::Active {
            tracing::info!("{} is already active", target.file_name);
            return Ok(Session::new("activate").into_report());
        }

        let mut session = Session::new("activate");
        let deployer = self.deployer();
        let target_manifest = Manifest::load(&target.path)?;

        // Quiesce every currently Active course manifest. Resources
        // still claimed by the target or by any other remaining
        // manifest stay in service.
        for active in entries
            .iter()
            .filter(|e| e.state() == DeployState::Active && !e.is_infrastructure())
        {
            tracing::info!("quiescing {}", active.file_name);
            let remaining: Vec<PathBuf> = entries
                .iter()
                .filter(|e| {
                    e.file_name != active.file_name && e.file_name != target.file_name
                })
                .map(|e| e.path.clone())
                .collect();
            let manifest = Manifest::load(&active.path)?;
            for artifact in manifest.content_artifacts() {
                let mut others: Vec<Artifact> = target_manifest
                    .artifacts
                    .iter()
                    .filter(|a| a.filename == artifact.filename)
                    .cloned()
                    .collect();
                others.extend(resolver::references(&artifact.filename, &remaining)?);
                deployer.deactivate(artifact, &others, &mut session);
            }
            let quiesced = self
                .manifests_dir()
                .join(active.parsed.quiesced_file_name());
            if let Err(e) = self.system.fs.rename(&active.path, &quiesced) {
                session.record(EngineError::side_effect("rename", active.path.clone(), e));
            }
        }

        // The quiesce renames above changed sibling paths, so re-read
        // the directory before resolving the target's references.
        let other_paths: Vec<PathBuf> = catalog::all_manifests(&self.manifests_dir())?
            .iter()
            .filter(|e| e.file_name != target.file_name)
            .map(|e| e.path.clone())
            .collect();
        for artifact in target_manifest.content_artifacts() {
            if !deployer.eligible(artifact) {
                continue;
            }
            let Some(content) = artifact.content() else {
                continue;
            };
            let payload = deployer.deployed_path(artifact, &content);
            if !self.system.fs.exists(&payload) {
                session.record(EngineError::CorruptState(payload));
                continue;
            }
            let others = resolver::references(&artifact.filename, &other_paths)?;
            deployer.activate(artifact, &others, &mut session);
        }

        let active_path = self
            .manifests_dir()
            .join(target.parsed.active_file_name());
        if let Err(e) = self.system.fs.rename(&target.path, &active_path) {
            session.record(EngineError::side_effect("rename", target.path.clone(), e));
        }
        Ok(session.into_report())
    }

    /// Remove a deployed manifest: tear down its unreferenced artifacts
    /// and delete its file. Terminal; no other manifest is activated in
    /// its place.
    pub fn remove(&self, name: &str) -> Result<OpReport, EngineError> {
        let entries = self.preflight()?;
        let target = Self::find(&entries, name)?;
        let others: Vec<PathBuf> = entries
            .iter()
            .filter(|e| e.file_name != target.file_name)
            .map(|e| e.path.clone())
            .collect();

        let mut session = Session::new("remove");
        let deployer = self.deployer();
        let manifest = Manifest::load(&target.path)?;

        for artifact in manifest.content_artifacts() {
            if !deployer.eligible(artifact) {
                continue;
            }
            for link in &artifact.hardlink_names {
                if !resolver::hardlink_references(link, &others)? {
                    deployer.remove_hardlink(link, &mut session);
                }
            }
            let refs = resolver::references(&artifact.filename, &others)?;
            // Deactivation before deletion is convergent: unmounting an
            // unmounted iso or uninstalling an absent rpm is a no-op, so
            // quiesced manifests tear down the same way active ones do.
            deployer.deactivate(artifact, &refs, &mut session);
            self.tear_down_payload(
                &deployer,
                artifact,
                &refs,
                target.is_infrastructure(),
                &mut session,
            );
        }

        if let Err(e) = self.system.fs.delete(&target.path) {
            session.record(EngineError::side_effect("delete", target.path.clone(), e));
        }
        Ok(session.into_report())
    }

    /// Delete an artifact's payload unless a sibling in `others`
    /// deploys to the same path, clearing the whole boot tree for
    /// infrastructure boot assets. A payload already gone is corrupt
    /// state, recorded rather than silently ignored.
    fn tear_down_payload(
        &self,
        deployer: &Deployer<'_>,
        artifact: &Artifact,
        others: &[Artifact],
        infrastructure: bool,
        session: &mut Session,
    ) {
        let Some(content) = artifact.content() else {
            return;
        };
        if content.content_type == ContentType::Boot && infrastructure {
            deployer.clear_boot_tree(artifact, session);
            return;
        }
        if deployer.payload_shared(artifact, others) {
            tracing::debug!("{} payload still referenced, keeping", artifact.filename);
            return;
        }
        let payload = deployer.deployed_path(artifact, &content);
        if self.system.fs.exists(&payload) {
            deployer.remove_file(artifact, session);
        } else {
            session.record(EngineError::CorruptState(payload));
        }
    }

    /// Find a deployed manifest by name, accepting either the active or
    /// the quiesced form.
    fn find<'e>(entries: &'e [CatalogEntry], name: &str) -> Result<&'e CatalogEntry, EngineError> {
        entries
            .iter()
            .find(|e| active_name(&e.file_name) == active_name(name))
            .ok_or_else(|| EngineError::ManifestNotFound(name.to_string()))
    }
}
