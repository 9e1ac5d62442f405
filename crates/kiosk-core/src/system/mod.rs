//! Side-effecting system collaborators.
//!
//! All environment-dependent interactions (file copies, mount-table
//! edits, package installs, host identity) sit behind these narrow
//! traits so the resolver and state machine stay unit-testable against
//! fakes, with only the thin adapters in [`real`] talking to the
//! actual system.

pub mod fakes;
pub mod real;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem primitives used by the deployer.
pub trait Filesystem {
    /// Copy `src` to `dst`, creating parent directories as needed.
    fn copy(&self, src: &Path, dst: &Path) -> io::Result<()>;

    /// Delete a file if present, then prune parent directories left
    /// empty by the deletion. The manifests directory and the
    /// deployment root itself are never pruned.
    fn delete(&self, path: &Path) -> io::Result<()>;

    /// Rename `from` to `to`.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Create `link` as a hard link to `original`, creating parent
    /// directories as needed.
    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()>;

    /// Recursively delete a directory tree if present.
    fn remove_tree(&self, dir: &Path) -> io::Result<()>;

    /// True if the path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Size of a regular file in bytes.
    fn file_size(&self, path: &Path) -> io::Result<u64>;

    /// Open a file for reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn io::Read>>;
}

/// One row of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Backing device or image file.
    pub device: PathBuf,
    /// Directory the device is mounted on.
    pub mountpoint: PathBuf,
    /// Filesystem type field.
    pub fstype: String,
    /// Mount options field.
    pub options: String,
}

impl MountEntry {
    /// Loop-mount entry for a content image: `iso9660` for `.iso`
    /// files, `auto` otherwise, always read-only.
    pub fn loop_mount(device: PathBuf, mountpoint: PathBuf) -> Self {
        let fstype = if device.extension().is_some_and(|e| e == "iso") {
            "iso9660"
        } else {
            "auto"
        };
        Self {
            device,
            mountpoint,
            fstype: fstype.to_string(),
            options: "loop,ro".to_string(),
        }
    }
}

/// The system mount table.
pub trait MountTable {
    /// Register an entry and mount it. Registering an entry identical
    /// to an existing one is a no-op.
    fn add(&self, entry: &MountEntry) -> io::Result<()>;

    /// Unmount and unregister the entry for (device, mountpoint).
    fn remove(&self, device: &Path, mountpoint: &Path) -> io::Result<()>;

    /// True if an entry for (device, mountpoint) is registered.
    fn contains(&self, device: &Path, mountpoint: &Path) -> io::Result<bool>;
}

/// The host package manager.
pub trait PackageManager {
    /// True if a package with this name is currently installed.
    fn is_installed(&self, name: &str) -> io::Result<bool>;

    /// Install the package file at `path`.
    fn install(&self, path: &Path) -> io::Result<()>;

    /// Uninstall the named package.
    fn uninstall(&self, name: &str) -> io::Result<()>;
}

/// Identity of the host this engine runs on, consulted by the usage gate.
pub trait HostIdentity {
    /// The current host identity string (typically the hostname).
    fn current(&self) -> String;
}

/// Bundle of all collaborators, threaded through the engine.
pub struct System {
    /// Filesystem operations.
    pub fs: Box<dyn Filesystem>,
    /// Mount table operations.
    pub mounts: Box<dyn MountTable>,
    /// Package manager operations.
    pub packages: Box<dyn PackageManager>,
    /// Host identity source.
    pub host: Box<dyn HostIdentity>,
}

impl System {
    /// Collaborators backed by the real system: std-fs operations, the
    /// `/etc/fstab` mount table, the host package manager, and the
    /// kernel hostname.
    pub fn real(root: &Path) -> Self {
        Self {
            fs: Box::new(real::RealFilesystem::new(root)),
            mounts: Box::new(real::FstabMountTable::default()),
            packages: Box::new(real::RpmPackageManager),
            host: Box::new(real::KernelHostIdentity),
        }
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System").finish_non_exhaustive()
    }
}
