//! Thin adapters talking to the actual system.
//!
//! These implementations are deliberately shallow: every decision about
//! *whether* to copy, mount, install, or delete is made by the deployer
//! and the resolver; this module only executes the resulting action.

use super::{Filesystem, HostIdentity, MountEntry, MountTable, PackageManager};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Standard-library filesystem operations scoped to a deployment root.
#[derive(Debug)]
pub struct RealFilesystem {
    root: PathBuf,
}

impl RealFilesystem {
    /// Filesystem adapter whose empty-directory pruning stops at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Remove parent directories left empty after a deletion, walking
    /// up until the root, the manifests directory, or a non-empty
    /// directory is reached.
    fn prune_empty_parents(&self, path: &Path) {
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == self.root || d.file_name().is_some_and(|n| n == "manifests") {
                break;
            }
            let empty = std::fs::read_dir(d)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if !empty || std::fs::remove_dir(d).is_err() {
                break;
            }
            tracing::debug!("pruned empty directory {}", d.display());
            dir = d.parent();
        }
    }
}

impl Filesystem for RealFilesystem {
    fn copy(&self, src: &Path, dst: &Path) -> io::Result<()> {
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(src, dst)?;
        Ok(())
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        if !path.exists() {
            tracing::debug!("not deleting {} - does not exist", path.display());
            return Ok(());
        }
        std::fs::remove_file(path)?;
        tracing::debug!("deleted {}", path.display());
        self.prune_empty_parents(path);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()> {
        if let Some(parent) = link.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::hard_link(original, link)
    }

    fn remove_tree(&self, dir: &Path) -> io::Result<()> {
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn io::Read>> {
        Ok(Box::new(std::fs::File::open(path)?))
    }
}

/// Mount table persisted in an fstab-format file, mounted via the
/// system `mount`/`umount` tools.
#[derive(Debug)]
pub struct FstabMountTable {
    table_path: PathBuf,
}

impl Default for FstabMountTable {
    fn default() -> Self {
        Self::new("/etc/fstab")
    }
}

impl FstabMountTable {
    /// Mount table backed by the given fstab-format file.
    pub fn new(table_path: impl Into<PathBuf>) -> Self {
        Self {
            table_path: table_path.into(),
        }
    }

    fn format_line(entry: &MountEntry) -> String {
        format!(
            "{}   {}   {}   {}   0 0",
            entry.device.display(),
            entry.mountpoint.display(),
            entry.fstype,
            entry.options
        )
    }

    fn read_lines(&self) -> io::Result<Vec<String>> {
        if !self.table_path.exists() {
            return Ok(Vec::new());
        }
        Ok(std::fs::read_to_string(&self.table_path)?
            .lines()
            .map(str::to_string)
            .collect())
    }

    fn matches(line: &str, device: &Path, mountpoint: &Path) -> bool {
        let mut fields = line.split_whitespace();
        fields.next().is_some_and(|d| Path::new(d) == device)
            && fields.next().is_some_and(|m| Path::new(m) == mountpoint)
    }
}

impl MountTable for FstabMountTable {
    fn add(&self, entry: &MountEntry) -> io::Result<()> {
        std::fs::create_dir_all(&entry.mountpoint)?;
        let line = Self::format_line(entry);
        let mut lines = self.read_lines()?;
        if !lines.iter().any(|l| l == &line) {
            lines.push(line);
            std::fs::write(&self.table_path, lines.join("\n") + "\n")?;
        }
        run("mount", &[std::ffi::OsStr::new("-a")])
    }

    fn remove(&self, device: &Path, mountpoint: &Path) -> io::Result<()> {
        // Unmount failures for something that was never mounted are
        // expected; the table edit below is what must succeed.
        if let Err(e) = run("umount", &[mountpoint.as_os_str()]) {
            tracing::debug!("umount {}: {e}", mountpoint.display());
        }
        let lines = self.read_lines()?;
        let kept: Vec<&String> = lines
            .iter()
            .filter(|l| !Self::matches(l, device, mountpoint))
            .collect();
        if kept.len() != lines.len() {
            let mut out = kept
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            out.push('\n');
            std::fs::write(&self.table_path, out)?;
        }
        if mountpoint.is_dir() {
            if let Err(e) = std::fs::remove_dir(mountpoint) {
                tracing::debug!("mountpoint {} not removed: {e}", mountpoint.display());
            }
        }
        Ok(())
    }

    fn contains(&self, device: &Path, mountpoint: &Path) -> io::Result<bool> {
        Ok(self
            .read_lines()?
            .iter()
            .any(|l| Self::matches(l, device, mountpoint)))
    }
}

/// Package manager shelling out to `rpm`/`dnf`.
#[derive(Debug, Clone, Copy)]
pub struct RpmPackageManager;

impl PackageManager for RpmPackageManager {
    fn is_installed(&self, name: &str) -> io::Result<bool> {
        let status = Command::new("rpm").args(["-q", name]).output()?;
        Ok(status.status.success())
    }

    fn install(&self, path: &Path) -> io::Result<()> {
        run(
            "dnf",
            &[
                std::ffi::OsStr::new("-y"),
                std::ffi::OsStr::new("install"),
                path.as_os_str(),
            ],
        )
    }

    fn uninstall(&self, name: &str) -> io::Result<()> {
        run(
            "dnf",
            &[
                std::ffi::OsStr::new("-y"),
                std::ffi::OsStr::new("remove"),
                std::ffi::OsStr::new(name),
            ],
        )
    }
}

/// Host identity read from the kernel hostname.
#[derive(Debug, Clone, Copy)]
pub struct KernelHostIdentity;

impl HostIdentity for KernelHostIdentity {
    fn current(&self) -> String {
        std::fs::read_to_string("/proc/sys/kernel/hostname")
            .or_else(|_| std::fs::read_to_string("/etc/hostname"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }
}

/// Run a command to completion, mapping a non-zero exit into an error
/// carrying the captured stderr.
fn run(program: &str, args: &[&std::ffi::OsStr]) -> io::Result<()> {
    let output = Command::new(program).args(args).output()?;
    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(io::Error::other(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_prunes_empty_directories_up_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let fs = RealFilesystem::new(root);
        let file = root.join("content/course/sub/file.txt");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"x").unwrap();

        fs.delete(&file).unwrap();
        assert!(!root.join("content").exists());
        assert!(root.exists());
    }

    #[test]
    fn delete_leaves_non_empty_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let fs = RealFilesystem::new(root);
        let a = root.join("content/a.txt");
        let b = root.join("content/b.txt");
        std::fs::create_dir_all(root.join("content")).unwrap();
        std::fs::write(&a, b"x").unwrap();
        std::fs::write(&b, b"y").unwrap();

        fs.delete(&a).unwrap();
        assert!(root.join("content").exists());
        assert!(b.exists());
    }

    #[test]
    fn delete_never_prunes_the_manifests_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let fs = RealFilesystem::new(root);
        let mf = root.join("manifests/OLD-T-1-ILT-1-en_US.cmf");
        std::fs::create_dir_all(mf.parent().unwrap()).unwrap();
        std::fs::write(&mf, b"x").unwrap();

        fs.delete(&mf).unwrap();
        assert!(root.join("manifests").exists());
    }

    #[test]
    fn delete_of_missing_file_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFilesystem::new(dir.path());
        fs.delete(&dir.path().join("nope")).unwrap();
    }

    #[test]
    fn copy_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let fs = RealFilesystem::new(root);
        let src = root.join("src.txt");
        std::fs::write(&src, b"payload").unwrap();

        let dst = root.join("deep/nested/dst.txt");
        fs.copy(&src, &dst).unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"payload");
    }

    #[test]
    fn hard_link_shares_the_inode() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let fs = RealFilesystem::new(root);
        let orig = root.join("orig.bin");
        std::fs::write(&orig, b"data").unwrap();

        let link = root.join("links/alias.bin");
        fs.hard_link(&orig, &link).unwrap();
        std::fs::write(&orig, b"changed").unwrap();
        assert_eq!(std::fs::read(&link).unwrap(), b"changed");
    }

    #[test]
    fn fstab_line_roundtrip_and_matching() {
        let entry = MountEntry::loop_mount(
            PathBuf::from("/content/course/disk.iso"),
            PathBuf::from("/content/mount/course"),
        );
        let line = FstabMountTable::format_line(&entry);
        assert!(FstabMountTable::matches(
            &line,
            Path::new("/content/course/disk.iso"),
            Path::new("/content/mount/course"),
        ));
        assert!(!FstabMountTable::matches(
            &line,
            Path::new("/content/course/disk.iso"),
            Path::new("/content/mount/other"),
        ));
    }
}
