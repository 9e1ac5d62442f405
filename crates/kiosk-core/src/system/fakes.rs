//! In-memory collaborators for tests.
//!
//! The fake mount table and package manager record every call so tests
//! can assert on the exact sequence of side effects an operation
//! produced without touching the host.

use super::{HostIdentity, MountEntry, MountTable, PackageManager};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Mount table held in memory. Clones share state, so a test can keep
/// a handle while the engine owns another.
#[derive(Debug, Default, Clone)]
pub struct FakeMountTable {
    entries: Arc<Mutex<Vec<MountEntry>>>,
}

impl FakeMountTable {
    /// All currently registered entries.
    pub fn entries(&self) -> Vec<MountEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl MountTable for FakeMountTable {
    fn add(&self, entry: &MountEntry) -> io::Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if !entries.contains(entry) {
            entries.push(entry.clone());
        }
        Ok(())
    }

    fn remove(&self, device: &Path, mountpoint: &Path) -> io::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .retain(|e| !(e.device == device && e.mountpoint == mountpoint));
        Ok(())
    }

    fn contains(&self, device: &Path, mountpoint: &Path) -> io::Result<bool> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.device == device && e.mountpoint == mountpoint))
    }
}

/// Package manager held in memory, keyed by install path file stem.
/// Clones share state.
#[derive(Debug, Default, Clone)]
pub struct FakePackageManager {
    installed: Arc<Mutex<Vec<String>>>,
}

impl FakePackageManager {
    /// Names of currently installed packages.
    pub fn installed(&self) -> Vec<String> {
        self.installed.lock().unwrap().clone()
    }
}

impl PackageManager for FakePackageManager {
    fn is_installed(&self, name: &str) -> io::Result<bool> {
        Ok(self.installed.lock().unwrap().iter().any(|n| n == name))
    }

    fn install(&self, path: &Path) -> io::Result<()> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| io::Error::other(format!("unnameable package {}", path.display())))?
            .to_string();
        let mut installed = self.installed.lock().unwrap();
        if !installed.contains(&name) {
            installed.push(name);
        }
        Ok(())
    }

    fn uninstall(&self, name: &str) -> io::Result<()> {
        self.installed.lock().unwrap().retain(|n| n != name);
        Ok(())
    }
}

/// Host identity fixed to a given string.
#[derive(Debug, Clone)]
pub struct FixedHost(pub String);

impl FixedHost {
    /// A host whose name satisfies the foundation usage gate.
    pub fn foundation() -> Self {
        Self(String::from("foundation0.example.com"))
    }

    /// A plain classroom host.
    pub fn classroom() -> Self {
        Self(String::from("classroom0.example.com"))
    }
}

impl HostIdentity for FixedHost {
    fn current(&self) -> String {
        self.0.clone()
    }
}
