//! Temporary vcpkg trees for tests.
//!
//! [`VcpkgTree`] lays out a real directory tree
//! (`<root>/installed/<triplet>/{bin,lib,share}`) so code that checks file
//! existence or symlink status sees real files, and hands out
//! [`PackageInfo`] values pointing into it.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::manifest::LibraryManifest;
use crate::core::profile::{RuntimeInfo, RuntimeProfile, SystemArtifactsConfig};
use crate::sources::PackageInfo;

/// Host triplet used for tool ports.
const HOST_TRIPLET: &str = "x64-linux";

/// A vcpkg root with an installed tree for one triplet.
pub struct VcpkgTree {
    dir: TempDir,
    triplet: String,
}

impl VcpkgTree {
    pub fn new(triplet: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let tree = VcpkgTree {
            dir,
            triplet: triplet.to_string(),
        };
        fs::write(tree.root().join(".vcpkg-root"), "").unwrap();
        for sub in ["bin", "lib", "share"] {
            fs::create_dir_all(tree.triplet_dir().join(sub)).unwrap();
        }
        tree
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn triplet(&self) -> &str {
        &self.triplet
    }

    pub fn installed_root(&self) -> PathBuf {
        self.root().join("installed")
    }

    pub fn triplet_dir(&self) -> PathBuf {
        self.installed_root().join(&self.triplet)
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.triplet_dir().join("bin")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.triplet_dir().join("lib")
    }

    /// A scratch directory outside the vcpkg tree.
    pub fn scratch_dir(&self, name: &str) -> PathBuf {
        let dir = self.root().join("scratch").join(name);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Path of a library provided by the OS (not created on disk).
    pub fn system_path(&self, name: &str) -> PathBuf {
        self.root().join("system32").join(name)
    }

    /// Write a binary into `bin` that no package owns.
    pub fn write_bin(&self, name: &str) -> PathBuf {
        write_file(&self.bin_dir().join(name), name)
    }

    /// Write a binary into `lib` that no package owns.
    pub fn write_lib(&self, name: &str) -> PathBuf {
        write_file(&self.lib_dir().join(name), name)
    }

    /// Start describing an installed package.
    pub fn package(&self, name: &str) -> PackageBuilder<'_> {
        PackageBuilder {
            tree: self,
            info: PackageInfo {
                package_name: name.to_string(),
                triplet: self.triplet.clone(),
                version: Some("1.0.0".to_string()),
                owned_files: Vec::new(),
                declared_dependencies: Vec::new(),
            },
        }
    }
}

/// Builds a package's files on disk and its [`PackageInfo`].
pub struct PackageBuilder<'a> {
    tree: &'a VcpkgTree,
    info: PackageInfo,
}

impl PackageBuilder<'_> {
    /// Own a DLL in `bin`.
    pub fn bin(self, name: &str) -> Self {
        let path = self.tree.bin_dir().join(name);
        self.owned(path)
    }

    /// Own a shared object in `lib`.
    pub fn lib(self, name: &str) -> Self {
        let path = self.tree.lib_dir().join(name);
        self.owned(path)
    }

    /// Own a symlink in `lib` pointing at `target` (relative).
    #[cfg(unix)]
    pub fn lib_symlink(mut self, name: &str, target: &str) -> Self {
        let path = self.tree.lib_dir().join(name);
        crate::util::fs::symlink(Path::new(target), &path).unwrap();
        self.info.owned_files.push(path);
        self
    }

    /// Own a debug DLL in `debug/bin`.
    pub fn debug_bin(self, name: &str) -> Self {
        let path = self.tree.triplet_dir().join("debug").join("bin").join(name);
        self.owned(path)
    }

    /// Own a non-binary file relative to the triplet directory.
    pub fn file(self, relative: &str) -> Self {
        let path = self.tree.triplet_dir().join(relative);
        self.owned(path)
    }

    /// Own `share/<package>/copyright`.
    pub fn copyright(self) -> Self {
        let relative = format!("share/{}/copyright", self.info.package_name);
        self.file(&relative)
    }

    /// Depend on another package for the same triplet.
    pub fn dep(mut self, name: &str) -> Self {
        self.info
            .declared_dependencies
            .push(format!("{}:{}", name, self.tree.triplet));
        self
    }

    /// Depend on a host tool port.
    pub fn host_dep(mut self, name: &str) -> Self {
        self.info
            .declared_dependencies
            .push(format!("{}:{}", name, HOST_TRIPLET));
        self
    }

    /// Add a dependency key verbatim.
    pub fn raw_dep(mut self, key: &str) -> Self {
        self.info.declared_dependencies.push(key.to_string());
        self
    }

    pub fn build(self) -> PackageInfo {
        self.info
    }

    fn owned(mut self, path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        write_file(&path, &name);
        self.info.owned_files.push(path);
        self
    }
}

impl From<PackageBuilder<'_>> for PackageInfo {
    fn from(builder: PackageBuilder<'_>) -> Self {
        builder.build()
    }
}

fn write_file(path: &Path, contents: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
    path.to_path_buf()
}

fn profile(rid: &str, tree: &VcpkgTree, core: Option<&LibraryManifest>) -> RuntimeProfile {
    RuntimeProfile::new(
        &RuntimeInfo::new(rid, tree.triplet()),
        &SystemArtifactsConfig::default(),
        core,
    )
    .unwrap()
}

/// `win-x64` profile for the tree's triplet with default system patterns.
pub fn windows_profile(tree: &VcpkgTree, core: Option<&LibraryManifest>) -> RuntimeProfile {
    profile("win-x64", tree, core)
}

/// `linux-x64` profile for the tree's triplet with default system patterns.
pub fn linux_profile(tree: &VcpkgTree, core: Option<&LibraryManifest>) -> RuntimeProfile {
    profile("linux-x64", tree, core)
}

/// `osx-arm64` profile for the tree's triplet with default system patterns.
pub fn osx_profile(tree: &VcpkgTree, core: Option<&LibraryManifest>) -> RuntimeProfile {
    profile("osx-arm64", tree, core)
}
