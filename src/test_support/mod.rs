//! Test utilities and fakes for harvest unit tests.
//!
//! The closure walker and planner only talk to the outside world through
//! [`PackageInfoProvider`] and [`RuntimeScanner`]. The fakes here answer from
//! memory, so tests can describe a vcpkg tree and the link graph of its
//! binaries without vcpkg, ldd or dumpbin installed.
//!
//! # Example
//!
//! ```rust,ignore
//! let tree = VcpkgTree::new("x64-windows-release");
//! let mut provider = FakePackageProvider::new();
//! provider.add(tree.package("sdl2").bin("SDL2.dll").copyright());
//!
//! let scanner = FakeScanner::new();
//! let profile = windows_profile(&tree, None);
//! let walker = BinaryClosureWalker::new(&provider, &scanner, &profile);
//! ```

pub mod fixtures;

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::scanner::RuntimeScanner;
use crate::sources::{PackageInfo, PackageInfoProvider};

// Re-export fixtures for convenience
pub use fixtures::*;

/// In-memory package index.
#[derive(Debug, Default)]
pub struct FakePackageProvider {
    packages: HashMap<String, PackageInfo>,
    failing: HashSet<String>,
    queries: RefCell<Vec<String>>,
}

impl FakePackageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an installed package.
    pub fn add(&mut self, package: impl Into<PackageInfo>) {
        let package = package.into();
        self.packages.insert(package.package_name.clone(), package);
    }

    /// Make lookups of `name` return an error.
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn was_queried(&self, name: &str) -> bool {
        self.query_count(name) > 0
    }

    pub fn query_count(&self, name: &str) -> usize {
        self.queries.borrow().iter().filter(|q| *q == name).count()
    }
}

impl PackageInfoProvider for FakePackageProvider {
    fn package_info(&self, name: &str, _triplet: &str) -> Result<Option<PackageInfo>> {
        self.queries.borrow_mut().push(name.to_string());

        if self.failing.contains(name) {
            bail!("vcpkg exited unexpectedly while querying {}", name);
        }
        Ok(self.packages.get(name).cloned())
    }
}

/// Scanner answering from a fixed link graph.
#[derive(Debug, Default)]
pub struct FakeScanner {
    deps: HashMap<PathBuf, BTreeSet<PathBuf>>,
    fail: bool,
    scanned: RefCell<Vec<PathBuf>>,
}

impl FakeScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare what `binary` links against.
    pub fn with_deps(mut self, binary: &Path, deps: &[PathBuf]) -> Self {
        self.deps
            .entry(binary.to_path_buf())
            .or_default()
            .extend(deps.iter().cloned());
        self
    }

    /// Make every scan fail as if the tool could not be started.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Binaries scanned so far, in order.
    pub fn scanned(&self) -> Vec<PathBuf> {
        self.scanned.borrow().clone()
    }
}

impl RuntimeScanner for FakeScanner {
    fn scan(&self, binary: &Path) -> Result<BTreeSet<PathBuf>> {
        self.scanned.borrow_mut().push(binary.to_path_buf());

        if self.fail {
            bail!("failed to spawn `ldd`");
        }
        Ok(self.deps.get(binary).cloned().unwrap_or_default())
    }
}
