//! Binary closure of a library.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Owner recorded for binaries whose package could not be inferred.
pub const UNKNOWN_PACKAGE: &str = "unknown";

/// One binary in a closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryNode {
    /// Absolute path of the binary
    pub path: PathBuf,

    /// Package whose ownership metadata lists the file, or the inferred
    /// package for binaries found only by a runtime scan
    pub owner_package: String,

    /// Package at the point in the package-level walk where this binary was
    /// first reachable
    pub origin_package: String,
}

impl BinaryNode {
    pub fn new(
        path: impl Into<PathBuf>,
        owner_package: impl Into<String>,
        origin_package: impl Into<String>,
    ) -> Self {
        BinaryNode {
            path: path.into(),
            owner_package: owner_package.into(),
            origin_package: origin_package.into(),
        }
    }
}

/// Every binary a library needs at runtime.
///
/// `nodes` has one entry per distinct path, in discovery order. `packages` is
/// every package reached by the package-level walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryClosure {
    pub primary_binaries: Vec<PathBuf>,
    pub nodes: Vec<BinaryNode>,
    pub packages: BTreeSet<String>,
}

impl BinaryClosure {
    pub fn is_primary(&self, path: &Path) -> bool {
        self.primary_binaries.iter().any(|p| p == path)
    }

    pub fn all_binaries(&self) -> impl Iterator<Item = &Path> {
        self.nodes.iter().map(|n| n.path.as_path())
    }

    pub fn node(&self, path: &Path) -> Option<&BinaryNode> {
        self.nodes.iter().find(|n| n.path == path)
    }
}
