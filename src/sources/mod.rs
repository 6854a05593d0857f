//! Package metadata sources.
//!
//! A [`PackageInfoProvider`] answers "which files does this installed package
//! own, and what does it depend on". The closure walker and the planner only
//! see this trait; [`vcpkg::VcpkgCliProvider`] is the production
//! implementation.

pub mod vcpkg;

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

pub use vcpkg::VcpkgCliProvider;

/// Installed package metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    pub package_name: String,
    pub triplet: String,
    pub version: Option<String>,

    /// Absolute paths of owned files, in the order the index lists them.
    /// Directory entries are not included.
    pub owned_files: Vec<PathBuf>,

    /// Dependency keys of the form `<package>:<triplet>`
    pub declared_dependencies: Vec<String>,
}

/// Source of installed package metadata.
pub trait PackageInfoProvider {
    /// Look up an installed package.
    ///
    /// Returns `Ok(None)` when the package is not installed for `triplet`.
    /// `Err` is reserved for failures to query the index at all.
    fn package_info(&self, name: &str, triplet: &str) -> Result<Option<PackageInfo>>;
}

impl<P: PackageInfoProvider + ?Sized> PackageInfoProvider for &P {
    fn package_info(&self, name: &str, triplet: &str) -> Result<Option<PackageInfo>> {
        (**self).package_info(name, triplet)
    }
}
