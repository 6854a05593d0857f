//! Library manifests.
//!
//! A library manifest names one redistributable native library, the vcpkg
//! port that provides it, and the file name patterns of its primary binary on
//! each OS family:
//!
//! ```toml
//! [[libraries]]
//! name = "SDL2_image"
//! vcpkg_name = "sdl2-image"
//! vcpkg_version = "2.8.8"
//!
//! [[libraries.primary_binaries]]
//! os = "windows"
//! patterns = ["SDL2_image.dll"]
//!
//! [[libraries.primary_binaries]]
//! os = "linux"
//! patterns = ["libSDL2_image*"]
//! ```

use serde::{Deserialize, Serialize};

use crate::core::profile::OsFamily;

/// One redistributable native library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryManifest {
    /// Logical library name, used for output directories
    pub name: String,

    /// vcpkg port name
    pub vcpkg_name: String,

    /// vcpkg port version (informational)
    #[serde(default)]
    pub vcpkg_version: Option<String>,

    /// vcpkg port-version (informational)
    #[serde(default)]
    pub vcpkg_port_version: Option<u32>,

    /// Upstream library name (informational)
    #[serde(default)]
    pub native_lib_name: Option<String>,

    /// Upstream library version (informational)
    #[serde(default)]
    pub native_lib_version: Option<String>,

    /// Whether satellite libraries depend on this one
    #[serde(default, rename = "core_lib")]
    pub is_core: bool,

    /// Primary binary file name patterns per OS family
    #[serde(default)]
    pub primary_binaries: Vec<PrimaryBinaries>,
}

/// Primary binary patterns for one OS family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryBinaries {
    pub os: OsFamily,
    pub patterns: Vec<String>,
}

impl LibraryManifest {
    /// Create a manifest with no primary binary patterns.
    pub fn new(name: impl Into<String>, vcpkg_name: impl Into<String>) -> Self {
        LibraryManifest {
            name: name.into(),
            vcpkg_name: vcpkg_name.into(),
            vcpkg_version: None,
            vcpkg_port_version: None,
            native_lib_name: None,
            native_lib_version: None,
            is_core: false,
            primary_binaries: Vec::new(),
        }
    }

    /// Mark this manifest as the core library.
    pub fn core(mut self) -> Self {
        self.is_core = true;
        self
    }

    /// Add primary binary patterns for an OS family.
    pub fn with_primary(mut self, os: OsFamily, patterns: &[&str]) -> Self {
        self.primary_binaries.push(PrimaryBinaries {
            os,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        });
        self
    }

    /// Primary binary patterns for an OS family, if configured.
    pub fn patterns_for(&self, os: OsFamily) -> Option<&[String]> {
        self.primary_binaries
            .iter()
            .find(|entry| entry.os == os)
            .map(|entry| entry.patterns.as_slice())
    }
}

/// The set of libraries known to a harvest configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestConfig {
    #[serde(default)]
    pub libraries: Vec<LibraryManifest>,
}

impl ManifestConfig {
    pub fn new(libraries: Vec<LibraryManifest>) -> Self {
        ManifestConfig { libraries }
    }

    /// Find a library by logical name (case-insensitive).
    pub fn find(&self, name: &str) -> Option<&LibraryManifest> {
        self.libraries
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// The core library manifest, if one is configured.
    pub fn core(&self) -> Option<&LibraryManifest> {
        self.libraries.iter().find(|m| m.is_core)
    }
}

/// Whether `file_name` matches a primary binary pattern.
///
/// Patterns are exact names or contain a single `*` splitting them into a
/// prefix and a suffix. Matching is case-insensitive.
pub fn matches_pattern(pattern: &str, file_name: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let file_name = file_name.to_ascii_lowercase();

    match pattern.split_once('*') {
        None => pattern == file_name,
        Some((prefix, suffix)) => {
            file_name.len() >= prefix.len() + suffix.len()
                && file_name.starts_with(prefix)
                && file_name.ends_with(suffix)
        }
    }
}
