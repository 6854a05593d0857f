//! Vcpkg integration helpers.
//!
//! This module resolves the vcpkg root from configuration and environment and
//! provides path helpers for the installed tree:
//!
//! ```text
//! <vcpkg-root>/
//! ├── vcpkg[.exe]
//! └── installed/<triplet>/
//!     ├── bin/                  # DLLs (Windows)
//!     ├── lib/                  # .so / .dylib / import libs
//!     ├── debug/{bin,lib}/      # debug copies, never harvested
//!     └── share/<port>/copyright
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::util::config::VcpkgConfig;
use crate::util::diagnostic::suggestions;
use crate::util::fs::absolute;

/// Resolved vcpkg integration settings.
#[derive(Debug, Clone)]
pub struct VcpkgIntegration {
    /// Path to the vcpkg root directory
    pub root: PathBuf,
    /// Path to the `installed` directory (usually `<root>/installed`)
    pub installed_root: PathBuf,
    /// Target triplet (e.g., x64-windows-release, x64-linux-dynamic)
    pub triplet: String,
}

impl VcpkgIntegration {
    /// Resolve vcpkg integration from config and environment.
    ///
    /// Priority for the root: config file > `VCPKG_ROOT` > `vcpkg` on PATH.
    pub fn from_config(config: &VcpkgConfig, triplet: &str) -> Result<Self> {
        let Some(root) = resolve_root(config) else {
            bail!("could not locate a vcpkg installation. {}", suggestions::NO_VCPKG);
        };
        // owned-file paths are joined onto these and must be absolute
        let root = absolute(&root)?;

        if !root.is_dir() {
            bail!(
                "vcpkg root {} does not exist. {}",
                root.display(),
                suggestions::NO_VCPKG
            );
        }

        let installed_root = match &config.installed_dir {
            Some(dir) => absolute(dir)?,
            None => root.join("installed"),
        };

        let triplet = config
            .triplet
            .clone()
            .unwrap_or_else(|| triplet.to_string());

        Ok(VcpkgIntegration {
            root,
            installed_root,
            triplet,
        })
    }

    /// Build an integration from explicit paths.
    pub fn new(root: impl Into<PathBuf>, triplet: impl Into<String>) -> Self {
        let root = root.into();
        VcpkgIntegration {
            installed_root: root.join("installed"),
            root,
            triplet: triplet.into(),
        }
    }

    /// Get the path to the vcpkg binary.
    pub fn vcpkg_binary(&self) -> PathBuf {
        let exe = if cfg!(windows) { "vcpkg.exe" } else { "vcpkg" };
        self.root.join(exe)
    }

    /// Get the installed directory for the current triplet.
    pub fn installed_dir(&self) -> PathBuf {
        self.installed_root.join(&self.triplet)
    }

    /// Directory holding shared objects on Unix.
    pub fn lib_dir(&self) -> PathBuf {
        self.installed_dir().join("lib")
    }

}

fn resolve_root(config: &VcpkgConfig) -> Option<PathBuf> {
    config
        .root
        .clone()
        .or_else(|| std::env::var_os("VCPKG_ROOT").map(PathBuf::from))
        .or_else(detect_from_path)
}

/// Find vcpkg in PATH and derive root from binary location.
fn detect_from_path() -> Option<PathBuf> {
    let vcpkg_exe = if cfg!(windows) { "vcpkg.exe" } else { "vcpkg" };

    let vcpkg_path = which::which(vcpkg_exe).ok()?;
    let vcpkg_path = vcpkg_path.canonicalize().unwrap_or(vcpkg_path);

    // vcpkg binary is at <root>/vcpkg[.exe]
    let root = vcpkg_path.parent()?;

    if is_valid_vcpkg_root(root) {
        tracing::debug!("Found vcpkg in PATH: {}", root.display());
        return Some(root.to_path_buf());
    }

    None
}

/// Validate that a directory is a valid vcpkg root.
fn is_valid_vcpkg_root(path: &Path) -> bool {
    // Check for .vcpkg-root marker file (created by vcpkg bootstrap)
    if path.join(".vcpkg-root").exists() {
        return true;
    }

    let vcpkg_exe = if cfg!(windows) { "vcpkg.exe" } else { "vcpkg" };
    path.join(vcpkg_exe).exists() && path.join("scripts").is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let v = VcpkgIntegration::new("/opt/vcpkg", "x64-linux-dynamic");
        assert_eq!(
            v.lib_dir(),
            PathBuf::from("/opt/vcpkg/installed/x64-linux-dynamic/lib")
        );
        assert_eq!(
            v.vcpkg_binary(),
            PathBuf::from(if cfg!(windows) { "/opt/vcpkg/vcpkg.exe" } else { "/opt/vcpkg/vcpkg" })
        );
    }

    #[test]
    fn test_from_config_prefers_configured_values() {
        let tmp = TempDir::new().unwrap();
        let config = VcpkgConfig {
            root: Some(tmp.path().to_path_buf()),
            installed_dir: Some(tmp.path().join("vcpkg_installed")),
            triplet: Some("x64-windows-release".to_string()),
        };

        let v = VcpkgIntegration::from_config(&config, "x64-windows").unwrap();
        assert_eq!(v.root, tmp.path());
        assert_eq!(v.triplet, "x64-windows-release");
        assert_eq!(
            v.installed_dir(),
            tmp.path().join("vcpkg_installed").join("x64-windows-release")
        );
    }

    #[test]
    fn test_from_config_makes_relative_paths_absolute() {
        // tests run from the package root, where `src` exists
        let config = VcpkgConfig {
            root: Some(PathBuf::from("src")),
            installed_dir: Some(PathBuf::from("src/installed")),
            triplet: None,
        };

        let v = VcpkgIntegration::from_config(&config, "x64-linux-dynamic").unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert!(v.root.is_absolute());
        assert_eq!(v.root, cwd.join("src"));
        assert_eq!(v.installed_root, cwd.join("src/installed"));
        assert!(v.lib_dir().is_absolute());
    }

    #[test]
    fn test_from_config_missing_root_fails() {
        let tmp = TempDir::new().unwrap();
        let config = VcpkgConfig {
            root: Some(tmp.path().join("missing")),
            ..Default::default()
        };

        let err = VcpkgIntegration::from_config(&config, "x64-linux").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_valid_root_marker() {
        let tmp = TempDir::new().unwrap();
        assert!(!is_valid_vcpkg_root(tmp.path()));
        std::fs::write(tmp.path().join(".vcpkg-root"), "").unwrap();
        assert!(is_valid_vcpkg_root(tmp.path()));
    }
}
