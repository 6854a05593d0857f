//! Package metadata from the vcpkg CLI.
//!
//! Installed packages are described by
//! `vcpkg x-package-info <port>:<triplet> --x-installed --x-json`:
//!
//! ```json
//! {
//!   "results": {
//!     "sdl2-image:x64-linux-dynamic": {
//!       "version-string": "2.8.8",
//!       "port-version": 0,
//!       "triplet": "x64-linux-dynamic",
//!       "dependencies": ["libpng:x64-linux-dynamic", "sdl2:x64-linux-dynamic"],
//!       "owns": [
//!         "x64-linux-dynamic/",
//!         "x64-linux-dynamic/lib/",
//!         "x64-linux-dynamic/lib/libSDL2_image-2.0.so.0.800.8"
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! `owns` entries are relative to the `installed` directory; entries ending in
//! `/` are directories.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;

use crate::sources::{PackageInfo, PackageInfoProvider};
use crate::util::process::ProcessBuilder;
use crate::util::vcpkg::VcpkgIntegration;

#[derive(Debug, Deserialize)]
struct PackageInfoResponse {
    #[serde(default)]
    results: HashMap<String, InstalledPackage>,
}

#[derive(Debug, Deserialize)]
struct InstalledPackage {
    #[serde(default)]
    version: Option<String>,
    #[serde(rename = "version-string", default)]
    version_string: Option<String>,
    #[serde(rename = "version-semver", default)]
    version_semver: Option<String>,
    #[serde(rename = "version-date", default)]
    version_date: Option<String>,
    #[serde(rename = "port-version", default)]
    port_version: Option<u32>,
    #[serde(default)]
    triplet: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    owns: Vec<String>,
}

impl InstalledPackage {
    /// Get the version string from any of the version fields, with the
    /// port-version appended when non-zero.
    fn display_version(&self) -> Option<String> {
        let version = self
            .version
            .as_deref()
            .or(self.version_semver.as_deref())
            .or(self.version_string.as_deref())
            .or(self.version_date.as_deref())?;

        Some(match self.port_version {
            Some(pv) if pv > 0 => format!("{}#{}", version, pv),
            _ => version.to_string(),
        })
    }
}

/// [`PackageInfoProvider`] backed by `vcpkg x-package-info`.
#[derive(Debug, Clone)]
pub struct VcpkgCliProvider {
    vcpkg: VcpkgIntegration,
    program: PathBuf,
}

impl VcpkgCliProvider {
    pub fn new(vcpkg: VcpkgIntegration) -> Self {
        let program = vcpkg.vcpkg_binary();
        VcpkgCliProvider { vcpkg, program }
    }

    /// Use a different vcpkg executable than `<root>/vcpkg`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, key: &str) -> ProcessBuilder {
        ProcessBuilder::new(&self.program)
            .arg("x-package-info")
            .arg(key)
            .arg("--x-installed")
            .arg("--x-json")
            .arg("--vcpkg-root")
            .arg(&self.vcpkg.root)
    }
}

impl PackageInfoProvider for VcpkgCliProvider {
    fn package_info(&self, name: &str, triplet: &str) -> Result<Option<PackageInfo>> {
        let key = format!("{}:{}", name, triplet);
        let output = self.command(&key).exec()?;

        if !output.status.success() {
            tracing::debug!(
                "vcpkg x-package-info {} exited with {:?}: {}",
                key,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_package_info(
            &stdout,
            name,
            triplet,
            &self.vcpkg.installed_root,
        ))
    }
}

/// Parse `x-package-info` JSON for `<name>:<triplet>`.
///
/// Invalid JSON is logged and treated as "not installed".
pub fn parse_package_info(
    json: &str,
    name: &str,
    triplet: &str,
    installed_root: &Path,
) -> Option<PackageInfo> {
    if json.trim().is_empty() {
        return None;
    }

    let response: PackageInfoResponse = match serde_json::from_str(json) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Invalid package info JSON for {}:{}: {}", name, triplet, e);
            return None;
        }
    };

    let key = format!("{}:{}", name, triplet);
    let package = response.results.get(&key).or_else(|| {
        response
            .results
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
            .map(|(_, v)| v)
    })?;

    let owned_files = package
        .owns
        .iter()
        .filter(|entry| !entry.ends_with('/'))
        .map(|entry| installed_root.join(entry))
        .collect();

    Some(PackageInfo {
        package_name: name.to_string(),
        triplet: package
            .triplet
            .clone()
            .unwrap_or_else(|| triplet.to_string()),
        version: package.display_version(),
        owned_files,
        declared_dependencies: package.dependencies.clone(),
    })
}
