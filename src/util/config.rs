//! Configuration file support.
//!
//! A harvest is driven by `Harvest.toml`, found by walking up from the
//! current directory (or passed with `--config`). Machine-local settings
//! (vcpkg root, tool paths) may also live in `~/.harvest/config.toml`; the
//! project file takes precedence.
//!
//! ```toml
//! [vcpkg]
//! root = "external/vcpkg"
//!
//! [output]
//! dir = "artifacts/harvest_output"
//!
//! [[runtimes]]
//! rid = "linux-x64"
//! triplet = "x64-linux-dynamic"
//!
//! [system_artifacts.linux]
//! patterns = ["libc.so*", "libm.so*"]
//!
//! [[libraries]]
//! name = "SDL2"
//! vcpkg_name = "sdl2"
//! core_lib = true
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::manifest::{LibraryManifest, ManifestConfig};
use crate::core::profile::{RuntimeInfo, SystemArtifactsConfig};

/// Project configuration file name.
pub const CONFIG_NAME: &str = "Harvest.toml";

/// Lowercase alias accepted for the configuration file.
pub const CONFIG_ALIAS: &str = "harvest.toml";

/// Harvest configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Vcpkg settings
    pub vcpkg: VcpkgConfig,

    /// External tool overrides
    pub tools: ToolsConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Known RID/triplet pairs
    pub runtimes: Vec<RuntimeInfo>,

    /// System libraries that are never bundled
    pub system_artifacts: SystemArtifactsConfig,

    /// Libraries that can be harvested
    pub libraries: Vec<LibraryManifest>,
}

/// Vcpkg-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VcpkgConfig {
    /// Path to the vcpkg root (falls back to VCPKG_ROOT, then PATH)
    pub root: Option<PathBuf>,

    /// Override for `<root>/installed` (manifest-mode `vcpkg_installed`)
    pub installed_dir: Option<PathBuf>,

    /// Triplet override; otherwise taken from the runtime entry
    pub triplet: Option<String>,
}

/// Paths to external tools. Unset tools are looked up on PATH.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub tar: Option<PathBuf>,
    pub ldd: Option<PathBuf>,
    pub otool: Option<PathBuf>,
    pub dumpbin: Option<PathBuf>,
}

/// Output-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output root for harvested artifacts
    pub dir: Option<PathBuf>,

    /// Write `harvest-<library>-<rid>.json` reports
    #[serde(default = "default_true")]
    pub write_reports: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: None,
            write_reports: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl HarvestConfig {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        let mut config: HarvestConfig = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;

        // relative paths are relative to the config file
        if let Some(base) = path.parent() {
            config.resolve_relative_paths(base);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load the project config and merge global machine settings under it.
    pub fn load_with_global(path: &Path) -> Result<Self> {
        let mut config = Self::load(path)?;

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                match Self::load(&global_path) {
                    Ok(global) => config.merge_machine_settings(global),
                    Err(e) => tracing::warn!(
                        "Failed to load global config from {}: {}",
                        global_path.display(),
                        e
                    ),
                }
            }
        }

        Ok(config)
    }

    /// Fill vcpkg and tool settings the project left unset from `other`.
    pub fn merge_machine_settings(&mut self, other: HarvestConfig) {
        if self.vcpkg.root.is_none() {
            self.vcpkg.root = other.vcpkg.root;
        }
        if self.vcpkg.installed_dir.is_none() {
            self.vcpkg.installed_dir = other.vcpkg.installed_dir;
        }
        if self.tools.tar.is_none() {
            self.tools.tar = other.tools.tar;
        }
        if self.tools.ldd.is_none() {
            self.tools.ldd = other.tools.ldd;
        }
        if self.tools.otool.is_none() {
            self.tools.otool = other.tools.otool;
        }
        if self.tools.dumpbin.is_none() {
            self.tools.dumpbin = other.tools.dumpbin;
        }
    }

    fn resolve_relative_paths(&mut self, base: &Path) {
        for path in [
            &mut self.vcpkg.root,
            &mut self.vcpkg.installed_dir,
            &mut self.output.dir,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        let cores: Vec<&str> = self
            .libraries
            .iter()
            .filter(|m| m.is_core)
            .map(|m| m.name.as_str())
            .collect();
        if cores.len() > 1 {
            bail!(
                "only one library may set core_lib = true (found: {})",
                cores.join(", ")
            );
        }

        for (i, lib) in self.libraries.iter().enumerate() {
            if self.libraries[..i]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&lib.name))
            {
                bail!("library `{}` is declared more than once", lib.name);
            }
        }

        Ok(())
    }

    /// The library manifests as a [`ManifestConfig`].
    pub fn manifest_config(&self) -> ManifestConfig {
        ManifestConfig::new(self.libraries.clone())
    }

    /// Runtime entry for a RID (case-insensitive).
    pub fn runtime(&self, rid: &str) -> Option<&RuntimeInfo> {
        self.runtimes
            .iter()
            .find(|r| r.rid.eq_ignore_ascii_case(rid))
    }
}

/// Find the configuration file in `start` or any parent directory.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        for name in [CONFIG_NAME, CONFIG_ALIAS] {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Get the global harvest config directory (~/.harvest).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".harvest"))
}

/// Get the global config path (~/.harvest/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profile::OsFamily;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[vcpkg]
root = "external/vcpkg"

[tools]
tar = "/usr/bin/bsdtar"

[[runtimes]]
rid = "win-x64"
triplet = "x64-windows-release"

[[runtimes]]
rid = "linux-x64"
triplet = "x64-linux-dynamic"

[system_artifacts.windows]
system_dlls = ["kernel32.dll"]

[[libraries]]
name = "SDL2"
vcpkg_name = "sdl2"
core_lib = true

[[libraries.primary_binaries]]
os = "windows"
patterns = ["SDL2.dll"]

[[libraries]]
name = "SDL2_image"
vcpkg_name = "sdl2-image"
"#;

    #[test]
    fn test_load_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_NAME);
        std::fs::write(&path, SAMPLE).unwrap();

        let config = HarvestConfig::load(&path).unwrap();
        assert_eq!(
            config.vcpkg.root,
            Some(tmp.path().join("external/vcpkg"))
        );
        assert_eq!(config.tools.tar, Some(PathBuf::from("/usr/bin/bsdtar")));
        assert_eq!(config.runtime("WIN-X64").unwrap().triplet, "x64-windows-release");
        assert!(config.runtime("osx-arm64").is_none());
        assert_eq!(
            config.system_artifacts.patterns_for(OsFamily::Windows),
            &["kernel32.dll".to_string()]
        );
        assert!(config.output.write_reports);

        let manifests = config.manifest_config();
        assert_eq!(manifests.core().unwrap().vcpkg_name, "sdl2");
    }

    #[test]
    fn test_reports_enabled_without_output_section() {
        let config: HarvestConfig = toml::from_str(
            r#"
[[libraries]]
name = "zlib"
vcpkg_name = "zlib"
"#,
        )
        .unwrap();
        assert!(config.output.write_reports);
        assert!(config.output.dir.is_none());

        let config: HarvestConfig = toml::from_str("[output]\ndir = \"out\"\n").unwrap();
        assert!(config.output.write_reports);

        let config: HarvestConfig =
            toml::from_str("[output]\nwrite_reports = false\n").unwrap();
        assert!(!config.output.write_reports);
    }

    #[test]
    fn test_two_core_libraries_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_NAME);
        std::fs::write(
            &path,
            r#"
[[libraries]]
name = "a"
vcpkg_name = "a"
core_lib = true

[[libraries]]
name = "b"
vcpkg_name = "b"
core_lib = true
"#,
        )
        .unwrap();

        let err = HarvestConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("only one library may set core_lib"));
    }

    #[test]
    fn test_duplicate_library_rejected() {
        let config: HarvestConfig = toml::from_str(
            r#"
[[libraries]]
name = "zlib"
vcpkg_name = "zlib"

[[libraries]]
name = "ZLIB"
vcpkg_name = "zlib"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_find_config_walks_up() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_NAME), "").unwrap();
        let nested = tmp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config(&nested), Some(tmp.path().join(CONFIG_NAME)));
    }

    #[test]
    fn test_merge_machine_settings_keeps_project_values() {
        let mut project = HarvestConfig::default();
        project.tools.tar = Some(PathBuf::from("gtar"));

        let mut global = HarvestConfig::default();
        global.tools.tar = Some(PathBuf::from("bsdtar"));
        global.vcpkg.root = Some(PathBuf::from("/opt/vcpkg"));

        project.merge_machine_settings(global);
        assert_eq!(project.tools.tar, Some(PathBuf::from("gtar")));
        assert_eq!(project.vcpkg.root, Some(PathBuf::from("/opt/vcpkg")));
    }
}
