//! Runtime profiles.
//!
//! A [`RuntimeProfile`] pins one harvest run to a target platform: the RID
//! (`win-x64`, `linux-arm64`, ...), the vcpkg triplet that provides its
//! binaries, the OS family that decides scanner and packaging strategy, and
//! the set of system libraries that must never be bundled.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::core::errors::ProfileError;
use crate::core::manifest::LibraryManifest;

/// Compiled-size cap for system library patterns.
const PATTERN_SIZE_LIMIT: usize = 1 << 16;

/// Operating system family of a runtime identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OsFamily {
    #[serde(rename = "windows", alias = "Windows")]
    Windows,
    #[serde(rename = "linux", alias = "Linux")]
    Linux,
    #[serde(rename = "osx", alias = "OSX", alias = "macos", alias = "macOS")]
    Osx,
}

impl OsFamily {
    /// Derive the OS family from a RID prefix.
    pub fn from_rid(rid: &str) -> Result<Self, ProfileError> {
        let lower = rid.to_ascii_lowercase();
        if lower.starts_with("win-") {
            Ok(OsFamily::Windows)
        } else if lower.starts_with("linux-") {
            Ok(OsFamily::Linux)
        } else if lower.starts_with("osx-") {
            Ok(OsFamily::Osx)
        } else {
            Err(ProfileError::UnsupportedRid {
                rid: rid.to_string(),
            })
        }
    }

    pub fn is_unix(self) -> bool {
        !matches!(self, OsFamily::Windows)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OsFamily::Windows => "windows",
            OsFamily::Linux => "linux",
            OsFamily::Osx => "osx",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" | "win" => Ok(OsFamily::Windows),
            "linux" => Ok(OsFamily::Linux),
            "osx" | "macos" => Ok(OsFamily::Osx),
            _ => Err(format!(
                "invalid OS family '{}'; expected 'windows', 'linux', or 'osx'",
                s
            )),
        }
    }
}

/// A RID and the vcpkg triplet that provides it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub rid: String,
    pub triplet: String,
}

impl RuntimeInfo {
    pub fn new(rid: impl Into<String>, triplet: impl Into<String>) -> Self {
        RuntimeInfo {
            rid: rid.into(),
            triplet: triplet.into(),
        }
    }
}

/// Per-family file name patterns of libraries provided by the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemArtifactsConfig {
    pub windows: SystemPatterns,
    pub linux: SystemPatterns,
    pub osx: SystemPatterns,
}

/// File name patterns: exact names or single-`*` globs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPatterns {
    #[serde(default, alias = "system_dlls", alias = "system_libraries")]
    pub patterns: Vec<String>,
}

impl SystemPatterns {
    fn from_slice(patterns: &[&str]) -> Self {
        SystemPatterns {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Default for SystemArtifactsConfig {
    fn default() -> Self {
        SystemArtifactsConfig {
            windows: SystemPatterns::from_slice(&[
                "kernel32.dll",
                "user32.dll",
                "gdi32.dll",
                "advapi32.dll",
                "shell32.dll",
                "ole32.dll",
                "oleaut32.dll",
                "comdlg32.dll",
                "shlwapi.dll",
                "ws2_32.dll",
                "winmm.dll",
                "imm32.dll",
                "version.dll",
                "setupapi.dll",
                "cfgmgr32.dll",
                "hid.dll",
                "rpcrt4.dll",
                "secur32.dll",
                "bcrypt.dll",
                "crypt32.dll",
                "dwmapi.dll",
                "uxtheme.dll",
                "dxgi.dll",
                "d3d*.dll",
                "opengl32.dll",
                "msvcrt.dll",
                "ucrtbase.dll",
                "vcruntime140*.dll",
                "msvcp140*.dll",
                "api-ms-win-*.dll",
                "ext-ms-*.dll",
            ]),
            linux: SystemPatterns::from_slice(&[
                "linux-vdso.so*",
                "ld-linux*.so*",
                "libc.so*",
                "libm.so*",
                "libdl.so*",
                "librt.so*",
                "libpthread.so*",
                "libgcc_s.so*",
                "libstdc++.so*",
                "libX11.so*",
                "libxcb.so*",
                "libGL.so*",
                "libasound.so*",
                "libpulse.so*",
            ]),
            osx: SystemPatterns::from_slice(&[
                "libSystem*.dylib",
                "libc++*.dylib",
                "libobjc*.dylib",
                "libiconv*.dylib",
            ]),
        }
    }
}

impl SystemArtifactsConfig {
    pub fn patterns_for(&self, os: OsFamily) -> &[String] {
        match os {
            OsFamily::Windows => &self.windows.patterns,
            OsFamily::Linux => &self.linux.patterns,
            OsFamily::Osx => &self.osx.patterns,
        }
    }
}

/// A compiled system library pattern.
#[derive(Debug, Clone)]
pub enum SystemFileMatcher {
    /// Case-insensitive exact file name.
    Exact(String),
    /// Anchored case-insensitive regex compiled from a wildcard pattern.
    Wildcard(Regex),
}

impl SystemFileMatcher {
    /// Compile a pattern.
    pub fn compile(pattern: &str) -> Result<Self, ProfileError> {
        if !pattern.contains('*') {
            return Ok(SystemFileMatcher::Exact(pattern.to_ascii_lowercase()));
        }

        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        let regex = RegexBuilder::new(&format!("^{}$", body))
            .case_insensitive(true)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
            .map_err(|e| ProfileError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;

        Ok(SystemFileMatcher::Wildcard(regex))
    }

    pub fn is_match(&self, file_name: &str) -> bool {
        match self {
            SystemFileMatcher::Exact(name) => name.eq_ignore_ascii_case(file_name),
            SystemFileMatcher::Wildcard(regex) => regex.is_match(file_name),
        }
    }
}

/// Target platform settings for one harvest run.
#[derive(Debug, Clone)]
pub struct RuntimeProfile {
    rid: String,
    triplet: String,
    os_family: OsFamily,
    system_matchers: Vec<SystemFileMatcher>,
    core_lib_name: Option<String>,
}

impl RuntimeProfile {
    /// Build a profile for `runtime`.
    ///
    /// `core` is the core library manifest, if the configuration has one;
    /// its first primary binary pattern for this OS family becomes
    /// [`core_lib_name`](Self::core_lib_name).
    pub fn new(
        runtime: &RuntimeInfo,
        system_artifacts: &SystemArtifactsConfig,
        core: Option<&LibraryManifest>,
    ) -> Result<Self, ProfileError> {
        let os_family = OsFamily::from_rid(&runtime.rid)?;

        let system_matchers = system_artifacts
            .patterns_for(os_family)
            .iter()
            .map(|p| SystemFileMatcher::compile(p))
            .collect::<Result<Vec<_>, _>>()?;

        let core_lib_name = core
            .and_then(|m| m.patterns_for(os_family))
            .and_then(|patterns| patterns.first().cloned());

        tracing::debug!(
            "Runtime profile: rid={} triplet={} os={} ({} system patterns)",
            runtime.rid,
            runtime.triplet,
            os_family,
            system_matchers.len()
        );

        Ok(RuntimeProfile {
            rid: runtime.rid.clone(),
            triplet: runtime.triplet.clone(),
            os_family,
            system_matchers,
            core_lib_name,
        })
    }

    pub fn rid(&self) -> &str {
        &self.rid
    }

    pub fn triplet(&self) -> &str {
        &self.triplet
    }

    pub fn os_family(&self) -> OsFamily {
        self.os_family
    }

    /// Primary binary name of the core library on this platform.
    pub fn core_lib_name(&self) -> Option<&str> {
        self.core_lib_name.as_deref()
    }

    /// Whether the file is provided by the operating system.
    pub fn is_system_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy();
        self.system_matchers.iter().any(|m| m.is_match(&name))
    }

    /// RID of the machine this process runs on.
    pub fn host_rid() -> Option<String> {
        let os = match std::env::consts::OS {
            "windows" => "win",
            "linux" => "linux",
            "macos" => "osx",
            _ => return None,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "x64",
            "x86" => "x86",
            "aarch64" => "arm64",
            "arm" => "arm",
            _ => return None,
        };
        Some(format!("{}-{}", os, arch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::LibraryManifest;

    fn profile(rid: &str, patterns: &[&str]) -> RuntimeProfile {
        let mut artifacts = SystemArtifactsConfig::default();
        let patterns = SystemPatterns::from_slice(patterns);
        artifacts.windows = patterns.clone();
        artifacts.linux = patterns.clone();
        artifacts.osx = patterns;
        RuntimeProfile::new(&RuntimeInfo::new(rid, "x64-test"), &artifacts, None).unwrap()
    }

    #[test]
    fn test_os_family_from_rid() {
        assert_eq!(OsFamily::from_rid("win-x64").unwrap(), OsFamily::Windows);
        assert_eq!(OsFamily::from_rid("WIN-arm64").unwrap(), OsFamily::Windows);
        assert_eq!(OsFamily::from_rid("linux-x64").unwrap(), OsFamily::Linux);
        assert_eq!(OsFamily::from_rid("osx-arm64").unwrap(), OsFamily::Osx);
    }

    #[test]
    fn test_unsupported_rid_fails() {
        let err = RuntimeProfile::new(
            &RuntimeInfo::new("freebsd-x64", "x64-freebsd"),
            &SystemArtifactsConfig::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ProfileError::UnsupportedRid { ref rid } if rid == "freebsd-x64"));
    }

    #[test]
    fn test_exact_system_match_is_case_insensitive() {
        let p = profile("win-x64", &["kernel32.dll"]);
        assert!(p.is_system_file(Path::new("C:/Windows/System32/KERNEL32.DLL")));
        assert!(!p.is_system_file(Path::new("C:/vcpkg/bin/kernel32.dll.bak")));
    }

    #[test]
    fn test_wildcard_system_match_is_anchored() {
        let p = profile("linux-x64", &["libc.so*", "api-ms-win-*.dll"]);
        assert!(p.is_system_file(Path::new("/lib/x86_64-linux-gnu/libc.so.6")));
        assert!(p.is_system_file(Path::new("API-MS-WIN-CRT-RUNTIME-L1-1-0.dll")));
        assert!(!p.is_system_file(Path::new("/opt/libcurl.so.4")));
        assert!(!p.is_system_file(Path::new("mylibc.so.6")));
    }

    #[test]
    fn test_pattern_metacharacters_are_literal() {
        let p = profile("linux-x64", &["libstdc++.so*"]);
        assert!(p.is_system_file(Path::new("libstdc++.so.6")));
        assert!(!p.is_system_file(Path::new("libstdcc.so.6")));
    }

    #[test]
    fn test_core_lib_name_uses_first_pattern() {
        let core = LibraryManifest::new("SDL2", "sdl2")
            .core()
            .with_primary(OsFamily::Windows, &["SDL2.dll", "SDL2d.dll"])
            .with_primary(OsFamily::Linux, &["libSDL2*"]);

        let p = RuntimeProfile::new(
            &RuntimeInfo::new("win-x64", "x64-windows-release"),
            &SystemArtifactsConfig::default(),
            Some(&core),
        )
        .unwrap();
        assert_eq!(p.core_lib_name(), Some("SDL2.dll"));

        let p = RuntimeProfile::new(
            &RuntimeInfo::new("osx-x64", "x64-osx"),
            &SystemArtifactsConfig::default(),
            Some(&core),
        )
        .unwrap();
        assert_eq!(p.core_lib_name(), None);
    }

    #[test]
    fn test_system_patterns_accept_legacy_keys() {
        let toml = r#"
[windows]
system_dlls = ["kernel32.dll"]

[linux]
system_libraries = ["libc.so*"]
"#;
        let config: SystemArtifactsConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.windows.patterns, vec!["kernel32.dll"]);
        assert_eq!(config.linux.patterns, vec!["libc.so*"]);
        // missing table falls back to defaults
        assert!(!config.osx.patterns.is_empty());
    }
}
