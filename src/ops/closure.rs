//! Binary closure resolution.
//!
//! The closure of a library is every shared binary it needs at runtime. It is
//! computed in two phases:
//!
//! 1. **Package walk**: breadth-first over vcpkg package metadata starting at
//!    the library's port. Every binary a visited package owns becomes a node.
//! 2. **Binary walk**: breadth-first over the binaries found so far, asking
//!    the platform scanner what each one links against. Anything new that is
//!    not a system library becomes a node and is scanned in turn. This
//!    catches dependencies that package metadata does not declare.
//!
//! Each node remembers its *origin*, the package through which it became
//! reachable, so the planner can drop everything that came in through the
//! core library.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};

use crate::core::closure::{BinaryClosure, BinaryNode, UNKNOWN_PACKAGE};
use crate::core::errors::ClosureError;
use crate::core::manifest::{matches_pattern, LibraryManifest};
use crate::core::profile::{OsFamily, RuntimeProfile};
use crate::scanner::RuntimeScanner;
use crate::sources::{PackageInfo, PackageInfoProvider};
use crate::util::cancel::CancellationToken;
use crate::util::fs::{absolute, file_name_str, is_symlink};

/// Multi-word library families whose file names do not match their port.
const LIBRARY_FAMILIES: &[(&str, &str)] = &[
    ("sdl2_image", "sdl2-image"),
    ("sdl2_mixer", "sdl2-mixer"),
    ("sdl2_ttf", "sdl2-ttf"),
    ("sdl2_gfx", "sdl2-gfx"),
    ("sdl2_net", "sdl2-net"),
    ("sdl2", "sdl2"),
];

/// Computes binary closures for one runtime profile.
pub struct BinaryClosureWalker<'a, P: ?Sized, S: ?Sized> {
    provider: &'a P,
    scanner: &'a S,
    profile: &'a RuntimeProfile,
}

impl<'a, P, S> BinaryClosureWalker<'a, P, S>
where
    P: PackageInfoProvider + ?Sized,
    S: RuntimeScanner + ?Sized,
{
    pub fn new(provider: &'a P, scanner: &'a S, profile: &'a RuntimeProfile) -> Self {
        BinaryClosureWalker {
            provider,
            scanner,
            profile,
        }
    }

    /// Compute the closure of `manifest`'s vcpkg package.
    pub fn build_closure(
        &self,
        manifest: &LibraryManifest,
        cancel: &CancellationToken,
    ) -> Result<BinaryClosure, ClosureError> {
        cancel.check()?;

        let root = manifest.vcpkg_name.as_str();
        let triplet = self.profile.triplet();

        let root_info = match self.provider.package_info(root, triplet) {
            Ok(Some(info)) => with_absolute_paths(info),
            Ok(None) => {
                return Err(ClosureError::NotFound {
                    package: root.to_string(),
                    triplet: triplet.to_string(),
                })
            }
            Err(e) => {
                return Err(ClosureError::failed_with(
                    format!("failed to query package info for `{}:{}`", root, triplet),
                    e,
                ))
            }
        };

        let primary_binaries = self.resolve_primary_binaries(manifest, &root_info)?;

        let mut nodes = NodeSet::new(self.profile.os_family());
        let packages = self.walk_packages(root_info, &mut nodes, cancel)?;
        self.walk_binaries(&mut nodes, &packages, cancel)?;

        let closure = BinaryClosure {
            primary_binaries,
            nodes: nodes.into_nodes(),
            packages,
        };

        tracing::info!(
            "Closure of {}: {} binaries across {} packages",
            manifest.name,
            closure.nodes.len(),
            closure.packages.len()
        );

        Ok(closure)
    }

    /// Pick the primary binary for every pattern of the profile's OS family.
    fn resolve_primary_binaries(
        &self,
        manifest: &LibraryManifest,
        root_info: &PackageInfo,
    ) -> Result<Vec<PathBuf>, ClosureError> {
        let os = self.profile.os_family();

        let Some(patterns) = manifest.patterns_for(os) else {
            return Err(ClosureError::failed(format!(
                "library `{}` has no primary binary patterns for {}",
                manifest.name, os
            )));
        };

        let binaries: Vec<&PathBuf> = root_info
            .owned_files
            .iter()
            .filter(|path| is_binary_for(os, path))
            .collect();

        let mut primaries: Vec<PathBuf> = Vec::new();
        for pattern in patterns {
            let candidates: Vec<&PathBuf> = binaries
                .iter()
                .copied()
                .filter(|path| pattern_admits(os, pattern, &file_name_str(path)))
                .filter(|path| path.exists())
                .collect();

            let chosen = if os.is_unix() {
                pick_unix_primary(&candidates)
            } else {
                candidates.first().copied()
            };

            match chosen {
                Some(path) => {
                    tracing::debug!("Primary binary for `{}`: {}", pattern, path.display());
                    if !primaries.contains(path) {
                        primaries.push(path.clone());
                    }
                }
                None => tracing::debug!(
                    "No binary of {} matched primary pattern `{}`",
                    manifest.vcpkg_name,
                    pattern
                ),
            }
        }

        if primaries.is_empty() {
            return Err(ClosureError::failed(format!(
                "primary binary ({}) not found for {}:{}",
                patterns.join(", "),
                manifest.vcpkg_name,
                root_info.triplet
            )));
        }

        Ok(primaries)
    }

    /// Phase A: breadth-first walk over declared package dependencies.
    fn walk_packages(
        &self,
        root_info: PackageInfo,
        nodes: &mut NodeSet,
        cancel: &CancellationToken,
    ) -> Result<BTreeSet<String>, ClosureError> {
        let os = self.profile.os_family();
        let root = root_info.package_name.clone();

        let mut visited: HashSet<String> = HashSet::new();
        let mut packages: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<QueuedPackage> = VecDeque::new();

        queue.push_back(QueuedPackage {
            name: root.clone(),
            triplet: root_info.triplet.clone(),
            origin: root.clone(),
        });
        let mut root_info = Some(root_info);

        while let Some(entry) = queue.pop_front() {
            cancel.check()?;

            if !visited.insert(entry.name.to_ascii_lowercase()) {
                continue;
            }

            let info = match root_info.take() {
                Some(info) => info,
                None => match self.provider.package_info(&entry.name, &entry.triplet) {
                    Ok(Some(info)) => with_absolute_paths(info),
                    Ok(None) => {
                        tracing::warn!(
                            "Skipping dependency {}:{} (not installed)",
                            entry.name,
                            entry.triplet
                        );
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Skipping dependency {}:{}: {:#}",
                            entry.name,
                            entry.triplet,
                            e
                        );
                        continue;
                    }
                },
            };

            packages.insert(entry.name.clone());

            for path in info.owned_files.iter().filter(|p| is_binary_for(os, p)) {
                if nodes.contains(path) {
                    continue;
                }
                tracing::debug!("  {} (owner {}, via {})", path.display(), entry.name, entry.origin);
                nodes.push(BinaryNode::new(path.clone(), &entry.name, &entry.origin));
            }

            for key in &info.declared_dependencies {
                let Some((name, triplet)) = split_dependency_key(key) else {
                    tracing::debug!("Ignoring dependency `{}` of {}", key, entry.name);
                    continue;
                };
                if visited.contains(&name.to_ascii_lowercase()) {
                    continue;
                }
                queue.push_back(QueuedPackage {
                    name: name.to_string(),
                    triplet: triplet.to_string(),
                    origin: entry.name.clone(),
                });
            }
        }

        Ok(packages)
    }

    /// Phase B: breadth-first walk over what binaries actually link against.
    fn walk_binaries(
        &self,
        nodes: &mut NodeSet,
        packages: &BTreeSet<String>,
        cancel: &CancellationToken,
    ) -> Result<(), ClosureError> {
        let os = self.profile.os_family();
        let mut queue: VecDeque<usize> = (0..nodes.len()).collect();

        while let Some(index) = queue.pop_front() {
            cancel.check()?;

            let (binary, origin) = {
                let node = nodes.get(index);
                (node.path.clone(), node.origin_package.clone())
            };

            let deps = self.scanner.scan(&binary).map_err(|e| {
                ClosureError::failed_with(format!("failed to scan {}", binary.display()), e)
            })?;

            for dep in deps {
                if self.profile.is_system_file(&dep) || nodes.contains(&dep) {
                    continue;
                }

                let owner = infer_package_from_path(&dep, os, packages)
                    .unwrap_or_else(|| UNKNOWN_PACKAGE.to_string());
                tracing::debug!(
                    "  {} (needed by {}, owner {})",
                    dep.display(),
                    binary.display(),
                    owner
                );

                queue.push_back(nodes.push(BinaryNode::new(dep, owner, &origin)));
            }
        }

        Ok(())
    }
}

/// Scanners report absolute paths; owned files must compare equal to them.
fn with_absolute_paths(mut info: PackageInfo) -> PackageInfo {
    for path in &mut info.owned_files {
        if let Ok(abs) = absolute(path) {
            *path = abs;
        }
    }
    info
}

struct QueuedPackage {
    name: String,
    triplet: String,
    origin: String,
}

/// Insertion-ordered nodes with a path index.
///
/// Windows paths are compared case-insensitively.
struct NodeSet {
    os: OsFamily,
    nodes: Vec<BinaryNode>,
    index: HashMap<String, usize>,
}

impl NodeSet {
    fn new(os: OsFamily) -> Self {
        NodeSet {
            os,
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn key(&self, path: &Path) -> String {
        let key = path.to_string_lossy();
        if self.os.is_unix() {
            key.into_owned()
        } else {
            key.to_lowercase()
        }
    }

    fn contains(&self, path: &Path) -> bool {
        self.index.contains_key(&self.key(path))
    }

    fn push(&mut self, node: BinaryNode) -> usize {
        let key = self.key(&node.path);
        let index = self.nodes.len();
        self.index.insert(key, index);
        self.nodes.push(node);
        index
    }

    fn get(&self, index: usize) -> &BinaryNode {
        &self.nodes[index]
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn into_nodes(self) -> Vec<BinaryNode> {
        self.nodes
    }
}

/// Split `<package>:<triplet>`. Host tool ports (`vcpkg-*`) and malformed
/// keys yield `None`.
pub fn split_dependency_key(key: &str) -> Option<(&str, &str)> {
    if key.starts_with("vcpkg-") {
        return None;
    }
    let (name, triplet) = key.split_once(':')?;
    if name.is_empty() || triplet.is_empty() {
        return None;
    }
    Some((name, triplet))
}

/// Whether `path` is a redistributable shared binary for `os`.
pub fn is_binary_for(os: OsFamily, path: &Path) -> bool {
    let name = file_name_str(path).to_ascii_lowercase();

    let is_shared = match os {
        OsFamily::Windows => name.ends_with(".dll"),
        OsFamily::Linux => name.ends_with(".so") || name.contains(".so."),
        OsFamily::Osx => name.ends_with(".dylib"),
    };
    if !is_shared {
        return false;
    }

    let parent = path.parent();
    let dir_name = |p: Option<&Path>| {
        p.and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
    };

    if os.is_unix() && dir_name(parent).as_deref() != Some("lib") {
        return false;
    }

    // debug/bin and debug/lib hold debug builds
    dir_name(parent.and_then(|p| p.parent())).as_deref() != Some("debug")
}

/// Whether a primary pattern admits `name`.
///
/// On Unix an exact pattern such as `libSDL2.so` also admits the versioned
/// names of the same library (`libSDL2-2.0.so.0`, `libSDL2.so.0.3200.4`).
fn pattern_admits(os: OsFamily, pattern: &str, name: &str) -> bool {
    if matches_pattern(pattern, name) {
        return true;
    }
    if !os.is_unix() || pattern.contains('*') {
        return false;
    }

    let pattern = pattern.to_ascii_lowercase();
    let stem = pattern
        .strip_suffix(".so")
        .or_else(|| pattern.strip_suffix(".dylib"))
        .unwrap_or(&pattern);
    let name = name.to_ascii_lowercase();

    match name.strip_prefix(stem) {
        Some(rest) => rest.starts_with('.') || rest.starts_with('-'),
        None => false,
    }
}

/// Longest name confirmed not to be a symlink; ties keep the earlier
/// candidate. Falls back to the first candidate.
fn pick_unix_primary<'p>(candidates: &[&'p PathBuf]) -> Option<&'p PathBuf> {
    let mut best: Option<&PathBuf> = None;
    for &candidate in candidates {
        if is_symlink(candidate) != Some(false) {
            continue;
        }
        let len = file_name_str(candidate).len();
        if best.map_or(true, |b| len > file_name_str(b).len()) {
            best = Some(candidate);
        }
    }
    best.or_else(|| candidates.first().copied())
}

/// Infer which package installed `path`.
///
/// Understands the vcpkg layout `.../installed/<triplet>/<bin|lib|share>/...`
/// (also `vcpkg_installed`). A package directory below `bin`, `lib` or
/// `share` names the package; a library directly in `lib` (Unix) or `bin`
/// (Windows) is inferred from its file name. `visited` is the set of
/// packages reached by the package walk.
pub fn infer_package_from_path(
    path: &Path,
    os: OsFamily,
    visited: &BTreeSet<String>,
) -> Option<String> {
    let segments: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let installed = segments.iter().rposition(|s| {
        s.eq_ignore_ascii_case("installed") || s.eq_ignore_ascii_case("vcpkg_installed")
    })?;

    // <triplet>/<kind>/<package or file>/...
    let rest = &segments[installed + 1..];
    if rest.len() < 3 {
        return None;
    }
    let kind = rest[1].to_ascii_lowercase();

    if rest.len() > 3 && matches!(kind.as_str(), "bin" | "lib" | "share") {
        return Some(rest[2].to_ascii_lowercase());
    }

    let direct = match os {
        OsFamily::Windows => kind == "bin",
        OsFamily::Linux | OsFamily::Osx => kind == "lib",
    };
    if rest.len() == 3 && direct {
        return infer_package_from_library_name(&rest[2], os, visited);
    }

    None
}

/// Infer a package name from a shared library file name.
///
/// `libSDL2_image-2.0.so.0` becomes `sdl2-image`, `zlib1.dll` becomes
/// `zlib1`. When `lib<name>` was visited (`libpng`, `libwebp`), it wins.
pub fn infer_package_from_library_name(
    file_name: &str,
    os: OsFamily,
    visited: &BTreeSet<String>,
) -> Option<String> {
    let name = if os.is_unix() {
        file_name.strip_prefix("lib").unwrap_or(file_name)
    } else {
        file_name
    };

    let base = name.split('.').next()?.to_ascii_lowercase();
    if base.is_empty() {
        return None;
    }

    let package = normalize_library_family(&base);

    let prefixed = format!("lib{}", package);
    if visited.iter().any(|v| v.eq_ignore_ascii_case(&prefixed)) {
        return Some(prefixed);
    }

    Some(package)
}

fn normalize_library_family(base: &str) -> String {
    for (stem, package) in LIBRARY_FAMILIES {
        if base == *stem
            || base
                .strip_prefix(*stem)
                .is_some_and(|rest| rest.starts_with('-'))
        {
            return package.to_string();
        }
    }
    base.to_string()
}
