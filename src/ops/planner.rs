//! Deployment planning.
//!
//! Turns a [`BinaryClosure`] into the concrete filesystem actions that lay a
//! library out for redistribution:
//!
//! ```text
//! <output>/<library>/
//! ├── runtimes/<rid>/native/
//! │   ├── SDL2_image.dll                 # Windows: one copy per binary
//! │   └── SDL2_image-linux-x64.tar.gz    # Unix: one archive, symlinks kept
//! └── licenses/<package>/copyright
//! ```
//!
//! Satellite libraries never ship the core library's binaries or anything
//! that was pulled in through it; consumers get those from the core package.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::core::closure::{BinaryClosure, BinaryNode, UNKNOWN_PACKAGE};
use crate::core::errors::PlanError;
use crate::core::manifest::LibraryManifest;
use crate::core::plan::{
    ArchiveItem, ArtifactOrigin, DeploymentAction, DeploymentLocation, DeploymentPlan,
    DeploymentStatistics, DeploymentStrategy, FileDeploymentInfo,
};
use crate::core::profile::{OsFamily, RuntimeProfile};
use crate::sources::PackageInfoProvider;
use crate::util::cancel::CancellationToken;

/// Name of vcpkg's per-port license file.
const COPYRIGHT_FILE: &str = "copyright";

/// Builds deployment plans for one runtime profile.
pub struct ArtifactPlanner<'a, P: ?Sized> {
    provider: &'a P,
    profile: &'a RuntimeProfile,
    core_package: Option<String>,
    archive_base: PathBuf,
}

impl<'a, P> ArtifactPlanner<'a, P>
where
    P: PackageInfoProvider + ?Sized,
{
    /// `archive_base` is the directory archive members are taken from,
    /// normally `<vcpkg>/installed/<triplet>/lib`.
    pub fn new(
        provider: &'a P,
        profile: &'a RuntimeProfile,
        core_package: Option<String>,
        archive_base: impl Into<PathBuf>,
    ) -> Self {
        ArtifactPlanner {
            provider,
            profile,
            core_package,
            archive_base: archive_base.into(),
        }
    }

    /// Deployment strategy for the profile's OS family.
    pub fn strategy(&self) -> DeploymentStrategy {
        strategy_for(self.profile.os_family())
    }

    pub fn create_plan(
        &self,
        manifest: &LibraryManifest,
        closure: &BinaryClosure,
        output_root: &Path,
        cancel: &CancellationToken,
    ) -> Result<DeploymentPlan, PlanError> {
        cancel.check()?;

        let library_dir = output_root.join(&manifest.name);
        let native_dir = library_dir
            .join("runtimes")
            .join(self.profile.rid())
            .join("native");

        let deployable: Vec<&BinaryNode> = closure
            .nodes
            .iter()
            .filter(|node| !self.is_core_owned(manifest, node))
            .collect();

        let excluded = closure.nodes.len() - deployable.len();
        if excluded > 0 {
            tracing::debug!(
                "Excluded {} binaries provided by the core library",
                excluded
            );
        }

        let mut actions = match self.strategy() {
            DeploymentStrategy::DirectCopy => {
                self.plan_copies(closure, &deployable, &native_dir, cancel)?
            }
            DeploymentStrategy::Archive => {
                vec![self.plan_archive(manifest, closure, &deployable, &native_dir)]
            }
        };

        actions.extend(self.plan_licenses(&deployable, &library_dir.join("licenses"), cancel)?);

        let statistics = compute_statistics(manifest, closure, &actions, self.strategy());

        tracing::info!(
            "Planned {}: {} primary, {} runtime, {} license files ({} packages filtered)",
            manifest.name,
            statistics.primary_files.len(),
            statistics.runtime_files.len(),
            statistics.license_files.len(),
            statistics.filtered_packages.len()
        );

        Ok(DeploymentPlan {
            actions,
            statistics,
        })
    }

    fn is_core_owned(&self, manifest: &LibraryManifest, node: &BinaryNode) -> bool {
        if manifest.is_core {
            return false;
        }
        let Some(core) = self.core_package.as_deref() else {
            return false;
        };
        node.owner_package.eq_ignore_ascii_case(core) || node.origin_package.eq_ignore_ascii_case(core)
    }

    fn plan_copies(
        &self,
        closure: &BinaryClosure,
        nodes: &[&BinaryNode],
        native_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<DeploymentAction>, PlanError> {
        let mut actions = Vec::with_capacity(nodes.len());
        let mut targets = HashSet::new();

        for node in nodes {
            cancel.check()?;

            let file_name = node.path.file_name().ok_or_else(|| {
                PlanError::failed(format!("binary path has no file name: {}", node.path.display()))
            })?;
            let target = native_dir.join(file_name);

            if !targets.insert(target.to_string_lossy().to_lowercase()) {
                tracing::warn!(
                    "Skipping {}: another binary is already deployed as {}",
                    node.path.display(),
                    target.display()
                );
                continue;
            }

            actions.push(DeploymentAction::FileCopy {
                source: node.path.clone(),
                target,
                package: node.owner_package.clone(),
                origin: classify(closure, node),
            });
        }

        Ok(actions)
    }

    fn plan_archive(
        &self,
        manifest: &LibraryManifest,
        closure: &BinaryClosure,
        nodes: &[&BinaryNode],
        native_dir: &Path,
    ) -> DeploymentAction {
        let items = nodes
            .iter()
            .map(|node| {
                if node.path.parent() != Some(self.archive_base.as_path()) {
                    tracing::warn!(
                        "{} is outside {}; it will be archived by absolute path",
                        node.path.display(),
                        self.archive_base.display()
                    );
                }
                ArchiveItem {
                    source: node.path.clone(),
                    package: node.owner_package.clone(),
                    origin: classify(closure, node),
                }
            })
            .collect();

        let archive_name = format!("{}-{}.tar.gz", manifest.name, self.profile.rid());

        DeploymentAction::ArchiveCreate {
            archive_path: native_dir.join(&archive_name),
            base_directory: self.archive_base.clone(),
            items,
            archive_name,
        }
    }

    /// License copies for every package that contributed a binary.
    fn plan_licenses(
        &self,
        nodes: &[&BinaryNode],
        licenses_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<DeploymentAction>, PlanError> {
        let mut owners: Vec<&str> = Vec::new();
        for node in nodes {
            let owner = node.owner_package.as_str();
            if owner != UNKNOWN_PACKAGE && !owners.contains(&owner) {
                owners.push(owner);
            }
        }

        let mut actions = Vec::new();
        for owner in owners {
            cancel.check()?;

            let info = match self.provider.package_info(owner, self.profile.triplet()) {
                Ok(Some(info)) => info,
                Ok(None) => {
                    tracing::warn!("No package info for {}; license not collected", owner);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Failed to look up license of {}: {:#}", owner, e);
                    continue;
                }
            };

            let target = licenses_dir.join(owner).join(COPYRIGHT_FILE);
            match info.owned_files.iter().find(|f| is_license_file(f)) {
                Some(source) => actions.push(DeploymentAction::FileCopy {
                    source: source.clone(),
                    target,
                    package: owner.to_string(),
                    origin: ArtifactOrigin::License,
                }),
                None => tracing::debug!("{} has no copyright file", owner),
            }
        }

        Ok(actions)
    }
}

/// Deployment strategy for an OS family.
pub fn strategy_for(os: OsFamily) -> DeploymentStrategy {
    match os {
        OsFamily::Windows => DeploymentStrategy::DirectCopy,
        OsFamily::Linux | OsFamily::Osx => DeploymentStrategy::Archive,
    }
}

fn classify(closure: &BinaryClosure, node: &BinaryNode) -> ArtifactOrigin {
    if closure.is_primary(&node.path) {
        ArtifactOrigin::Primary
    } else {
        ArtifactOrigin::Runtime
    }
}

/// A file named `copyright` somewhere below a `share` directory.
fn is_license_file(path: &Path) -> bool {
    path.file_name().is_some_and(|n| n == COPYRIGHT_FILE)
        && path
            .ancestors()
            .skip(1)
            .any(|a| a.file_name().is_some_and(|n| n == "share"))
}

/// Statistics derived from the planned actions.
fn compute_statistics(
    manifest: &LibraryManifest,
    closure: &BinaryClosure,
    actions: &[DeploymentAction],
    strategy: DeploymentStrategy,
) -> DeploymentStatistics {
    let mut primary_files = Vec::new();
    let mut runtime_files = Vec::new();
    let mut license_files = Vec::new();
    let mut deployed_packages = BTreeSet::new();

    let mut record = |source: &Path, package: &str, origin: ArtifactOrigin, location| {
        let info = FileDeploymentInfo {
            path: source.to_path_buf(),
            package: package.to_string(),
            location,
        };
        match origin {
            ArtifactOrigin::Primary => primary_files.push(info),
            ArtifactOrigin::Runtime => runtime_files.push(info),
            ArtifactOrigin::License => license_files.push(info),
        }
        deployed_packages.insert(package.to_string());
    };

    for action in actions {
        match action {
            DeploymentAction::FileCopy {
                source,
                package,
                origin,
                ..
            } => record(source, package, *origin, DeploymentLocation::FileSystem),
            DeploymentAction::ArchiveCreate { items, .. } => {
                for item in items {
                    record(&item.source, &item.package, item.origin, DeploymentLocation::Archive);
                }
            }
        }
    }

    let deployed_lower: HashSet<String> = deployed_packages
        .iter()
        .map(|p| p.to_ascii_lowercase())
        .collect();
    let filtered_packages = closure
        .packages
        .iter()
        .filter(|p| !deployed_lower.contains(&p.to_ascii_lowercase()))
        .cloned()
        .collect();

    DeploymentStatistics {
        library: manifest.name.clone(),
        primary_files,
        runtime_files,
        license_files,
        deployed_packages,
        filtered_packages,
        strategy,
    }
}
